//! Boundary to the remote worker fleet.
//!
//! The fleet knows which workers exist and what they advertise. The core announces queued
//! tasks to it, and workers claim work through [`WorkerFleet::claim`] when they poll.
mod local;
pub use local::LocalFleet;

#[cfg(test)]
pub(crate) mod faulty;

use async_trait::async_trait;
use thiserror::Error;

use relay_model::{
    AccountId, PerpetualTask, PerpetualTaskId, TaskId, TaskRecord, WorkerId, WorkerProfile,
};

#[derive(Debug, Error)]
pub enum FleetError {
    #[error("no eligible worker for task type '{task_type}'")]
    NoEligibleWorker { task_type: String },

    #[error("unknown worker: {0}")]
    UnknownWorker(WorkerId),

    #[error("invalid worker profile: {0}")]
    InvalidProfile(String),

    #[error("fleet unavailable: {0}")]
    Unavailable(String),
}

/// A queued task handed to a polling worker.
#[derive(Debug, Clone)]
pub struct Claim {
    pub task_id: TaskId,
    /// Profile of the claiming worker at claim time.
    pub worker: WorkerProfile,
}

/// Perpetual task as seen by one polling worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerpetualAssignment {
    pub task: PerpetualTask,
    /// The context changed since this worker last fetched it.
    pub refresh_pending: bool,
}

#[async_trait]
pub trait WorkerFleet: Send + Sync + 'static {
    /// Add or replace a worker's advertised profile.
    async fn register_worker(&self, profile: WorkerProfile) -> Result<(), FleetError>;

    /// Fail with [`FleetError::NoEligibleWorker`] unless some registered worker of the
    /// record's account satisfies every capability and supports its task type.
    async fn ensure_eligible(&self, record: &TaskRecord) -> Result<(), FleetError>;

    /// Make a queued task visible to polling workers.
    async fn announce(&self, record: &TaskRecord) -> Result<(), FleetError>;

    /// Take the first announced task the worker is eligible for.
    async fn claim(
        &self,
        account: &AccountId,
        worker: &WorkerId,
    ) -> Result<Option<Claim>, FleetError>;

    /// Withdraw an announcement, or ask the assigned worker to stop. Advisory once dispatched.
    async fn cancel(&self, record: &TaskRecord) -> Result<(), FleetError>;

    /// `true` only if the account has workers and every one of them supports the type.
    async fn supports_task_type(
        &self,
        account: &AccountId,
        task_type: &str,
    ) -> Result<bool, FleetError>;

    /// Drain the cancellation requests addressed to a worker.
    async fn take_cancellations(
        &self,
        account: &AccountId,
        worker: &WorkerId,
    ) -> Result<Vec<TaskId>, FleetError>;

    /// Perpetual tasks of the worker's account. Fetching clears the worker's pending refreshes.
    async fn perpetual_assignments(
        &self,
        account: &AccountId,
        worker: &WorkerId,
    ) -> Result<Vec<PerpetualAssignment>, FleetError>;

    /// Ask workers to re-fetch a perpetual task's context on their next poll cycle.
    async fn refresh_perpetual(&self, task: &PerpetualTask) -> Result<(), FleetError>;

    /// Stop scheduling a perpetual task. In-flight executions are not interrupted.
    async fn forget_perpetual(
        &self,
        account: &AccountId,
        id: &PerpetualTaskId,
    ) -> Result<(), FleetError>;
}
