//! Persistence of task records.
//!
//! Every mutation after [`TaskStore::insert`] goes through [`TaskStore::transition`], a
//! single-record compare-and-swap that checks both the caller's [`StatusGuard`] and the
//! lifecycle rules of [`TaskStatus::can_transition_to`].
mod memory;
pub use memory::MemoryTaskStore;

use async_trait::async_trait;
use thiserror::Error;

use relay_model::{
    AccountId, ProgressEvent, TaskId, TaskRecord, TaskResult, TaskStatus, UnixMs, WorkerId,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record already exists: {0}")]
    DuplicateId(TaskId),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Statuses the record must currently be in for a transition to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusGuard {
    /// Any status the lifecycle allows to move to the target.
    Any,
    OneOf(&'static [TaskStatus]),
}

impl StatusGuard {
    /// Statuses from which cancellation is strict.
    pub const PRE_DISPATCH: StatusGuard = StatusGuard::OneOf(&[
        TaskStatus::Created,
        TaskStatus::Parked,
        TaskStatus::Queued,
    ]);

    pub fn admits(&self, status: TaskStatus) -> bool {
        match self {
            StatusGuard::Any => true,
            StatusGuard::OneOf(allowed) => allowed.contains(&status),
        }
    }
}

/// Fields written together with a status change.
#[derive(Debug, Clone, Default)]
pub struct TransitionPatch {
    pub dispatched_at_ms: Option<UnixMs>,
    pub completed_at_ms: Option<UnixMs>,
    pub worker_id: Option<WorkerId>,
    pub result: Option<TaskResult>,
}

impl TransitionPatch {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn dispatched(worker_id: WorkerId, at: UnixMs) -> Self {
        Self {
            dispatched_at_ms: Some(at),
            worker_id: Some(worker_id),
            ..Self::default()
        }
    }

    pub fn completed(at: UnixMs) -> Self {
        Self {
            completed_at_ms: Some(at),
            ..Self::default()
        }
    }

    pub fn with_result(mut self, result: TaskResult) -> Self {
        self.result = Some(result);
        self
    }

    fn apply(self, record: &mut TaskRecord) {
        if let Some(at) = self.dispatched_at_ms {
            record.dispatched_at_ms = Some(at);
        }
        if let Some(at) = self.completed_at_ms {
            record.completed_at_ms = Some(at);
        }
        if let Some(worker) = self.worker_id {
            record.worker_id = Some(worker);
        }
        if let Some(result) = self.result {
            record.result = Some(result);
        }
    }
}

/// Outcome of a compare-and-swap transition.
#[derive(Debug, Clone)]
pub enum Transition {
    /// Status changed; `record` is the stored state after the change.
    Applied {
        previous: TaskStatus,
        record: TaskRecord,
    },
    /// Guard or lifecycle rules refused the change; nothing was written.
    Rejected { current: TaskStatus },
    /// No record with this id in this account.
    Missing,
}

/// Storage backend for task records.
///
/// Records are scoped by account: lookups with the wrong account behave as if the record
/// did not exist.
#[async_trait]
pub trait TaskStore: Send + Sync + 'static {
    /// Persist a new record. Fails with [`StoreError::DuplicateId`] if the id is taken.
    async fn insert(&self, record: TaskRecord) -> Result<(), StoreError>;

    async fn get(&self, account: &AccountId, id: &TaskId)
    -> Result<Option<TaskRecord>, StoreError>;

    /// Move the record to `next` if its current status passes `guard` and the lifecycle.
    async fn transition(
        &self,
        account: &AccountId,
        id: &TaskId,
        guard: StatusGuard,
        next: TaskStatus,
        patch: TransitionPatch,
    ) -> Result<Transition, StoreError>;

    /// Append a progress event without touching the status. Returns `false` if missing.
    async fn append_progress(
        &self,
        account: &AccountId,
        id: &TaskId,
        event: ProgressEvent,
    ) -> Result<bool, StoreError>;
}

/// Apply a guarded transition to an in-memory record.
///
/// Shared by store implementations that hold the record under a lock.
pub(crate) fn apply_transition(
    record: &mut TaskRecord,
    guard: StatusGuard,
    next: TaskStatus,
    patch: TransitionPatch,
) -> Transition {
    let current = record.status;
    if !guard.admits(current) || !current.can_transition_to(next) {
        return Transition::Rejected { current };
    }
    record.status = next;
    patch.apply(record);
    Transition::Applied {
        previous: current,
        record: record.clone(),
    }
}
