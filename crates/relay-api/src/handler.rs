use async_trait::async_trait;

use relay_core::{dispatch::Submission, fleet::PerpetualAssignment, tracker::ReportAck};
use relay_model::{
    AccountId, CallbackDestination, CallbackToken, CreatePerpetualTask, PerpetualClientContext,
    PerpetualTask, PerpetualTaskId, ProgressPayload, SubmitSpec, TaskId, TaskRecord, TaskResult,
    TaskStage, WorkerId, WorkerProfile,
};

use crate::error::ApiError;

/// Gateway operations shared by the HTTP and gRPC transports.
///
/// [`crate::TaskServiceAdapter`] delegates straight to the dispatch core; wrap it (or
/// implement this trait directly) to add auth, rate limiting and the like.
#[async_trait]
pub trait ApiHandler: Send + Sync + 'static {
    /// Validate, resolve and dispatch a task. Sync submissions block until terminal.
    async fn submit_task(&self, spec: SubmitSpec) -> Result<Submission, ApiError>;

    /// Release a parked task for dispatch.
    async fn execute_parked_task(&self, account: &AccountId, id: &TaskId)
    -> Result<TaskId, ApiError>;

    /// Cancel a task; returns the stage observed before cancellation.
    async fn cancel_task(&self, account: &AccountId, id: &TaskId) -> Result<TaskStage, ApiError>;

    async fn query_task_stage(&self, account: &AccountId, id: &TaskId)
    -> Result<TaskStage, ApiError>;

    async fn fetch_task_results(
        &self,
        account: &AccountId,
        id: &TaskId,
    ) -> Result<Option<TaskResult>, ApiError>;

    /// Terminal report from a worker.
    async fn report_task_status(
        &self,
        account: &AccountId,
        id: &TaskId,
        result: TaskResult,
    ) -> Result<ReportAck, ApiError>;

    async fn report_task_progress(
        &self,
        account: &AccountId,
        id: &TaskId,
        token: Option<CallbackToken>,
        payload: ProgressPayload,
    ) -> Result<(), ApiError>;

    async fn register_callback(
        &self,
        destination: CallbackDestination,
    ) -> Result<CallbackToken, ApiError>;

    async fn create_perpetual_task(
        &self,
        req: CreatePerpetualTask,
    ) -> Result<PerpetualTaskId, ApiError>;

    async fn reset_perpetual_task(
        &self,
        account: &AccountId,
        id: &PerpetualTaskId,
        context: PerpetualClientContext,
    ) -> Result<(), ApiError>;

    async fn delete_perpetual_task(
        &self,
        account: &AccountId,
        id: &PerpetualTaskId,
    ) -> Result<(), ApiError>;

    async fn get_perpetual_task(
        &self,
        account: &AccountId,
        id: &PerpetualTaskId,
    ) -> Result<PerpetualTask, ApiError>;

    async fn list_perpetual_tasks(&self, account: &AccountId)
    -> Result<Vec<PerpetualTask>, ApiError>;

    async fn is_task_type_supported(
        &self,
        account: &AccountId,
        task_type: &str,
    ) -> Result<bool, ApiError>;

    async fn register_worker(&self, profile: WorkerProfile) -> Result<(), ApiError>;

    /// Hand the next matching queued task to `worker`, if any.
    async fn poll_task(
        &self,
        account: &AccountId,
        worker: &WorkerId,
    ) -> Result<Option<TaskRecord>, ApiError>;

    /// Worker confirms it started a dispatched task.
    async fn acquire_task(
        &self,
        account: &AccountId,
        id: &TaskId,
        worker: &WorkerId,
    ) -> Result<TaskRecord, ApiError>;

    /// Drain the cancellation requests addressed to `worker`.
    async fn pending_cancellations(
        &self,
        account: &AccountId,
        worker: &WorkerId,
    ) -> Result<Vec<TaskId>, ApiError>;

    /// Perpetual tasks `worker` should run, with pending context refreshes flagged.
    async fn perpetual_assignments(
        &self,
        account: &AccountId,
        worker: &WorkerId,
    ) -> Result<Vec<PerpetualAssignment>, ApiError>;
}
