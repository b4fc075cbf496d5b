use std::sync::Arc;

use async_trait::async_trait;

use relay_core::{
    dispatch::Submission, fleet::PerpetualAssignment, service::TaskService, tracker::ReportAck,
};
use relay_model::{
    AccountId, CallbackDestination, CallbackToken, CreatePerpetualTask, PerpetualClientContext,
    PerpetualTask, PerpetualTaskId, ProgressPayload, SubmitSpec, TaskId, TaskRecord, TaskResult,
    TaskStage, WorkerId, WorkerProfile,
};

use crate::{error::ApiError, handler::ApiHandler};

/// Bridges [`TaskService`] to [`ApiHandler`] by plain delegation.
pub struct TaskServiceAdapter {
    service: Arc<TaskService>,
}

impl TaskServiceAdapter {
    pub fn new(service: Arc<TaskService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ApiHandler for TaskServiceAdapter {
    async fn submit_task(&self, spec: SubmitSpec) -> Result<Submission, ApiError> {
        Ok(self.service.submit(spec).await?)
    }

    async fn execute_parked_task(
        &self,
        account: &AccountId,
        id: &TaskId,
    ) -> Result<TaskId, ApiError> {
        Ok(self.service.execute_parked(account, id).await?)
    }

    async fn cancel_task(&self, account: &AccountId, id: &TaskId) -> Result<TaskStage, ApiError> {
        Ok(self.service.cancel(account, id).await?)
    }

    async fn query_task_stage(
        &self,
        account: &AccountId,
        id: &TaskId,
    ) -> Result<TaskStage, ApiError> {
        Ok(self.service.query_stage(account, id).await?)
    }

    async fn fetch_task_results(
        &self,
        account: &AccountId,
        id: &TaskId,
    ) -> Result<Option<TaskResult>, ApiError> {
        Ok(self.service.fetch_results(account, id).await?)
    }

    async fn report_task_status(
        &self,
        account: &AccountId,
        id: &TaskId,
        result: TaskResult,
    ) -> Result<ReportAck, ApiError> {
        Ok(self.service.report_status(account, id, result).await?)
    }

    async fn report_task_progress(
        &self,
        account: &AccountId,
        id: &TaskId,
        token: Option<CallbackToken>,
        payload: ProgressPayload,
    ) -> Result<(), ApiError> {
        Ok(self
            .service
            .report_progress(account, id, token, payload)
            .await?)
    }

    async fn register_callback(
        &self,
        destination: CallbackDestination,
    ) -> Result<CallbackToken, ApiError> {
        Ok(self.service.register_callback(destination).await?)
    }

    async fn create_perpetual_task(
        &self,
        req: CreatePerpetualTask,
    ) -> Result<PerpetualTaskId, ApiError> {
        Ok(self.service.create_perpetual(req).await?)
    }

    async fn reset_perpetual_task(
        &self,
        account: &AccountId,
        id: &PerpetualTaskId,
        context: PerpetualClientContext,
    ) -> Result<(), ApiError> {
        Ok(self.service.reset_perpetual(account, id, context).await?)
    }

    async fn delete_perpetual_task(
        &self,
        account: &AccountId,
        id: &PerpetualTaskId,
    ) -> Result<(), ApiError> {
        Ok(self.service.delete_perpetual(account, id).await?)
    }

    async fn get_perpetual_task(
        &self,
        account: &AccountId,
        id: &PerpetualTaskId,
    ) -> Result<PerpetualTask, ApiError> {
        Ok(self.service.get_perpetual(account, id).await?)
    }

    async fn list_perpetual_tasks(
        &self,
        account: &AccountId,
    ) -> Result<Vec<PerpetualTask>, ApiError> {
        Ok(self.service.list_perpetual(account).await?)
    }

    async fn is_task_type_supported(
        &self,
        account: &AccountId,
        task_type: &str,
    ) -> Result<bool, ApiError> {
        Ok(self.service.is_task_type_supported(account, task_type).await?)
    }

    async fn register_worker(&self, profile: WorkerProfile) -> Result<(), ApiError> {
        Ok(self.service.register_worker(profile).await?)
    }

    async fn poll_task(
        &self,
        account: &AccountId,
        worker: &WorkerId,
    ) -> Result<Option<TaskRecord>, ApiError> {
        Ok(self.service.poll_task(account, worker).await?)
    }

    async fn acquire_task(
        &self,
        account: &AccountId,
        id: &TaskId,
        worker: &WorkerId,
    ) -> Result<TaskRecord, ApiError> {
        Ok(self.service.acquire_task(account, id, worker).await?)
    }

    async fn pending_cancellations(
        &self,
        account: &AccountId,
        worker: &WorkerId,
    ) -> Result<Vec<TaskId>, ApiError> {
        Ok(self.service.pending_cancellations(account, worker).await?)
    }

    async fn perpetual_assignments(
        &self,
        account: &AccountId,
        worker: &WorkerId,
    ) -> Result<Vec<PerpetualAssignment>, ApiError> {
        Ok(self.service.perpetual_assignments(account, worker).await?)
    }
}
