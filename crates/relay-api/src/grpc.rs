use std::sync::Arc;

use tonic::{Request, Response, Status};

use relay_core::tracker::ReportAck;
use relay_model::{
    AccountId, CallbackDestination, CallbackToken, CreatePerpetualTask, Labels, PerpetualTaskId,
    SubmitSpec, TaskId, TaskResult, WorkerId, WorkerProfile,
};

use crate::convert::{context_from_proto, payload_from_proto, stage_to_proto};
use crate::handler::ApiHandler;
use crate::proto::{self, relay_api_server::RelayApi};

/// gRPC service implementation.
///
/// Wraps an [`ApiHandler`] and implements the generated `RelayApi` trait.
pub struct RelayApiService<H> {
    handler: Arc<H>,
}

impl<H> RelayApiService<H>
where
    H: ApiHandler,
{
    pub fn new(handler: Arc<H>) -> Self {
        Self { handler }
    }
}

fn task_ref(r: proto::TaskRef) -> Result<(AccountId, TaskId), Status> {
    if r.task_id.trim().is_empty() {
        return Err(Status::invalid_argument("task_id cannot be empty"));
    }
    Ok((AccountId::from(r.account_id), TaskId::from(r.task_id)))
}

fn perpetual_ref(account_id: String, id: String) -> Result<(AccountId, PerpetualTaskId), Status> {
    if id.trim().is_empty() {
        return Err(Status::invalid_argument("perpetual_task_id cannot be empty"));
    }
    Ok((AccountId::from(account_id), PerpetualTaskId::from(id)))
}

fn worker_ref(r: proto::WorkerRef) -> Result<(AccountId, WorkerId), Status> {
    if r.worker_id.trim().is_empty() {
        return Err(Status::invalid_argument("worker_id cannot be empty"));
    }
    Ok((AccountId::from(r.account_id), WorkerId::from(r.worker_id)))
}

#[tonic::async_trait]
impl<H> RelayApi for RelayApiService<H>
where
    H: ApiHandler,
{
    async fn submit_task(
        &self,
        request: Request<proto::SubmitTaskRequest>,
    ) -> Result<Response<proto::SubmitTaskResponse>, Status> {
        let spec = SubmitSpec::try_from(request.into_inner())?;
        let submission = self.handler.submit_task(spec).await?;

        Ok(Response::new(proto::SubmitTaskResponse {
            task_id: submission.task_id.to_string(),
            total_expiry_ms: submission.total_expiry_ms,
            stage: stage_to_proto(submission.stage),
            result: submission.result.map(proto::TaskResult::from),
        }))
    }

    async fn execute_parked_task(
        &self,
        request: Request<proto::TaskRef>,
    ) -> Result<Response<proto::ExecuteParkedTaskResponse>, Status> {
        let (account, id) = task_ref(request.into_inner())?;
        let task_id = self.handler.execute_parked_task(&account, &id).await?;

        Ok(Response::new(proto::ExecuteParkedTaskResponse {
            task_id: task_id.to_string(),
        }))
    }

    async fn cancel_task(
        &self,
        request: Request<proto::TaskRef>,
    ) -> Result<Response<proto::CancelTaskResponse>, Status> {
        let (account, id) = task_ref(request.into_inner())?;
        let previous = self.handler.cancel_task(&account, &id).await?;

        Ok(Response::new(proto::CancelTaskResponse {
            previous_stage: stage_to_proto(previous),
        }))
    }

    async fn query_task_stage(
        &self,
        request: Request<proto::TaskRef>,
    ) -> Result<Response<proto::QueryTaskStageResponse>, Status> {
        let (account, id) = task_ref(request.into_inner())?;
        let stage = self.handler.query_task_stage(&account, &id).await?;

        Ok(Response::new(proto::QueryTaskStageResponse {
            stage: stage_to_proto(stage),
        }))
    }

    async fn fetch_task_results(
        &self,
        request: Request<proto::TaskRef>,
    ) -> Result<Response<proto::FetchTaskResultsResponse>, Status> {
        let (account, id) = task_ref(request.into_inner())?;
        let result = self.handler.fetch_task_results(&account, &id).await?;

        Ok(Response::new(proto::FetchTaskResultsResponse {
            result: result.map(proto::TaskResult::from),
        }))
    }

    async fn report_task_status(
        &self,
        request: Request<proto::ReportTaskStatusRequest>,
    ) -> Result<Response<proto::ReportTaskStatusResponse>, Status> {
        let req = request.into_inner();
        let result = req
            .result
            .ok_or_else(|| Status::invalid_argument("missing result"))?;
        let result = TaskResult::try_from(result)?;
        let (account, id) = task_ref(proto::TaskRef {
            account_id: req.account_id,
            task_id: req.task_id,
        })?;

        let ack = self.handler.report_task_status(&account, &id, result).await?;

        Ok(Response::new(proto::ReportTaskStatusResponse {
            duplicate: ack == ReportAck::Duplicate,
        }))
    }

    async fn report_task_progress(
        &self,
        request: Request<proto::ReportTaskProgressRequest>,
    ) -> Result<Response<proto::ReportTaskProgressResponse>, Status> {
        let req = request.into_inner();
        let payload = payload_from_proto(req.payload)?;
        let token = req
            .callback_token
            .filter(|s| !s.trim().is_empty())
            .map(CallbackToken::from);
        let (account, id) = task_ref(proto::TaskRef {
            account_id: req.account_id,
            task_id: req.task_id,
        })?;

        self.handler
            .report_task_progress(&account, &id, token, payload)
            .await?;

        Ok(Response::new(proto::ReportTaskProgressResponse {}))
    }

    async fn register_callback(
        &self,
        request: Request<proto::RegisterCallbackRequest>,
    ) -> Result<Response<proto::RegisterCallbackResponse>, Status> {
        let req = request.into_inner();
        let destination = CallbackDestination {
            target: req.target,
            attributes: Labels::from_iter(req.attributes),
        };
        let token = self.handler.register_callback(destination).await?;

        Ok(Response::new(proto::RegisterCallbackResponse {
            callback_token: token.to_string(),
        }))
    }

    async fn create_perpetual_task(
        &self,
        request: Request<proto::CreatePerpetualTaskRequest>,
    ) -> Result<Response<proto::CreatePerpetualTaskResponse>, Status> {
        let create = CreatePerpetualTask::try_from(request.into_inner())?;
        let id = self.handler.create_perpetual_task(create).await?;

        Ok(Response::new(proto::CreatePerpetualTaskResponse {
            perpetual_task_id: id.to_string(),
        }))
    }

    async fn reset_perpetual_task(
        &self,
        request: Request<proto::ResetPerpetualTaskRequest>,
    ) -> Result<Response<proto::ResetPerpetualTaskResponse>, Status> {
        let req = request.into_inner();
        let context = context_from_proto(req.context)?;
        let (account, id) = perpetual_ref(req.account_id, req.perpetual_task_id)?;

        self.handler
            .reset_perpetual_task(&account, &id, context)
            .await?;

        Ok(Response::new(proto::ResetPerpetualTaskResponse {}))
    }

    async fn delete_perpetual_task(
        &self,
        request: Request<proto::PerpetualTaskRef>,
    ) -> Result<Response<proto::DeletePerpetualTaskResponse>, Status> {
        let req = request.into_inner();
        let (account, id) = perpetual_ref(req.account_id, req.perpetual_task_id)?;

        self.handler.delete_perpetual_task(&account, &id).await?;

        Ok(Response::new(proto::DeletePerpetualTaskResponse {}))
    }

    async fn is_task_type_supported(
        &self,
        request: Request<proto::IsTaskTypeSupportedRequest>,
    ) -> Result<Response<proto::IsTaskTypeSupportedResponse>, Status> {
        let req = request.into_inner();
        let supported = self
            .handler
            .is_task_type_supported(&AccountId::from(req.account_id), &req.task_type)
            .await?;

        Ok(Response::new(proto::IsTaskTypeSupportedResponse { supported }))
    }

    async fn register_worker(
        &self,
        request: Request<proto::RegisterWorkerRequest>,
    ) -> Result<Response<proto::RegisterWorkerResponse>, Status> {
        let req = request.into_inner();
        if req.worker_id.trim().is_empty() {
            return Err(Status::invalid_argument("worker_id cannot be empty"));
        }

        let profile = WorkerProfile::new(
            WorkerId::from(req.worker_id),
            AccountId::from(req.account_id),
        )
        .with_selectors(req.selectors)
        .with_task_types(req.task_types);
        self.handler.register_worker(profile).await?;

        Ok(Response::new(proto::RegisterWorkerResponse {}))
    }

    async fn poll_task(
        &self,
        request: Request<proto::PollTaskRequest>,
    ) -> Result<Response<proto::PollTaskResponse>, Status> {
        let req = request.into_inner();
        let task = self
            .handler
            .poll_task(
                &AccountId::from(req.account_id),
                &WorkerId::from(req.worker_id),
            )
            .await?;

        Ok(Response::new(proto::PollTaskResponse {
            task: task.map(proto::DispatchedTask::from),
        }))
    }

    async fn acquire_task(
        &self,
        request: Request<proto::AcquireTaskRequest>,
    ) -> Result<Response<proto::AcquireTaskResponse>, Status> {
        let req = request.into_inner();
        if req.worker_id.trim().is_empty() {
            return Err(Status::invalid_argument("worker_id cannot be empty"));
        }
        let (account, id) = task_ref(proto::TaskRef {
            account_id: req.account_id,
            task_id: req.task_id,
        })?;

        let record = self
            .handler
            .acquire_task(&account, &id, &WorkerId::from(req.worker_id))
            .await?;

        Ok(Response::new(proto::AcquireTaskResponse {
            task: Some(proto::DispatchedTask::from(record)),
        }))
    }

    async fn fetch_cancellations(
        &self,
        request: Request<proto::WorkerRef>,
    ) -> Result<Response<proto::FetchCancellationsResponse>, Status> {
        let (account, worker) = worker_ref(request.into_inner())?;
        let ids = self.handler.pending_cancellations(&account, &worker).await?;

        Ok(Response::new(proto::FetchCancellationsResponse {
            task_ids: ids.into_iter().map(|id| id.to_string()).collect(),
        }))
    }

    async fn fetch_perpetual_assignments(
        &self,
        request: Request<proto::WorkerRef>,
    ) -> Result<Response<proto::FetchPerpetualAssignmentsResponse>, Status> {
        let (account, worker) = worker_ref(request.into_inner())?;
        let assignments = self.handler.perpetual_assignments(&account, &worker).await?;

        Ok(Response::new(proto::FetchPerpetualAssignmentsResponse {
            assignments: assignments
                .into_iter()
                .map(proto::PerpetualAssignment::from)
                .collect(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TaskServiceAdapter;
    use relay_core::service::TaskService;

    fn service() -> RelayApiService<TaskServiceAdapter> {
        let core = Arc::new(TaskService::builder().build());
        RelayApiService::new(Arc::new(TaskServiceAdapter::new(core)))
    }

    #[tokio::test]
    async fn submit_without_worker_is_failed_precondition() {
        let svc = service();
        let req = proto::SubmitTaskRequest {
            account_id: "acc".into(),
            task_type: "shell".into(),
            runner_tag: "linux".into(),
            ..Default::default()
        };

        let status = svc.submit_task(Request::new(req)).await.unwrap_err();
        assert_eq!(status.code(), tonic::Code::FailedPrecondition);
    }

    #[tokio::test]
    async fn parked_submit_and_release() {
        let svc = service();
        svc.register_worker(Request::new(proto::RegisterWorkerRequest {
            account_id: "acc".into(),
            worker_id: "w-1".into(),
            selectors: vec!["linux".into()],
            task_types: vec!["shell".into()],
        }))
        .await
        .unwrap();

        let submitted = svc
            .submit_task(Request::new(proto::SubmitTaskRequest {
                account_id: "acc".into(),
                task_type: "shell".into(),
                runner_tag: "linux".into(),
                parked: true,
                ..Default::default()
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(submitted.stage, proto::TaskStage::Parked as i32);

        let task_ref = proto::TaskRef {
            account_id: "acc".into(),
            task_id: submitted.task_id,
        };
        svc.execute_parked_task(Request::new(task_ref.clone()))
            .await
            .unwrap();

        let stage = svc
            .query_task_stage(Request::new(task_ref))
            .await
            .unwrap()
            .into_inner()
            .stage;
        assert_eq!(stage, proto::TaskStage::Queued as i32);
    }

    #[tokio::test]
    async fn empty_task_id_is_invalid_argument() {
        let svc = service();
        let status = svc
            .cancel_task(Request::new(proto::TaskRef {
                account_id: "acc".into(),
                task_id: " ".into(),
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);
    }

    #[tokio::test]
    async fn worker_drains_cancellations_once() {
        let svc = service();
        svc.register_worker(Request::new(proto::RegisterWorkerRequest {
            account_id: "acc".into(),
            worker_id: "w-1".into(),
            selectors: vec!["linux".into()],
            task_types: vec!["shell".into()],
        }))
        .await
        .unwrap();
        let submitted = svc
            .submit_task(Request::new(proto::SubmitTaskRequest {
                account_id: "acc".into(),
                task_type: "shell".into(),
                runner_tag: "linux".into(),
                ..Default::default()
            }))
            .await
            .unwrap()
            .into_inner();
        svc.poll_task(Request::new(proto::PollTaskRequest {
            account_id: "acc".into(),
            worker_id: "w-1".into(),
        }))
        .await
        .unwrap();
        svc.cancel_task(Request::new(proto::TaskRef {
            account_id: "acc".into(),
            task_id: submitted.task_id.clone(),
        }))
        .await
        .unwrap();

        let worker = proto::WorkerRef {
            account_id: "acc".into(),
            worker_id: "w-1".into(),
        };
        let first = svc
            .fetch_cancellations(Request::new(worker.clone()))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(first.task_ids, vec![submitted.task_id]);
        let second = svc
            .fetch_cancellations(Request::new(worker))
            .await
            .unwrap()
            .into_inner();
        assert!(second.task_ids.is_empty());
    }
}
