use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};

use relay_core::{
    callback::{Delivery, DeliveryEnvelope},
    fleet::PerpetualAssignment,
    tracker::ReportAck,
};
use relay_model::{
    AccountId, CallbackDestination, CallbackToken, CreatePerpetualTask, ExecutionMode, Labels,
    PayloadFormat, PerpetualClientContext, PerpetualSchedule, PerpetualTask, PerpetualTaskId,
    ResultOutcome,
    SubmitSpec, TaskId, TaskPayload, TaskRecord, TaskResult, TaskSelector, TaskStage, TimeoutMs,
    UnixMs, WorkerId, WorkerProfile,
};

use crate::{error::ApiError, handler::ApiHandler};

/// HTTP API service builder.
pub struct HttpApi<H> {
    handler: Arc<H>,
}

impl<H> HttpApi<H>
where
    H: ApiHandler,
{
    pub fn new(handler: Arc<H>) -> Self {
        Self { handler }
    }

    /// Build the axum router; every route lives under `/api/v1`.
    pub fn router(self) -> Router {
        Router::new()
            .route("/api/v1/callbacks", post(register_callback::<H>))
            .route("/api/v1/accounts/{account}/tasks", post(submit_task::<H>))
            .route(
                "/api/v1/accounts/{account}/tasks/{id}/stage",
                get(query_task_stage::<H>),
            )
            .route(
                "/api/v1/accounts/{account}/tasks/{id}/results",
                get(fetch_task_results::<H>),
            )
            .route(
                "/api/v1/accounts/{account}/tasks/{id}/execute",
                post(execute_parked_task::<H>),
            )
            .route(
                "/api/v1/accounts/{account}/tasks/{id}/cancel",
                post(cancel_task::<H>),
            )
            .route(
                "/api/v1/accounts/{account}/tasks/{id}/status",
                post(report_task_status::<H>),
            )
            .route(
                "/api/v1/accounts/{account}/tasks/{id}/progress",
                post(report_task_progress::<H>),
            )
            .route(
                "/api/v1/accounts/{account}/tasks/{id}/acquire",
                post(acquire_task::<H>),
            )
            .route(
                "/api/v1/accounts/{account}/task-types/{task_type}/supported",
                get(is_task_type_supported::<H>),
            )
            .route(
                "/api/v1/accounts/{account}/workers",
                post(register_worker::<H>),
            )
            .route(
                "/api/v1/accounts/{account}/workers/{worker}/poll",
                post(poll_task::<H>),
            )
            .route(
                "/api/v1/accounts/{account}/workers/{worker}/cancellations",
                post(take_cancellations::<H>),
            )
            .route(
                "/api/v1/accounts/{account}/workers/{worker}/perpetual-tasks",
                get(perpetual_assignments::<H>),
            )
            .route(
                "/api/v1/accounts/{account}/perpetual-tasks",
                post(create_perpetual_task::<H>).get(list_perpetual_tasks::<H>),
            )
            .route(
                "/api/v1/accounts/{account}/perpetual-tasks/{id}",
                delete(delete_perpetual_task::<H>).get(get_perpetual_task::<H>),
            )
            .route(
                "/api/v1/accounts/{account}/perpetual-tasks/{id}/reset",
                post(reset_perpetual_task::<H>),
            )
            .with_state(self.handler)
    }
}

// ============================================================================
// Request/Response types
// ============================================================================

/// Payload on the wire: format tag plus body text.
///
/// `binary` data travels as standard base64 so arbitrary bytes survive JSON; `json` data is
/// the document text itself. The format is kept as a raw string so unknown tags surface as a
/// gateway error rather than a body rejection.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadBody {
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub data: String,
}

impl PayloadBody {
    pub fn into_payload(self) -> Result<TaskPayload, ApiError> {
        let format = if self.format.trim().is_empty() {
            PayloadFormat::default()
        } else {
            self.format.parse::<PayloadFormat>()?
        };
        let data = match format {
            PayloadFormat::Binary => BASE64.decode(self.data.trim()).map_err(|e| {
                ApiError::InvalidRequest(format!("binary payload is not valid base64: {e}"))
            })?,
            PayloadFormat::Json => self.data.into_bytes(),
        };
        Ok(TaskPayload::new(format, data))
    }
}

impl From<&TaskPayload> for PayloadBody {
    fn from(p: &TaskPayload) -> Self {
        let data = match p.format {
            PayloadFormat::Binary => BASE64.encode(&p.data),
            PayloadFormat::Json => String::from_utf8_lossy(&p.data).into_owned(),
        };
        Self {
            format: p.format.as_str().to_string(),
            data,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitTaskRequest {
    task_type: String,
    #[serde(default)]
    payload: PayloadBody,
    #[serde(default)]
    mode: String,
    #[serde(default)]
    parked: bool,
    #[serde(default)]
    selectors: Vec<TaskSelector>,
    #[serde(default)]
    runner_tag: String,
    #[serde(default)]
    execution_infra_ref: Option<String>,
    #[serde(default)]
    callback_token: Option<String>,
    #[serde(default)]
    execution_timeout_ms: Option<TimeoutMs>,
    #[serde(default)]
    queue_timeout_ms: Option<TimeoutMs>,
    #[serde(default)]
    setup_abstractions: Labels,
}

impl SubmitTaskRequest {
    fn into_spec(self, account: AccountId) -> Result<SubmitSpec, ApiError> {
        let mode: ExecutionMode = self.mode.parse()?;
        Ok(SubmitSpec {
            account_id: account,
            task_type: self.task_type,
            payload: self.payload.into_payload()?,
            mode,
            parked: self.parked,
            selectors: self.selectors,
            runner_tag: self.runner_tag,
            execution_infra_ref: self.execution_infra_ref.filter(|s| !s.trim().is_empty()),
            callback_token: self
                .callback_token
                .filter(|s| !s.trim().is_empty())
                .map(CallbackToken::from),
            execution_timeout_ms: self.execution_timeout_ms,
            queue_timeout_ms: self.queue_timeout_ms,
            setup_abstractions: self.setup_abstractions,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultBody {
    /// "success" or "failure".
    outcome: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload: Option<PayloadBody>,
}

impl ResultBody {
    fn into_result(self) -> Result<TaskResult, ApiError> {
        let result = match self.outcome.trim().to_ascii_lowercase().as_str() {
            "success" => TaskResult::success(None),
            "failure" => TaskResult::failure(self.reason.unwrap_or_default()),
            other => {
                return Err(ApiError::InvalidRequest(format!(
                    "invalid outcome: '{other}' (valid: success, failure)"
                )));
            }
        };
        match self.payload {
            Some(p) => Ok(result.with_payload(p.into_payload()?)),
            None => Ok(result),
        }
    }
}

impl From<&TaskResult> for ResultBody {
    fn from(r: &TaskResult) -> Self {
        let (outcome, reason) = match &r.outcome {
            ResultOutcome::Success => ("success", None),
            ResultOutcome::Failure { reason } => ("failure", Some(reason.clone())),
        };
        Self {
            outcome: outcome.to_string(),
            reason,
            payload: r.payload.as_ref().map(PayloadBody::from),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitTaskResponse {
    task_id: String,
    total_expiry_ms: UnixMs,
    stage: TaskStage,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<ResultBody>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TaskIdResponse {
    task_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StageResponse {
    stage: TaskStage,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CancelTaskResponse {
    previous_stage: TaskStage,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FetchResultsResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<ResultBody>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReportStatusResponse {
    duplicate: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportProgressRequest {
    #[serde(default)]
    callback_token: Option<String>,
    payload: PayloadBody,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterCallbackResponse {
    callback_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SupportedResponse {
    supported: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterWorkerRequest {
    worker_id: String,
    #[serde(default)]
    selectors: Vec<String>,
    #[serde(default)]
    task_types: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AcquireTaskRequest {
    worker_id: String,
}

/// Task as handed to a worker.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DispatchedTaskBody {
    task_id: String,
    task_type: String,
    payload: PayloadBody,
    execution_timeout_ms: TimeoutMs,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at_ms: Option<UnixMs>,
    #[serde(skip_serializing_if = "Labels::is_empty")]
    setup_abstractions: Labels,
    stage: TaskStage,
}

impl From<TaskRecord> for DispatchedTaskBody {
    fn from(r: TaskRecord) -> Self {
        Self {
            task_id: r.id.to_string(),
            stage: r.stage(),
            payload: PayloadBody::from(&r.payload),
            task_type: r.task_type,
            execution_timeout_ms: r.execution_timeout_ms,
            expires_at_ms: r.expires_at_ms,
            setup_abstractions: r.setup_abstractions,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PollTaskResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    task: Option<DispatchedTaskBody>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CancellationsResponse {
    task_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PerpetualAssignmentBody {
    task: PerpetualTask,
    refresh_pending: bool,
}

impl From<PerpetualAssignment> for PerpetualAssignmentBody {
    fn from(a: PerpetualAssignment) -> Self {
        Self {
            task: a.task,
            refresh_pending: a.refresh_pending,
        }
    }
}

/// JSON document a webhook callback destination receives.
///
/// `kind` is `result` or `progress`; payload bytes follow the same encoding as [`PayloadBody`].
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryBody {
    callback_token: String,
    task_id: String,
    account_id: String,
    #[serde(flatten)]
    content: DeliveryContent,
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
enum DeliveryContent {
    Result {
        result: ResultBody,
    },
    #[serde(rename_all = "camelCase")]
    Progress {
        reported_at_ms: UnixMs,
        payload: PayloadBody,
    },
}

impl From<&DeliveryEnvelope> for DeliveryBody {
    fn from(envelope: &DeliveryEnvelope) -> Self {
        let (task_id, account_id, content) = match &envelope.delivery {
            Delivery::Result {
                task_id,
                account_id,
                result,
            } => (
                task_id,
                account_id,
                DeliveryContent::Result {
                    result: ResultBody::from(result),
                },
            ),
            Delivery::Progress {
                task_id,
                account_id,
                event,
            } => (
                task_id,
                account_id,
                DeliveryContent::Progress {
                    reported_at_ms: event.reported_at_ms,
                    payload: PayloadBody::from(&event.payload),
                },
            ),
        };
        Self {
            callback_token: envelope.token.to_string(),
            task_id: task_id.to_string(),
            account_id: account_id.to_string(),
            content,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePerpetualRequest {
    task_type: String,
    context: PerpetualClientContext,
    #[serde(default)]
    schedule: PerpetualSchedule,
    #[serde(default)]
    allow_duplicate: bool,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatePerpetualResponse {
    perpetual_task_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResetPerpetualRequest {
    context: PerpetualClientContext,
}

// ============================================================================
// Handlers: task lifecycle
// ============================================================================

/// POST /api/v1/accounts/{account}/tasks
async fn submit_task<H>(
    State(handler): State<Arc<H>>,
    Path(account): Path<String>,
    Json(req): Json<SubmitTaskRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let spec = req.into_spec(AccountId::from(account))?;
    let submission = handler.submit_task(spec).await?;

    let response = SubmitTaskResponse {
        task_id: submission.task_id.to_string(),
        total_expiry_ms: submission.total_expiry_ms,
        stage: submission.stage,
        result: submission.result.as_ref().map(ResultBody::from),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/v1/accounts/{account}/tasks/{id}/stage
async fn query_task_stage<H>(
    State(handler): State<Arc<H>>,
    Path((account, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let stage = handler
        .query_task_stage(&AccountId::from(account), &TaskId::from(id))
        .await?;
    Ok(Json(StageResponse { stage }))
}

/// GET /api/v1/accounts/{account}/tasks/{id}/results
async fn fetch_task_results<H>(
    State(handler): State<Arc<H>>,
    Path((account, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let result = handler
        .fetch_task_results(&AccountId::from(account), &TaskId::from(id))
        .await?;
    Ok(Json(FetchResultsResponse {
        result: result.as_ref().map(ResultBody::from),
    }))
}

/// POST /api/v1/accounts/{account}/tasks/{id}/execute
async fn execute_parked_task<H>(
    State(handler): State<Arc<H>>,
    Path((account, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let task_id = handler
        .execute_parked_task(&AccountId::from(account), &TaskId::from(id))
        .await?;
    Ok(Json(TaskIdResponse {
        task_id: task_id.to_string(),
    }))
}

/// POST /api/v1/accounts/{account}/tasks/{id}/cancel
async fn cancel_task<H>(
    State(handler): State<Arc<H>>,
    Path((account, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let previous_stage = handler
        .cancel_task(&AccountId::from(account), &TaskId::from(id))
        .await?;
    Ok(Json(CancelTaskResponse { previous_stage }))
}

/// POST /api/v1/callbacks
async fn register_callback<H>(
    State(handler): State<Arc<H>>,
    Json(destination): Json<CallbackDestination>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let token = handler.register_callback(destination).await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterCallbackResponse {
            callback_token: token.to_string(),
        }),
    ))
}

// ============================================================================
// Handlers: worker reporting
// ============================================================================

/// POST /api/v1/accounts/{account}/tasks/{id}/status
async fn report_task_status<H>(
    State(handler): State<Arc<H>>,
    Path((account, id)): Path<(String, String)>,
    Json(body): Json<ResultBody>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let result = body.into_result()?;
    let ack = handler
        .report_task_status(&AccountId::from(account), &TaskId::from(id), result)
        .await?;
    Ok(Json(ReportStatusResponse {
        duplicate: ack == ReportAck::Duplicate,
    }))
}

/// POST /api/v1/accounts/{account}/tasks/{id}/progress
async fn report_task_progress<H>(
    State(handler): State<Arc<H>>,
    Path((account, id)): Path<(String, String)>,
    Json(req): Json<ReportProgressRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let payload = req.payload.into_payload()?;
    let token = req
        .callback_token
        .filter(|s| !s.trim().is_empty())
        .map(CallbackToken::from);
    handler
        .report_task_progress(&AccountId::from(account), &TaskId::from(id), token, payload)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/accounts/{account}/tasks/{id}/acquire
async fn acquire_task<H>(
    State(handler): State<Arc<H>>,
    Path((account, id)): Path<(String, String)>,
    Json(req): Json<AcquireTaskRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    if req.worker_id.trim().is_empty() {
        return Err(ApiError::InvalidRequest("workerId cannot be empty".into()));
    }
    let record = handler
        .acquire_task(
            &AccountId::from(account),
            &TaskId::from(id),
            &WorkerId::from(req.worker_id),
        )
        .await?;
    Ok(Json(DispatchedTaskBody::from(record)))
}

// ============================================================================
// Handlers: worker fleet
// ============================================================================

/// GET /api/v1/accounts/{account}/task-types/{task_type}/supported
async fn is_task_type_supported<H>(
    State(handler): State<Arc<H>>,
    Path((account, task_type)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let supported = handler
        .is_task_type_supported(&AccountId::from(account), &task_type)
        .await?;
    Ok(Json(SupportedResponse { supported }))
}

/// POST /api/v1/accounts/{account}/workers
async fn register_worker<H>(
    State(handler): State<Arc<H>>,
    Path(account): Path<String>,
    Json(req): Json<RegisterWorkerRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    if req.worker_id.trim().is_empty() {
        return Err(ApiError::InvalidRequest("workerId cannot be empty".into()));
    }
    let profile = WorkerProfile::new(WorkerId::from(req.worker_id), AccountId::from(account))
        .with_selectors(req.selectors)
        .with_task_types(req.task_types);
    handler.register_worker(profile).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/accounts/{account}/workers/{worker}/poll
async fn poll_task<H>(
    State(handler): State<Arc<H>>,
    Path((account, worker)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let task = handler
        .poll_task(&AccountId::from(account), &WorkerId::from(worker))
        .await?;
    Ok(Json(PollTaskResponse {
        task: task.map(DispatchedTaskBody::from),
    }))
}

/// POST /api/v1/accounts/{account}/workers/{worker}/cancellations
async fn take_cancellations<H>(
    State(handler): State<Arc<H>>,
    Path((account, worker)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let ids = handler
        .pending_cancellations(&AccountId::from(account), &WorkerId::from(worker))
        .await?;
    Ok(Json(CancellationsResponse {
        task_ids: ids.into_iter().map(|id| id.to_string()).collect(),
    }))
}

/// GET /api/v1/accounts/{account}/workers/{worker}/perpetual-tasks
async fn perpetual_assignments<H>(
    State(handler): State<Arc<H>>,
    Path((account, worker)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let assignments = handler
        .perpetual_assignments(&AccountId::from(account), &WorkerId::from(worker))
        .await?;
    let body: Vec<PerpetualAssignmentBody> = assignments
        .into_iter()
        .map(PerpetualAssignmentBody::from)
        .collect();
    Ok(Json(body))
}

// ============================================================================
// Handlers: perpetual tasks
// ============================================================================

/// POST /api/v1/accounts/{account}/perpetual-tasks
async fn create_perpetual_task<H>(
    State(handler): State<Arc<H>>,
    Path(account): Path<String>,
    Json(req): Json<CreatePerpetualRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let mut create = CreatePerpetualTask::new(account, req.task_type, req.context)
        .with_schedule(req.schedule)
        .with_description(req.description);
    create.allow_duplicate = req.allow_duplicate;

    let id = handler.create_perpetual_task(create).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatePerpetualResponse {
            perpetual_task_id: id.to_string(),
        }),
    ))
}

/// GET /api/v1/accounts/{account}/perpetual-tasks
async fn list_perpetual_tasks<H>(
    State(handler): State<Arc<H>>,
    Path(account): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let tasks = handler
        .list_perpetual_tasks(&AccountId::from(account))
        .await?;
    Ok(Json(tasks))
}

/// GET /api/v1/accounts/{account}/perpetual-tasks/{id}
async fn get_perpetual_task<H>(
    State(handler): State<Arc<H>>,
    Path((account, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let task = handler
        .get_perpetual_task(&AccountId::from(account), &PerpetualTaskId::from(id))
        .await?;
    Ok(Json(task))
}

/// DELETE /api/v1/accounts/{account}/perpetual-tasks/{id}
async fn delete_perpetual_task<H>(
    State(handler): State<Arc<H>>,
    Path((account, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    handler
        .delete_perpetual_task(&AccountId::from(account), &PerpetualTaskId::from(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/accounts/{account}/perpetual-tasks/{id}/reset
async fn reset_perpetual_task<H>(
    State(handler): State<Arc<H>>,
    Path((account, id)): Path<(String, String)>,
    Json(req): Json<ResetPerpetualRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    handler
        .reset_perpetual_task(
            &AccountId::from(account),
            &PerpetualTaskId::from(id),
            req.context,
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
