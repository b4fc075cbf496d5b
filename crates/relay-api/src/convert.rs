use relay_core::fleet::PerpetualAssignment;
use relay_model::{
    AccountId, CallbackToken, CreatePerpetualTask, ExecutionMode, Labels, PayloadFormat,
    PerpetualClientContext, PerpetualSchedule, ResultOutcome, SubmitSpec, TaskPayload,
    TaskRecord, TaskResult, TaskSelector, TaskStage,
};

use crate::error::ApiError;
use crate::proto;

// ============================================================================
// Payload conversions
// ============================================================================

impl TryFrom<proto::Payload> for TaskPayload {
    type Error = ApiError;

    fn try_from(p: proto::Payload) -> Result<Self, Self::Error> {
        let format = if p.format.trim().is_empty() {
            PayloadFormat::default()
        } else {
            p.format.parse::<PayloadFormat>()?
        };
        Ok(TaskPayload::new(format, p.data))
    }
}

impl From<TaskPayload> for proto::Payload {
    fn from(p: TaskPayload) -> Self {
        proto::Payload {
            format: p.format.as_str().to_string(),
            data: p.data,
        }
    }
}

/// Missing payload message is treated as an empty binary payload.
pub(crate) fn payload_from_proto(p: Option<proto::Payload>) -> Result<TaskPayload, ApiError> {
    p.map(TaskPayload::try_from)
        .transpose()
        .map(Option::unwrap_or_default)
}

// ============================================================================
// Stage / mode conversions
// ============================================================================

impl From<TaskStage> for proto::TaskStage {
    fn from(stage: TaskStage) -> Self {
        match stage {
            TaskStage::Unspecified => proto::TaskStage::Unspecified,
            TaskStage::Parked => proto::TaskStage::Parked,
            TaskStage::Queued => proto::TaskStage::Queued,
            TaskStage::Dispatched => proto::TaskStage::Dispatched,
            TaskStage::Acquired => proto::TaskStage::Acquired,
            TaskStage::Completed => proto::TaskStage::Completed,
            TaskStage::Failed => proto::TaskStage::Failed,
            TaskStage::Expired => proto::TaskStage::Expired,
            TaskStage::Aborted => proto::TaskStage::Aborted,
        }
    }
}

pub(crate) fn stage_to_proto(stage: TaskStage) -> i32 {
    proto::TaskStage::from(stage) as i32
}

/// Unspecified mode defaults to async.
fn mode_from_proto(raw: i32) -> Result<ExecutionMode, ApiError> {
    match proto::ExecutionMode::try_from(raw) {
        Ok(proto::ExecutionMode::Unspecified) | Ok(proto::ExecutionMode::Async) => {
            Ok(ExecutionMode::Async)
        }
        Ok(proto::ExecutionMode::Sync) => Ok(ExecutionMode::Sync),
        Err(_) => Err(ApiError::InvalidRequest(format!(
            "invalid execution mode: {raw}"
        ))),
    }
}

// ============================================================================
// TaskResult conversions
// ============================================================================

impl TryFrom<proto::TaskResult> for TaskResult {
    type Error = ApiError;

    fn try_from(r: proto::TaskResult) -> Result<Self, Self::Error> {
        let result = if r.success {
            TaskResult::success(None)
        } else {
            TaskResult::failure(r.failure_reason)
        };
        match r.payload {
            Some(p) => Ok(result.with_payload(TaskPayload::try_from(p)?)),
            None => Ok(result),
        }
    }
}

impl From<TaskResult> for proto::TaskResult {
    fn from(r: TaskResult) -> Self {
        let (success, failure_reason) = match r.outcome {
            ResultOutcome::Success => (true, String::new()),
            ResultOutcome::Failure { reason } => (false, reason),
        };
        proto::TaskResult {
            success,
            failure_reason,
            payload: r.payload.map(proto::Payload::from),
        }
    }
}

// ============================================================================
// SubmitSpec conversions (Proto → Domain)
// ============================================================================

impl TryFrom<proto::SubmitTaskRequest> for SubmitSpec {
    type Error = ApiError;

    fn try_from(req: proto::SubmitTaskRequest) -> Result<Self, Self::Error> {
        let selectors = req
            .selectors
            .into_iter()
            .map(|s| {
                let sel = TaskSelector::new(s.selector);
                if s.origin.trim().is_empty() {
                    sel
                } else {
                    sel.with_origin(s.origin)
                }
            })
            .collect();

        Ok(SubmitSpec {
            account_id: AccountId::from(req.account_id),
            task_type: req.task_type,
            payload: payload_from_proto(req.payload)?,
            mode: mode_from_proto(req.mode)?,
            parked: req.parked,
            selectors,
            runner_tag: req.runner_tag,
            execution_infra_ref: req.execution_infra_ref.filter(|s| !s.trim().is_empty()),
            callback_token: req
                .callback_token
                .filter(|s| !s.trim().is_empty())
                .map(CallbackToken::from),
            execution_timeout_ms: req.execution_timeout_ms,
            queue_timeout_ms: req.queue_timeout_ms,
            setup_abstractions: Labels::from_iter(req.setup_abstractions),
        })
    }
}

impl From<TaskRecord> for proto::DispatchedTask {
    fn from(r: TaskRecord) -> Self {
        proto::DispatchedTask {
            task_id: r.id.to_string(),
            stage: stage_to_proto(r.stage()),
            task_type: r.task_type,
            payload: Some(proto::Payload::from(r.payload)),
            execution_timeout_ms: r.execution_timeout_ms,
            expires_at_ms: r.expires_at_ms,
            setup_abstractions: r.setup_abstractions.0.into_iter().collect(),
        }
    }
}

// ============================================================================
// Perpetual conversions
// ============================================================================

impl From<proto::ClientContext> for PerpetualClientContext {
    fn from(ctx: proto::ClientContext) -> Self {
        PerpetualClientContext {
            client_id: ctx.client_id,
            client_params: Labels::from_iter(ctx.client_params),
            execution_bundle: ctx.execution_bundle,
            last_context_updated_ms: 0,
        }
    }
}

impl From<PerpetualClientContext> for proto::ClientContext {
    fn from(ctx: PerpetualClientContext) -> Self {
        proto::ClientContext {
            client_id: ctx.client_id,
            client_params: ctx.client_params.0.into_iter().collect(),
            execution_bundle: ctx.execution_bundle,
        }
    }
}

impl From<PerpetualAssignment> for proto::PerpetualAssignment {
    fn from(a: PerpetualAssignment) -> Self {
        proto::PerpetualAssignment {
            perpetual_task_id: a.task.id.to_string(),
            task_type: a.task.task_type,
            context: Some(proto::ClientContext::from(a.task.context)),
            schedule: Some(proto::Schedule {
                interval_ms: a.task.schedule.interval_ms,
                timeout_ms: a.task.schedule.timeout_ms,
            }),
            refresh_pending: a.refresh_pending,
        }
    }
}

pub(crate) fn context_from_proto(
    ctx: Option<proto::ClientContext>,
) -> Result<PerpetualClientContext, ApiError> {
    let ctx = ctx.ok_or_else(|| ApiError::InvalidRequest("missing client context".into()))?;
    if ctx.client_id.trim().is_empty() {
        return Err(ApiError::InvalidRequest("client_id cannot be empty".into()));
    }
    Ok(PerpetualClientContext::from(ctx))
}

impl TryFrom<proto::CreatePerpetualTaskRequest> for CreatePerpetualTask {
    type Error = ApiError;

    fn try_from(req: proto::CreatePerpetualTaskRequest) -> Result<Self, Self::Error> {
        let schedule = req
            .schedule
            .map(|s| PerpetualSchedule {
                interval_ms: s.interval_ms,
                timeout_ms: s.timeout_ms,
            })
            .unwrap_or_default();

        let mut create =
            CreatePerpetualTask::new(req.account_id, req.task_type, context_from_proto(req.context)?)
                .with_schedule(schedule)
                .with_description(req.description);
        create.allow_duplicate = req.allow_duplicate;
        Ok(create)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn unknown_payload_format_is_rejected() {
        let p = proto::Payload {
            format: "xml".into(),
            data: b"<a/>".to_vec(),
        };
        assert!(matches!(TaskPayload::try_from(p), Err(ApiError::InvalidRequest(_))));
    }

    #[test]
    fn submit_request_maps_optional_fields() {
        let req = proto::SubmitTaskRequest {
            account_id: "acc".into(),
            task_type: "shell".into(),
            payload: None,
            mode: proto::ExecutionMode::Sync as i32,
            parked: false,
            selectors: vec![proto::Selector {
                selector: "gpu".into(),
                origin: String::new(),
            }],
            runner_tag: "linux".into(),
            execution_infra_ref: Some(" ".into()),
            callback_token: None,
            execution_timeout_ms: Some(5_000),
            queue_timeout_ms: None,
            setup_abstractions: HashMap::from([("stageId".to_string(), "s-1".to_string())]),
        };

        let spec = SubmitSpec::try_from(req).unwrap();
        assert_eq!(spec.mode, ExecutionMode::Sync);
        assert!(spec.execution_infra_ref.is_none());
        assert_eq!(spec.payload.format, PayloadFormat::Binary);
        assert_eq!(spec.selectors[0].origin, None);
        assert_eq!(spec.stage_id(), Some("s-1"));
    }

    #[test]
    fn out_of_range_mode_is_rejected() {
        assert!(mode_from_proto(42).is_err());
        assert_eq!(mode_from_proto(0).unwrap(), ExecutionMode::Async);
    }

    #[test]
    fn failure_result_keeps_reason() {
        let r = proto::TaskResult::from(TaskResult::failure("boom"));
        assert!(!r.success);
        assert_eq!(r.failure_reason, "boom");

        let back = TaskResult::try_from(r).unwrap();
        assert_eq!(back, TaskResult::failure("boom"));
    }

    #[test]
    fn context_requires_client_id() {
        assert!(context_from_proto(None).is_err());
        assert!(context_from_proto(Some(proto::ClientContext::default())).is_err());
    }
}
