use thiserror::Error;
use tracing::error;

use relay_core::error::CoreError;
use relay_model::ModelError;

/// Transport-level error returned by every API handler.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("no eligible worker: {0}")]
    NoEligibleWorker(String),

    #[error("deadline exceeded: {0}")]
    DeadlineExceeded(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Stable machine-readable code sent in error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidRequest(_) => "invalid_argument",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::NoEligibleWorker(_) => "failed_precondition",
            ApiError::DeadlineExceeded(_) => "deadline_exceeded",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        if e.is_validation() {
            return ApiError::InvalidRequest(e.to_string());
        }
        if e.is_not_found() {
            return ApiError::NotFound(e.to_string());
        }
        if e.is_conflict() {
            return ApiError::Conflict(e.to_string());
        }
        match e {
            CoreError::NoEligibleWorker { .. } => ApiError::NoEligibleWorker(e.to_string()),
            CoreError::SyncWaitTimeout { .. } => ApiError::DeadlineExceeded(e.to_string()),
            other => {
                error!(kind = other.kind(), error = %other, "internal error while serving request");
                ApiError::Internal(other.to_string())
            }
        }
    }
}

impl From<ModelError> for ApiError {
    fn from(e: ModelError) -> Self {
        ApiError::from(CoreError::from(e))
    }
}

#[cfg(feature = "http")]
mod http_impl {
    use axum::{
        Json,
        http::StatusCode,
        response::{IntoResponse, Response},
    };
    use serde::Serialize;

    use super::ApiError;

    #[derive(Serialize)]
    struct ErrorBody<'a> {
        code: &'a str,
        message: String,
    }

    impl ApiError {
        pub fn status_code(&self) -> StatusCode {
            match self {
                ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                ApiError::NotFound(_) => StatusCode::NOT_FOUND,
                ApiError::Conflict(_) => StatusCode::CONFLICT,
                ApiError::NoEligibleWorker(_) => StatusCode::SERVICE_UNAVAILABLE,
                ApiError::DeadlineExceeded(_) => StatusCode::GATEWAY_TIMEOUT,
                ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            }
        }
    }

    impl IntoResponse for ApiError {
        fn into_response(self) -> Response {
            let status = self.status_code();
            let body = ErrorBody {
                code: self.code(),
                message: self.to_string(),
            };
            (status, Json(body)).into_response()
        }
    }
}

#[cfg(feature = "grpc")]
impl From<ApiError> for tonic::Status {
    fn from(e: ApiError) -> Self {
        let msg = e.to_string();
        match e {
            ApiError::InvalidRequest(_) => tonic::Status::invalid_argument(msg),
            ApiError::NotFound(_) => tonic::Status::not_found(msg),
            ApiError::Conflict(_) => tonic::Status::failed_precondition(msg),
            ApiError::NoEligibleWorker(_) => tonic::Status::failed_precondition(msg),
            ApiError::DeadlineExceeded(_) => tonic::Status::deadline_exceeded(msg),
            ApiError::Internal(_) => tonic::Status::internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::store::StoreError;
    use relay_model::{TaskId, TaskStatus};

    #[test]
    fn validation_errors_are_invalid_requests() {
        for e in [
            CoreError::MissingRunnerTag,
            CoreError::SerializationUnsupported("xml".into()),
            CoreError::InfrastructureLocationNotFound("infra-1".into()),
        ] {
            assert!(matches!(ApiError::from(e), ApiError::InvalidRequest(_)));
        }
    }

    #[test]
    fn releasing_a_queued_task_is_a_conflict() {
        let e = ApiError::from(CoreError::NotParked {
            task_id: TaskId::from("t-1"),
            status: TaskStatus::Queued,
        });
        assert!(matches!(e, ApiError::Conflict(_)));
        assert_eq!(e.code(), "conflict");
    }

    #[test]
    fn lookup_errors_are_not_found() {
        assert!(matches!(
            ApiError::from(CoreError::TaskNotFound(TaskId::from("t-2"))),
            ApiError::NotFound(_)
        ));
    }

    #[test]
    fn dispatch_errors_keep_their_meaning() {
        let unavailable = ApiError::from(CoreError::NoEligibleWorker {
            task_type: "shell".into(),
        });
        assert_eq!(unavailable.code(), "failed_precondition");

        let timeout = ApiError::from(CoreError::SyncWaitTimeout {
            task_id: TaskId::from("t-1"),
            waited_ms: 10,
        });
        assert_eq!(timeout.code(), "deadline_exceeded");
    }

    #[test]
    fn store_failures_are_internal() {
        let e = CoreError::Store(StoreError::Backend("disk full".into()));
        match ApiError::from(e) {
            ApiError::Internal(msg) => assert!(msg.contains("disk full")),
            other => panic!("expected Internal, got {other:?}"),
        }
    }

    #[test]
    fn unknown_format_maps_to_invalid_request() {
        let e = ApiError::from(ModelError::UnsupportedFormat("xml".into()));
        assert!(matches!(e, ApiError::InvalidRequest(_)));
    }
}
