use thiserror::Error;

use relay_model::{CallbackToken, ModelError, PerpetualTaskId, TaskId, TaskStatus, WorkerId};

use crate::{
    callback::DeliveryError, fleet::FleetError, location::LocationError, store::StoreError,
};

/// Caller-visible error taxonomy of the dispatch core.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("runner tag must not be empty")]
    MissingRunnerTag,

    #[error("unsupported payload format: {0}")]
    SerializationUnsupported(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("callback token not registered: {0}")]
    CallbackNotFound(CallbackToken),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("execution infrastructure location not found: {0}")]
    InfrastructureLocationNotFound(String),

    #[error("no eligible worker for task type '{task_type}'")]
    NoEligibleWorker { task_type: String },

    #[error("task {task_id} did not finish within {waited_ms}ms")]
    SyncWaitTimeout { task_id: TaskId, waited_ms: u64 },

    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("task {task_id} is not parked (status: {status})")]
    NotParked { task_id: TaskId, status: TaskStatus },

    #[error("perpetual task not found: {0}")]
    PerpetualTaskNotFound(PerpetualTaskId),

    #[error("worker not registered: {0}")]
    WorkerNotFound(WorkerId),

    #[error("duplicate task id: {0}")]
    DuplicateTaskId(TaskId),

    #[error("store error: {0}")]
    Store(StoreError),

    #[error("fleet error: {0}")]
    Fleet(FleetError),

    #[error("location lookup error: {0}")]
    Location(#[from] LocationError),

    #[error("callback error: {0}")]
    Callback(#[from] DeliveryError),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Bad input from the caller.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CoreError::MissingRunnerTag
                | CoreError::SerializationUnsupported(_)
                | CoreError::InvalidPayload(_)
                | CoreError::CallbackNotFound(_)
                | CoreError::InvalidRequest(_)
                | CoreError::InfrastructureLocationNotFound(_)
        )
    }

    /// Referenced entity does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CoreError::TaskNotFound(_)
                | CoreError::PerpetualTaskNotFound(_)
                | CoreError::WorkerNotFound(_)
        )
    }

    /// Entity exists but its current state forbids the operation.
    pub fn is_conflict(&self) -> bool {
        matches!(self, CoreError::NotParked { .. })
    }

    /// Short stable name, used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::MissingRunnerTag => "missing_runner_tag",
            CoreError::SerializationUnsupported(_) => "serialization_unsupported",
            CoreError::InvalidPayload(_) => "invalid_payload",
            CoreError::CallbackNotFound(_) => "callback_not_found",
            CoreError::InvalidRequest(_) => "invalid_request",
            CoreError::InfrastructureLocationNotFound(_) => "location_not_found",
            CoreError::NoEligibleWorker { .. } => "no_eligible_worker",
            CoreError::SyncWaitTimeout { .. } => "sync_wait_timeout",
            CoreError::TaskNotFound(_) => "task_not_found",
            CoreError::NotParked { .. } => "not_parked",
            CoreError::PerpetualTaskNotFound(_) => "perpetual_task_not_found",
            CoreError::WorkerNotFound(_) => "worker_not_found",
            CoreError::DuplicateTaskId(_) => "duplicate_task_id",
            CoreError::Store(_) => "store",
            CoreError::Fleet(_) => "fleet",
            CoreError::Location(_) => "location",
            CoreError::Callback(_) => "callback",
        }
    }
}

impl From<ModelError> for CoreError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::UnsupportedFormat(tag) => CoreError::SerializationUnsupported(tag),
            ModelError::InvalidPayload { .. } => CoreError::InvalidPayload(e.to_string()),
            other => CoreError::InvalidRequest(other.to_string()),
        }
    }
}

impl From<StoreError> for CoreError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateId(id) => CoreError::DuplicateTaskId(id),
            other => CoreError::Store(other),
        }
    }
}

impl From<FleetError> for CoreError {
    fn from(e: FleetError) -> Self {
        match e {
            FleetError::NoEligibleWorker { task_type } => CoreError::NoEligibleWorker { task_type },
            FleetError::UnknownWorker(id) => CoreError::WorkerNotFound(id),
            other => CoreError::Fleet(other),
        }
    }
}
