mod domain;
pub use domain::{AccountId, CallbackToken, PerpetualTaskId, TaskId, WorkerId};
pub use domain::{LABEL_STAGE_ID, LABEL_WORKFLOW_EXECUTION_ID, ORIGIN_DEFAULT};
pub use domain::{Labels, TimeoutMs, UnixMs, now_ms};

mod error;
pub use error::{ModelError, ModelResult};

mod capability;
pub use capability::{Capability, SelectorOrigin, TaskSelector, WorkerProfile};

mod task;
pub use task::{
    ExecutionMode, PayloadFormat, ProgressEvent, ProgressPayload, ResultOutcome, TaskPayload,
    TaskRecord, TaskResult, TaskStage, TaskStatus,
};

mod spec;
pub use spec::SubmitSpec;

mod perpetual;
pub use perpetual::{CreatePerpetualTask, PerpetualClientContext, PerpetualSchedule, PerpetualTask};

mod callback;
pub use callback::CallbackDestination;
