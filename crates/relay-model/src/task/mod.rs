mod payload;
pub use payload::{PayloadFormat, TaskPayload};

mod record;
pub use record::{ProgressEvent, ProgressPayload, ResultOutcome, TaskRecord, TaskResult};

mod status;
pub use status::{ExecutionMode, TaskStage, TaskStatus};
