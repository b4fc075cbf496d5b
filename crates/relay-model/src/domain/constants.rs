//! Common model-level constants.
//!
//! Well-known label keys and defaults shared by the model, core and api layers.

/// Setup-abstraction key carrying the workflow execution correlation id.
///
/// Only used for observability; scheduling never reads it.
pub const LABEL_WORKFLOW_EXECUTION_ID: &str = "workflowExecutionId";

/// Setup-abstraction key carrying the pipeline stage correlation id.
pub const LABEL_STAGE_ID: &str = "stageId";

/// Origin recorded for user selectors submitted without an explicit origin.
pub const ORIGIN_DEFAULT: &str = "default";
