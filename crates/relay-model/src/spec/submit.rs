use serde::{Deserialize, Serialize};

use crate::{
    AccountId, CallbackToken, ExecutionMode, LABEL_STAGE_ID, LABEL_WORKFLOW_EXECUTION_ID, Labels,
    TaskPayload, TaskSelector, TimeoutMs,
};

/// Caller request to run a one-shot task on some eligible worker.
///
/// `SubmitSpec` describes *what* to run (`task_type`, `payload`), *where* it may run
/// (`selectors`, `runner_tag`, `execution_infra_ref`) and *how* the caller waits (`mode`,
/// `callback_token`). Capabilities are derived from it by the resolver; a `SubmitSpec`
/// is never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitSpec {
    pub account_id: AccountId,
    /// Free-form type tag; workers advertise which types they support.
    pub task_type: String,
    pub payload: TaskPayload,
    #[serde(default)]
    pub mode: ExecutionMode,
    /// Hold the task back from dispatch until it is explicitly released.
    #[serde(default)]
    pub parked: bool,
    /// Caller selectors in request order. Blank entries are ignored.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selectors: Vec<TaskSelector>,
    /// Runner type the worker must advertise. Required.
    pub runner_tag: String,
    /// Optional pre-provisioned execution context to pin the task to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_infra_ref: Option<String>,
    /// Token obtained from callback registration; required for async result delivery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_token: Option<CallbackToken>,
    /// Hard execution timeout. Falls back to the coordinator default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_timeout_ms: Option<TimeoutMs>,
    /// How long the task may wait for a worker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_timeout_ms: Option<TimeoutMs>,
    /// Correlation ids carried for observability.
    #[serde(default, skip_serializing_if = "Labels::is_empty")]
    pub setup_abstractions: Labels,
}

impl SubmitSpec {
    /// Minimal async spec; everything else through the `with_*` helpers.
    pub fn new(
        account_id: impl Into<AccountId>,
        task_type: impl Into<String>,
        payload: TaskPayload,
        runner_tag: impl Into<String>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            task_type: task_type.into(),
            payload,
            mode: ExecutionMode::Async,
            parked: false,
            selectors: Vec::new(),
            runner_tag: runner_tag.into(),
            execution_infra_ref: None,
            callback_token: None,
            execution_timeout_ms: None,
            queue_timeout_ms: None,
            setup_abstractions: Labels::new(),
        }
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn parked(mut self) -> Self {
        self.parked = true;
        self
    }

    pub fn with_selector(mut self, selector: TaskSelector) -> Self {
        self.selectors.push(selector);
        self
    }

    pub fn with_infra_ref(mut self, infra_ref: impl Into<String>) -> Self {
        self.execution_infra_ref = Some(infra_ref.into());
        self
    }

    pub fn with_callback(mut self, token: CallbackToken) -> Self {
        self.callback_token = Some(token);
        self
    }

    pub fn with_execution_timeout(mut self, ms: TimeoutMs) -> Self {
        self.execution_timeout_ms = Some(ms);
        self
    }

    pub fn with_queue_timeout(mut self, ms: TimeoutMs) -> Self {
        self.queue_timeout_ms = Some(ms);
        self
    }

    /// Attach the workflow execution correlation id.
    pub fn with_workflow_execution_id(mut self, id: impl Into<String>) -> Self {
        self.setup_abstractions.insert(LABEL_WORKFLOW_EXECUTION_ID, id);
        self
    }

    /// Attach the stage correlation id.
    pub fn with_stage_id(mut self, id: impl Into<String>) -> Self {
        self.setup_abstractions.insert(LABEL_STAGE_ID, id);
        self
    }

    pub fn workflow_execution_id(&self) -> Option<&str> {
        self.setup_abstractions.get(LABEL_WORKFLOW_EXECUTION_ID)
    }

    pub fn stage_id(&self) -> Option<&str> {
        self.setup_abstractions.get(LABEL_STAGE_ID)
    }
}
