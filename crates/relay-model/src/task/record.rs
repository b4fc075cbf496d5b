use serde::{Deserialize, Serialize};

use crate::{
    AccountId, CallbackToken, Capability, ExecutionMode, Labels, TaskId, TaskPayload, TaskStage,
    TaskStatus, TimeoutMs, UnixMs, WorkerId,
};

/// Outcome reported by the worker for a finished task.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ResultOutcome {
    Success,
    Failure { reason: String },
}

/// Terminal report: outcome plus optional result bytes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    pub outcome: ResultOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<TaskPayload>,
}

impl TaskResult {
    pub fn success(payload: Option<TaskPayload>) -> Self {
        Self {
            outcome: ResultOutcome::Success,
            payload,
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            outcome: ResultOutcome::Failure {
                reason: reason.into(),
            },
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: TaskPayload) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ResultOutcome::Success)
    }

    /// Status the task moves to when this result is accepted.
    pub fn terminal_status(&self) -> TaskStatus {
        match self.outcome {
            ResultOutcome::Success => TaskStatus::Completed,
            ResultOutcome::Failure { .. } => TaskStatus::Failed,
        }
    }
}

/// Intermediate progress bytes. Format handling is the same as for task payloads.
pub type ProgressPayload = TaskPayload;

/// A progress report appended to a task record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub reported_at_ms: UnixMs,
    pub payload: ProgressPayload,
}

/// Persisted state of a one-shot task.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub id: TaskId,
    pub account_id: AccountId,
    pub task_type: String,
    pub payload: TaskPayload,
    /// Conjunctive requirements in resolver order.
    pub capabilities: Vec<Capability>,
    pub mode: ExecutionMode,
    pub status: TaskStatus,

    pub created_at_ms: UnixMs,
    /// `created_at_ms + queue timeout`; absent when no queue timeout was given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at_ms: Option<UnixMs>,
    pub execution_timeout_ms: TimeoutMs,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_timeout_ms: Option<TimeoutMs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatched_at_ms: Option<UnixMs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at_ms: Option<UnixMs>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_token: Option<CallbackToken>,
    /// Correlation ids; opaque to scheduling.
    #[serde(default)]
    pub setup_abstractions: Labels,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<WorkerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub progress: Vec<ProgressEvent>,
}

impl TaskRecord {
    pub fn stage(&self) -> TaskStage {
        TaskStage::from(self.status)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Latest instant the task may still be running: created + execution + queue timeout.
    pub fn total_expiry_ms(&self) -> UnixMs {
        self.created_at_ms
            .saturating_add(self.execution_timeout_ms)
            .saturating_add(self.queue_timeout_ms.unwrap_or(0))
    }

    /// Time from creation to completion, once terminal.
    pub fn duration_ms(&self) -> Option<u64> {
        self.completed_at_ms
            .map(|done| done.saturating_sub(self.created_at_ms))
    }
}
