use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Lifecycle status of a one-shot task.
///
/// ```text
/// Created ─┬─> Parked ──┐
///          └────────────┴─> Queued ─> Dispatched ─> Acquired ─> Completed | Failed | Expired | Aborted
/// ```
///
/// Transitions only move forward by [`TaskStatus::rank`]; `Parked -> Queued` is the one
/// re-entry point for work held back from dispatch. Terminal statuses never change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskStatus {
    Created,
    Parked,
    Queued,
    Dispatched,
    Acquired,
    Completed,
    Failed,
    Expired,
    Aborted,
}

impl TaskStatus {
    /// Position in the lifecycle partial order. All terminal statuses share the top rank.
    pub fn rank(self) -> u8 {
        match self {
            TaskStatus::Created => 0,
            TaskStatus::Parked => 1,
            TaskStatus::Queued => 2,
            TaskStatus::Dispatched => 3,
            TaskStatus::Acquired => 4,
            TaskStatus::Completed
            | TaskStatus::Failed
            | TaskStatus::Expired
            | TaskStatus::Aborted => 5,
        }
    }

    /// No further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Expired | TaskStatus::Aborted
        )
    }

    /// Not yet handed to any worker; cancellation is strict here.
    pub fn is_pre_dispatch(self) -> bool {
        matches!(
            self,
            TaskStatus::Created | TaskStatus::Parked | TaskStatus::Queued
        )
    }

    /// Returns `true` if `self -> to` is a legal lifecycle transition.
    pub fn can_transition_to(self, to: TaskStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self, to) {
            (_, TaskStatus::Completed | TaskStatus::Failed) => true,
            (TaskStatus::Created, TaskStatus::Parked | TaskStatus::Queued | TaskStatus::Aborted) => {
                true
            }
            (TaskStatus::Parked, TaskStatus::Queued | TaskStatus::Expired | TaskStatus::Aborted) => {
                true
            }
            (
                TaskStatus::Queued,
                TaskStatus::Dispatched | TaskStatus::Expired | TaskStatus::Aborted,
            ) => true,
            (
                TaskStatus::Dispatched,
                TaskStatus::Acquired | TaskStatus::Expired | TaskStatus::Aborted,
            ) => true,
            (TaskStatus::Acquired, TaskStatus::Expired | TaskStatus::Aborted) => true,
            _ => false,
        }
    }

    /// Canonical lowercase name, also used as a metrics label.
    pub fn as_label(self) -> &'static str {
        match self {
            TaskStatus::Created => "created",
            TaskStatus::Parked => "parked",
            TaskStatus::Queued => "queued",
            TaskStatus::Dispatched => "dispatched",
            TaskStatus::Acquired => "acquired",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Expired => "expired",
            TaskStatus::Aborted => "aborted",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

impl FromStr for TaskStatus {
    type Err = ModelError;
    fn from_str(s: &str) -> ModelResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "created" => Ok(TaskStatus::Created),
            "parked" => Ok(TaskStatus::Parked),
            "queued" => Ok(TaskStatus::Queued),
            "dispatched" => Ok(TaskStatus::Dispatched),
            "acquired" => Ok(TaskStatus::Acquired),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            "expired" => Ok(TaskStatus::Expired),
            "aborted" => Ok(TaskStatus::Aborted),
            other => Err(ModelError::UnknownStatus(other.to_string())),
        }
    }
}

/// Externally reported execution stage of a task.
///
/// Mirrors [`TaskStatus`] plus `Unspecified`, which answers queries about unknown ids.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskStage {
    #[default]
    Unspecified,
    Parked,
    Queued,
    Dispatched,
    Acquired,
    Completed,
    Failed,
    Expired,
    Aborted,
}

impl From<TaskStatus> for TaskStage {
    fn from(status: TaskStatus) -> Self {
        match status {
            // Never persisted: a record becomes visible as parked or queued.
            TaskStatus::Created => TaskStage::Queued,
            TaskStatus::Parked => TaskStage::Parked,
            TaskStatus::Queued => TaskStage::Queued,
            TaskStatus::Dispatched => TaskStage::Dispatched,
            TaskStatus::Acquired => TaskStage::Acquired,
            TaskStatus::Completed => TaskStage::Completed,
            TaskStatus::Failed => TaskStage::Failed,
            TaskStatus::Expired => TaskStage::Expired,
            TaskStatus::Aborted => TaskStage::Aborted,
        }
    }
}

impl From<Option<TaskStatus>> for TaskStage {
    fn from(status: Option<TaskStatus>) -> Self {
        status.map(TaskStage::from).unwrap_or_default()
    }
}

/// How the submitting caller waits for the result.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExecutionMode {
    /// Fire-and-forget; the result is delivered through a callback.
    #[default]
    Async,
    /// Caller blocks until the task is terminal or expires.
    Sync,
}

impl ExecutionMode {
    pub fn as_label(self) -> &'static str {
        match self {
            ExecutionMode::Async => "async",
            ExecutionMode::Sync => "sync",
        }
    }
}

impl FromStr for ExecutionMode {
    type Err = ModelError;
    fn from_str(s: &str) -> ModelResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "async" | "" => Ok(ExecutionMode::Async),
            "sync" => Ok(ExecutionMode::Sync),
            other => Err(ModelError::UnknownMode(other.to_string())),
        }
    }
}
