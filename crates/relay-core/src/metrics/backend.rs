use std::sync::Arc;

use relay_model::{ExecutionMode, TaskStatus};

/// Backend metrics collection interface.
///
/// Every method is called on the hot path and must not block.
pub trait MetricsBackend: Send + Sync + 'static {
    /// Record a task that passed validation and was persisted.
    ///
    /// # Arguments
    /// - `mode`: How the caller waits for the result
    /// - `parked`: Whether the task was held back from dispatch
    fn record_task_submitted(&self, mode: ExecutionMode, parked: bool);
    /// Record a submission rejected before persistence.
    ///
    /// # Arguments
    /// - `reason`: Error kind (see `CoreError::kind`)
    fn record_submission_rejected(&self, reason: &str);
    /// Record a task reaching a terminal status.
    ///
    /// # Arguments
    /// - `task_type`: Task type tag
    /// - `status`: Terminal status
    /// - `duration_ms`: Time from creation to completion
    fn record_task_finished(&self, task_type: &str, status: TaskStatus, duration_ms: u64);
    /// Record a sync caller giving up after the total expiry.
    fn record_sync_timeout(&self, task_type: &str);
    /// Record a status report for an already terminal task.
    fn record_duplicate_report(&self);
}

/// Shared handle to metrics backend.
pub type MetricsHandle = Arc<dyn MetricsBackend>;
