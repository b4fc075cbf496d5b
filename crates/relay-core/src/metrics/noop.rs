use relay_model::{ExecutionMode, TaskStatus};

use crate::metrics::backend::MetricsBackend;

/// No-op metrics backend that compiles to nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpMetrics;

impl MetricsBackend for NoOpMetrics {
    #[inline(always)]
    fn record_task_submitted(&self, _: ExecutionMode, _: bool) {}

    #[inline(always)]
    fn record_submission_rejected(&self, _: &str) {}

    #[inline(always)]
    fn record_task_finished(&self, _: &str, _: TaskStatus, _: u64) {}

    #[inline(always)]
    fn record_sync_timeout(&self, _: &str) {}

    #[inline(always)]
    fn record_duplicate_report(&self) {}
}
