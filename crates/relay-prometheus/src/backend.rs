use std::sync::Arc;

use prometheus::{
    Counter, CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
    proto::MetricFamily,
};

use relay_core::metrics::MetricsBackend;
use relay_model::{ExecutionMode, TaskStatus};

const NAMESPACE: &str = "relay";

/// Prometheus metrics backend.
///
/// ## Label cardinality
/// - `mode`: "async", "sync"
/// - `parked`: "true", "false"
/// - `reason`: error kinds from `CoreError::kind`
/// - `status`: terminal statuses only
/// - `task_type`: caller supplied; bounded by the task types workers advertise
#[derive(Clone)]
pub struct PrometheusMetrics {
    submitted: CounterVec,
    rejected: CounterVec,
    finished: CounterVec,
    duration: HistogramVec,
    sync_timeouts: CounterVec,
    duplicate_reports: Counter,
    registry: Arc<Registry>,
}

impl PrometheusMetrics {
    /// Create a backend registering its collectors into `registry`.
    pub fn new_with_registry(registry: Arc<Registry>) -> Result<Self, prometheus::Error> {
        let submitted = CounterVec::new(
            Opts::new("tasks_submitted_total", "Tasks accepted and persisted").namespace(NAMESPACE),
            &["mode", "parked"],
        )?;
        registry.register(Box::new(submitted.clone()))?;

        let rejected = CounterVec::new(
            Opts::new(
                "submissions_rejected_total",
                "Submissions rejected before persistence",
            )
            .namespace(NAMESPACE),
            &["reason"],
        )?;
        registry.register(Box::new(rejected.clone()))?;

        let finished = CounterVec::new(
            Opts::new("tasks_finished_total", "Tasks that reached a terminal status")
                .namespace(NAMESPACE),
            &["task_type", "status"],
        )?;
        registry.register(Box::new(finished.clone()))?;

        let duration = HistogramVec::new(
            HistogramOpts::new(
                "task_duration_seconds",
                "Time from creation to terminal status in seconds",
            )
            .namespace(NAMESPACE)
            .buckets(vec![0.05, 0.1, 0.5, 1.0, 5.0, 30.0, 60.0, 300.0, 600.0, 1800.0]),
            &["task_type"],
        )?;
        registry.register(Box::new(duration.clone()))?;

        let sync_timeouts = CounterVec::new(
            Opts::new(
                "sync_wait_timeouts_total",
                "Sync submissions whose caller gave up waiting",
            )
            .namespace(NAMESPACE),
            &["task_type"],
        )?;
        registry.register(Box::new(sync_timeouts.clone()))?;

        let duplicate_reports = Counter::with_opts(
            Opts::new(
                "duplicate_reports_total",
                "Status reports for tasks that were already terminal",
            )
            .namespace(NAMESPACE),
        )?;
        registry.register(Box::new(duplicate_reports.clone()))?;

        Ok(Self {
            submitted,
            rejected,
            finished,
            duration,
            sync_timeouts,
            duplicate_reports,
            registry,
        })
    }

    /// Create a backend with its own registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::new_with_registry(Arc::new(Registry::new()))
    }

    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Text exposition of every registered metric, plus its content type.
    pub fn encode_text(&self) -> Result<(String, String), prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buf = Vec::new();
        encoder.encode(&self.gather(), &mut buf)?;
        let body = String::from_utf8(buf)
            .map_err(|e| prometheus::Error::Msg(format!("non-utf8 exposition: {e}")))?;
        Ok((body, encoder.format_type().to_string()))
    }

    /// Underlying registry, for registering process-level collectors alongside ours.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }
}

impl MetricsBackend for PrometheusMetrics {
    fn record_task_submitted(&self, mode: ExecutionMode, parked: bool) {
        let parked = if parked { "true" } else { "false" };
        self.submitted
            .with_label_values(&[mode.as_label(), parked])
            .inc();
    }

    fn record_submission_rejected(&self, reason: &str) {
        self.rejected.with_label_values(&[reason]).inc();
    }

    fn record_task_finished(&self, task_type: &str, status: TaskStatus, duration_ms: u64) {
        self.finished
            .with_label_values(&[task_type, status.as_label()])
            .inc();
        self.duration
            .with_label_values(&[task_type])
            .observe(duration_ms as f64 / 1000.0);
    }

    fn record_sync_timeout(&self, task_type: &str) {
        self.sync_timeouts.with_label_values(&[task_type]).inc();
    }

    fn record_duplicate_report(&self) {
        self.duplicate_reports.inc();
    }
}
