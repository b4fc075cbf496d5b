//! Prometheus metrics backend for the relay dispatch core.
//!
//! [`PrometheusMetrics`] implements [`relay_core::metrics::MetricsBackend`]; inject it with
//! `TaskServiceBuilder::with_metrics` and serve [`PrometheusMetrics::encode_text`] from a
//! `/metrics` route.
//!
//! ## Metrics
//! - `relay_tasks_submitted_total{mode, parked}` - Counter
//! - `relay_submissions_rejected_total{reason}` - Counter
//! - `relay_tasks_finished_total{task_type, status}` - Counter
//! - `relay_task_duration_seconds{task_type}` - Histogram
//! - `relay_sync_wait_timeouts_total{task_type}` - Counter
//! - `relay_duplicate_reports_total` - Counter
mod backend;
pub use backend::PrometheusMetrics;

pub use prometheus::{Encoder, Registry, TextEncoder};
