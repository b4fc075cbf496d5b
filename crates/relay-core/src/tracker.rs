//! Worker reports, stage queries and cancellation.
//!
//! Terminal reports are applied with a compare-and-swap, so of two racing reports exactly
//! one wins; the loser is acknowledged as a duplicate and never re-delivered.
use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use relay_model::{
    AccountId, CallbackToken, ExecutionMode, ProgressEvent, ProgressPayload, TaskId, TaskRecord,
    TaskResult, TaskStage, TaskStatus, now_ms,
};

use crate::{
    callback::{CallbackRegistry, Delivery, DeliveryEnvelope, ResultDelivery},
    dispatch::{Completion, WaitRegistry},
    error::{CoreError, CoreResult},
    fleet::WorkerFleet,
    metrics::MetricsHandle,
    store::{StatusGuard, TaskStore, Transition, TransitionPatch},
};

/// Acknowledgement of a terminal status report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportAck {
    /// The report moved the task to its terminal status.
    Accepted,
    /// The task was already terminal; the report changed nothing.
    Duplicate,
}

pub struct ProgressTracker {
    store: Arc<dyn TaskStore>,
    fleet: Arc<dyn WorkerFleet>,
    waiters: Arc<WaitRegistry>,
    callbacks: Arc<dyn CallbackRegistry>,
    delivery: Arc<dyn ResultDelivery>,
    metrics: MetricsHandle,
}

impl ProgressTracker {
    pub fn new(
        store: Arc<dyn TaskStore>,
        fleet: Arc<dyn WorkerFleet>,
        waiters: Arc<WaitRegistry>,
        callbacks: Arc<dyn CallbackRegistry>,
        delivery: Arc<dyn ResultDelivery>,
        metrics: MetricsHandle,
    ) -> Self {
        Self {
            store,
            fleet,
            waiters,
            callbacks,
            delivery,
            metrics,
        }
    }

    async fn load(&self, account: &AccountId, id: &TaskId) -> CoreResult<TaskRecord> {
        self.store
            .get(account, id)
            .await?
            .ok_or_else(|| CoreError::TaskNotFound(id.clone()))
    }

    /// Apply a worker's terminal report.
    #[instrument(level = "debug", skip(self, result), fields(account = %account, task = %id, success = result.is_success()))]
    pub async fn report_status(
        &self,
        account: &AccountId,
        id: &TaskId,
        result: TaskResult,
    ) -> CoreResult<ReportAck> {
        let record = self.load(account, id).await?;
        if record.is_terminal() {
            return Ok(self.duplicate(&record));
        }

        let next = result.terminal_status();
        let patch = TransitionPatch::completed(now_ms()).with_result(result);
        let record = match self
            .store
            .transition(account, id, StatusGuard::Any, next, patch)
            .await?
        {
            Transition::Applied { record, .. } => record,
            Transition::Rejected { current } => {
                debug!(status = %current, "lost race against another terminal report");
                return Ok(self.duplicate(&record));
            }
            Transition::Missing => return Err(CoreError::TaskNotFound(id.clone())),
        };

        info!(status = %record.status, "task finished");
        self.metrics.record_task_finished(
            &record.task_type,
            record.status,
            record.duration_ms().unwrap_or(0),
        );
        self.signal_waiter(&record);

        if let (Some(token), Some(result)) = (&record.callback_token, &record.result) {
            let delivery = Delivery::Result {
                task_id: record.id.clone(),
                account_id: record.account_id.clone(),
                result: result.clone(),
            };
            self.deliver(token, delivery).await;
        }
        Ok(ReportAck::Accepted)
    }

    fn duplicate(&self, record: &TaskRecord) -> ReportAck {
        warn!(task = %record.id, status = %record.status, "status report for terminal task ignored");
        self.metrics.record_duplicate_report();
        ReportAck::Duplicate
    }

    fn signal_waiter(&self, record: &TaskRecord) {
        let completion = Completion {
            status: record.status,
            result: record.result.clone(),
        };
        let woken = self.waiters.notify(&record.id, completion);
        if !woken && record.mode == ExecutionMode::Sync {
            warn!(task = %record.id, status = %record.status, "orphaned sync completion: no local waiter");
        }
    }

    /// Resolve `token` and hand the delivery over. Failures are logged, never returned.
    async fn deliver(&self, token: &CallbackToken, delivery: Delivery) {
        let destination = match self.callbacks.resolve(token).await {
            Ok(Some(d)) => d,
            Ok(None) => {
                warn!(task = %delivery.task_id(), token = %token, "callback token no longer registered");
                return;
            }
            Err(e) => {
                error!(task = %delivery.task_id(), error = %e, "callback lookup failed");
                return;
            }
        };
        let task = delivery.task_id().clone();
        let envelope = DeliveryEnvelope {
            token: token.clone(),
            destination,
            delivery,
        };
        if let Err(e) = self.delivery.deliver(envelope).await {
            error!(task = %task, error = %e, "callback delivery failed");
        }
    }

    /// Record intermediate progress. Never changes the status.
    #[instrument(level = "debug", skip(self, payload), fields(account = %account, task = %id))]
    pub async fn report_progress(
        &self,
        account: &AccountId,
        id: &TaskId,
        token: Option<CallbackToken>,
        payload: ProgressPayload,
    ) -> CoreResult<()> {
        let record = self.load(account, id).await?;
        let event = ProgressEvent {
            reported_at_ms: now_ms(),
            payload,
        };
        if !self
            .store
            .append_progress(account, id, event.clone())
            .await?
        {
            return Err(CoreError::TaskNotFound(id.clone()));
        }

        if let Some(token) = token.or(record.callback_token) {
            let delivery = Delivery::Progress {
                task_id: id.clone(),
                account_id: account.clone(),
                event,
            };
            self.deliver(&token, delivery).await;
        }
        Ok(())
    }

    /// Current externally visible stage; `Unspecified` for unknown ids.
    pub async fn query_stage(&self, account: &AccountId, id: &TaskId) -> CoreResult<TaskStage> {
        let status = self.store.get(account, id).await?.map(|r| r.status);
        Ok(TaskStage::from(status))
    }

    /// Stored result once the task is terminal.
    pub async fn fetch_results(
        &self,
        account: &AccountId,
        id: &TaskId,
    ) -> CoreResult<Option<TaskResult>> {
        Ok(self
            .store
            .get(account, id)
            .await?
            .filter(|r| r.is_terminal())
            .and_then(|r| r.result))
    }

    /// Cancel a task, returning its stage as observed before cancellation.
    ///
    /// Before dispatch the task is aborted outright. After dispatch the request is only
    /// forwarded to the assigned worker and the status is left to its report.
    #[instrument(level = "debug", skip(self), fields(account = %account, task = %id))]
    pub async fn cancel(&self, account: &AccountId, id: &TaskId) -> CoreResult<TaskStage> {
        let Some(record) = self.store.get(account, id).await? else {
            return Ok(TaskStage::Unspecified);
        };
        if record.is_terminal() {
            debug!(status = %record.status, "cancel of terminal task is a no-op");
            return Ok(record.stage());
        }

        if record.status.is_pre_dispatch() {
            match self
                .store
                .transition(
                    account,
                    id,
                    StatusGuard::PRE_DISPATCH,
                    TaskStatus::Aborted,
                    TransitionPatch::completed(now_ms()),
                )
                .await?
            {
                Transition::Applied { previous, record } => {
                    info!(previous = %previous, "task aborted before dispatch");
                    self.metrics.record_task_finished(
                        &record.task_type,
                        record.status,
                        record.duration_ms().unwrap_or(0),
                    );
                    self.waiters.notify(
                        &record.id,
                        Completion {
                            status: TaskStatus::Aborted,
                            result: None,
                        },
                    );
                    if let Err(e) = self.fleet.cancel(&record).await {
                        error!(error = %e, "failed to withdraw aborted task from fleet");
                    }
                    return Ok(TaskStage::from(previous));
                }
                Transition::Missing => return Ok(TaskStage::Unspecified),
                Transition::Rejected { current } if current.is_terminal() => {
                    return Ok(TaskStage::from(current));
                }
                Transition::Rejected { current } => {
                    debug!(status = %current, "task was dispatched while cancelling");
                }
            }
        }

        // Dispatched or acquired: the worker owns the outcome now.
        let record = self.load(account, id).await?;
        if let Err(e) = self.fleet.cancel(&record).await {
            error!(error = %e, "failed to forward cancellation to worker");
        }
        info!(status = %record.status, "cancellation forwarded to worker");
        Ok(record.stage())
    }
}
