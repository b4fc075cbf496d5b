use std::{sync::Arc, time::Duration};

use tokio::{
    sync::oneshot,
    time::{Instant, MissedTickBehavior},
};
use tracing::{debug, error, info, instrument, trace, warn};

use relay_model::{
    AccountId, Capability, ExecutionMode, LABEL_STAGE_ID, LABEL_WORKFLOW_EXECUTION_ID,
    SelectorOrigin, SubmitSpec, TaskId, TaskRecord, TaskResult, TaskStage, TaskStatus, UnixMs, WorkerId, now_ms,
};

use crate::{
    config::CoreConfig,
    dispatch::waiter::{Completion, WaitRegistry},
    error::{CoreError, CoreResult},
    fleet::WorkerFleet,
    metrics::MetricsHandle,
    store::{StatusGuard, TaskStore, Transition, TransitionPatch},
};

/// Submission whose capabilities have already been resolved.
#[derive(Debug, Clone)]
pub struct ResolvedTask {
    pub spec: SubmitSpec,
    pub capabilities: Vec<Capability>,
}

/// Answer to a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub task_id: TaskId,
    /// Instant after which the task is considered lost: created + execution + queue timeout.
    pub total_expiry_ms: UnixMs,
    /// Stage at return time: parked/queued for async, terminal for sync.
    pub stage: TaskStage,
    /// Worker result; only set for sync submissions.
    pub result: Option<TaskResult>,
}

/// Persists submissions, announces them to the fleet and hands them to polling workers.
pub struct DispatchCoordinator {
    config: CoreConfig,
    store: Arc<dyn TaskStore>,
    fleet: Arc<dyn WorkerFleet>,
    waiters: Arc<WaitRegistry>,
    metrics: MetricsHandle,
}

impl DispatchCoordinator {
    pub fn new(
        config: CoreConfig,
        store: Arc<dyn TaskStore>,
        fleet: Arc<dyn WorkerFleet>,
        waiters: Arc<WaitRegistry>,
        metrics: MetricsHandle,
    ) -> Self {
        Self {
            config,
            store,
            fleet,
            waiters,
            metrics,
        }
    }

    fn build_record(&self, spec: SubmitSpec, capabilities: Vec<Capability>) -> TaskRecord {
        let created_at_ms = now_ms();
        let status = if spec.parked {
            TaskStatus::Parked
        } else {
            TaskStatus::Queued
        };
        TaskRecord {
            id: TaskId::generate(),
            account_id: spec.account_id,
            task_type: spec.task_type,
            payload: spec.payload,
            capabilities,
            mode: spec.mode,
            status,
            created_at_ms,
            expires_at_ms: spec
                .queue_timeout_ms
                .map(|q| created_at_ms.saturating_add(q)),
            execution_timeout_ms: spec
                .execution_timeout_ms
                .unwrap_or(self.config.default_execution_timeout_ms),
            queue_timeout_ms: spec.queue_timeout_ms,
            dispatched_at_ms: None,
            completed_at_ms: None,
            callback_token: spec.callback_token,
            setup_abstractions: spec.setup_abstractions,
            worker_id: None,
            result: None,
            progress: Vec::new(),
        }
    }

    /// Validate, persist and (unless parked) announce a task.
    ///
    /// Every check runs before the single insert, so a failed submission leaves no record.
    /// Sync submissions then block until the task is terminal or its total expiry passes.
    #[instrument(
        level = "debug",
        skip(self, task),
        fields(
            account = %task.spec.account_id,
            task_type = %task.spec.task_type,
            mode = task.spec.mode.as_label(),
            parked = task.spec.parked,
        )
    )]
    pub async fn submit(&self, task: ResolvedTask) -> CoreResult<Submission> {
        let ResolvedTask { spec, capabilities } = task;
        spec.payload.validate()?;

        let record = self.build_record(spec, capabilities);
        if record.status == TaskStatus::Queued {
            self.fleet.ensure_eligible(&record).await?;
        }

        let waiter = match record.mode {
            ExecutionMode::Sync => Some(self.waiters.register(record.id.clone())),
            ExecutionMode::Async => None,
        };

        if let Err(e) = self.store.insert(record.clone()).await {
            if waiter.is_some() {
                self.waiters.remove(&record.id);
            }
            let err = CoreError::from(e);
            if let CoreError::DuplicateTaskId(_) = err {
                error!(
                    task = %record.id,
                    account = %record.account_id,
                    task_type = %record.task_type,
                    workflow_execution = record.setup_abstractions.get(LABEL_WORKFLOW_EXECUTION_ID).unwrap_or("-"),
                    stage = record.setup_abstractions.get(LABEL_STAGE_ID).unwrap_or("-"),
                    "duplicate task id on insert"
                );
            }
            return Err(err);
        }
        if record.status == TaskStatus::Queued {
            if let Err(e) = self.fleet.announce(&record).await {
                if waiter.is_some() {
                    self.waiters.remove(&record.id);
                }
                return Err(self.fail_unannounced(&record, e.into()).await);
            }
        }
        self.metrics
            .record_task_submitted(record.mode, record.status == TaskStatus::Parked);
        info!(
            task = %record.id,
            status = %record.status,
            capabilities = record.capabilities.len(),
            "task submitted"
        );

        let submission = Submission {
            task_id: record.id.clone(),
            total_expiry_ms: record.total_expiry_ms(),
            stage: record.stage(),
            result: None,
        };
        match waiter {
            None => Ok(submission),
            Some(rx) => self.wait_for_completion(&record, rx, submission).await,
        }
    }

    async fn wait_for_completion(
        &self,
        record: &TaskRecord,
        rx: oneshot::Receiver<Completion>,
        mut submission: Submission,
    ) -> CoreResult<Submission> {
        let budget = Duration::from_millis(record.total_expiry_ms().saturating_sub(now_ms()));
        let started = Instant::now();
        debug!(task = %record.id, budget_ms = budget.as_millis() as u64, "waiting for sync completion");

        let outcome = tokio::time::timeout(budget, self.await_terminal(record, rx)).await;
        self.waiters.remove(&record.id);

        match outcome {
            Ok(Ok(done)) => {
                submission.stage = TaskStage::from(done.status);
                submission.result = done.result;
                Ok(submission)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                let waited_ms = started.elapsed().as_millis() as u64;
                self.metrics.record_sync_timeout(&record.task_type);
                warn!(task = %record.id, waited_ms, "sync wait expired");
                Err(CoreError::SyncWaitTimeout {
                    task_id: record.id.clone(),
                    waited_ms,
                })
            }
        }
    }

    /// Resolve once the task is terminal, either through the local waiter or by re-reading
    /// the store (completions reported to another replica never reach our waiter).
    async fn await_terminal(
        &self,
        record: &TaskRecord,
        rx: oneshot::Receiver<Completion>,
    ) -> CoreResult<Completion> {
        let mut rx = Some(rx);
        let mut tick = tokio::time::interval(Duration::from_millis(
            self.config.sync_poll_interval_ms.max(1),
        ));
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tick.tick().await;

        loop {
            let woken = tokio::select! {
                res = recv_or_pending(&mut rx) => Some(res),
                _ = tick.tick() => None,
            };
            match woken {
                Some(Ok(done)) => return Ok(done),
                Some(Err(_)) => {
                    trace!(task = %record.id, "waiter dropped; falling back to store polling");
                    rx = None;
                }
                None => {}
            }

            if let Some(current) = self.store.get(&record.account_id, &record.id).await? {
                if current.is_terminal() {
                    return Ok(Completion {
                        status: current.status,
                        result: current.result,
                    });
                }
            }
        }
    }

    /// A queued task the fleet never heard of can't be claimed; fail it so it doesn't sit in
    /// the queue forever, and hand the fleet error back to the caller.
    async fn fail_unannounced(&self, record: &TaskRecord, cause: CoreError) -> CoreError {
        error!(task = %record.id, account = %record.account_id, error = %cause, "failed to announce queued task");
        let patch = TransitionPatch::completed(now_ms())
            .with_result(TaskResult::failure(format!("dispatch failed: {cause}")));
        match self
            .store
            .transition(
                &record.account_id,
                &record.id,
                StatusGuard::OneOf(&[TaskStatus::Queued]),
                TaskStatus::Failed,
                patch,
            )
            .await
        {
            Ok(Transition::Applied { .. }) => {}
            Ok(other) => debug!(task = %record.id, ?other, "unannounced task changed concurrently"),
            Err(e) => error!(task = %record.id, error = %e, "failed to mark unannounced task"),
        }
        cause
    }

    /// Move a parked task into the dispatch queue.
    ///
    /// If no eligible worker exists the task stays parked and the error is returned. If the
    /// fleet rejects the announcement the task is failed.
    #[instrument(level = "debug", skip(self), fields(account = %account, task = %id))]
    pub async fn release_parked(&self, account: &AccountId, id: &TaskId) -> CoreResult<TaskId> {
        let record = self
            .store
            .get(account, id)
            .await?
            .ok_or_else(|| CoreError::TaskNotFound(id.clone()))?;
        if record.status != TaskStatus::Parked {
            return Err(CoreError::NotParked {
                task_id: id.clone(),
                status: record.status,
            });
        }
        self.fleet.ensure_eligible(&record).await?;

        match self
            .store
            .transition(
                account,
                id,
                StatusGuard::OneOf(&[TaskStatus::Parked]),
                TaskStatus::Queued,
                TransitionPatch::none(),
            )
            .await?
        {
            Transition::Applied { record, .. } => {
                if let Err(e) = self.fleet.announce(&record).await {
                    return Err(self.fail_unannounced(&record, e.into()).await);
                }
                info!(task = %id, "parked task released");
                Ok(record.id)
            }
            Transition::Rejected { current } => Err(CoreError::NotParked {
                task_id: id.clone(),
                status: current,
            }),
            Transition::Missing => Err(CoreError::TaskNotFound(id.clone())),
        }
    }

    /// Hand the next eligible queued task to a polling worker.
    ///
    /// The claimed task is re-checked against the worker's profile before the
    /// `Queued -> Dispatched` swap, so a task is never dispatched to a worker missing any
    /// of its capabilities.
    #[instrument(level = "debug", skip(self), fields(account = %account, worker = %worker))]
    pub async fn poll(
        &self,
        account: &AccountId,
        worker: &WorkerId,
    ) -> CoreResult<Option<TaskRecord>> {
        loop {
            let Some(claim) = self.fleet.claim(account, worker).await? else {
                return Ok(None);
            };
            let Some(record) = self.store.get(account, &claim.task_id).await? else {
                warn!(task = %claim.task_id, "claimed task has no record");
                continue;
            };

            if let Some(unmet) = record
                .capabilities
                .iter()
                .find(|c| !c.matches(&claim.worker))
            {
                error!(
                    task = %record.id,
                    capability = unmet.kind(),
                    origin = ?unmet.origin(),
                    system_assigned = unmet.origin().is_some_and(SelectorOrigin::is_system),
                    "fleet offered a task to a worker missing its capabilities"
                );
                self.fleet.announce(&record).await?;
                return Ok(None);
            }

            match self
                .store
                .transition(
                    account,
                    &record.id,
                    StatusGuard::OneOf(&[TaskStatus::Queued]),
                    TaskStatus::Dispatched,
                    TransitionPatch::dispatched(worker.clone(), now_ms()),
                )
                .await?
            {
                Transition::Applied { record, .. } => {
                    info!(task = %record.id, "task dispatched");
                    return Ok(Some(record));
                }
                Transition::Rejected { current } => {
                    debug!(task = %record.id, status = %current, "claimed task is no longer queued");
                }
                Transition::Missing => {
                    warn!(task = %record.id, "claimed task disappeared");
                }
            }
        }
    }

    /// Worker confirms it started executing a dispatched task.
    #[instrument(level = "debug", skip(self), fields(account = %account, task = %id, worker = %worker))]
    pub async fn acquire(
        &self,
        account: &AccountId,
        id: &TaskId,
        worker: &WorkerId,
    ) -> CoreResult<TaskRecord> {
        let record = self
            .store
            .get(account, id)
            .await?
            .ok_or_else(|| CoreError::TaskNotFound(id.clone()))?;
        if record.worker_id.as_ref() != Some(worker) {
            return Err(CoreError::InvalidRequest(format!(
                "task {id} is not assigned to worker {worker}"
            )));
        }

        match self
            .store
            .transition(
                account,
                id,
                StatusGuard::OneOf(&[TaskStatus::Dispatched]),
                TaskStatus::Acquired,
                TransitionPatch::none(),
            )
            .await?
        {
            Transition::Applied { record, .. } => {
                debug!("task acquired");
                Ok(record)
            }
            Transition::Rejected {
                current: TaskStatus::Acquired,
            } => self
                .store
                .get(account, id)
                .await?
                .ok_or_else(|| CoreError::TaskNotFound(id.clone())),
            Transition::Rejected { current } => Err(CoreError::InvalidRequest(format!(
                "task {id} cannot be acquired while {current}"
            ))),
            Transition::Missing => Err(CoreError::TaskNotFound(id.clone())),
        }
    }
}

async fn recv_or_pending(
    rx: &mut Option<oneshot::Receiver<Completion>>,
) -> Result<Completion, oneshot::error::RecvError> {
    match rx {
        Some(rx) => rx.await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fleet::{FleetError, LocalFleet, faulty::FaultyFleet},
        metrics::noop_metrics,
        store::MemoryTaskStore,
    };
    use relay_model::{PayloadFormat, TaskPayload, WorkerProfile};
    use std::sync::atomic::Ordering;

    struct Fixture {
        store: Arc<MemoryTaskStore>,
        fleet: Arc<LocalFleet>,
        waiters: Arc<WaitRegistry>,
        coordinator: DispatchCoordinator,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryTaskStore::new());
        let fleet = Arc::new(LocalFleet::new());
        let waiters = Arc::new(WaitRegistry::new());
        let coordinator = DispatchCoordinator::new(
            CoreConfig::default().with_sync_poll_interval(10),
            store.clone(),
            fleet.clone(),
            waiters.clone(),
            noop_metrics(),
        );
        Fixture {
            store,
            fleet,
            waiters,
            coordinator,
        }
    }

    fn acc() -> AccountId {
        AccountId::from("acc")
    }

    async fn register(fleet: &LocalFleet, id: &str, selectors: &[&str]) {
        fleet
            .register_worker(
                WorkerProfile::new(WorkerId::from(id), acc())
                    .with_selectors(selectors.iter().copied())
                    .with_task_types(["shell"]),
            )
            .await
            .unwrap();
    }

    fn resolved(labels: &[&str]) -> ResolvedTask {
        ResolvedTask {
            spec: SubmitSpec::new("acc", "shell", TaskPayload::binary(b"run".to_vec()), "linux"),
            capabilities: labels
                .iter()
                .map(|l| Capability::system_selector(*l))
                .collect(),
        }
    }

    #[tokio::test]
    async fn async_submit_persists_queued_and_announces() {
        let f = fixture();
        register(&f.fleet, "w-1", &["linux"]).await;

        let mut task = resolved(&["linux"]);
        task.spec = task.spec.with_execution_timeout(5_000).with_queue_timeout(1_000);
        let sub = f.coordinator.submit(task).await.unwrap();

        assert_eq!(sub.stage, TaskStage::Queued);
        let record = f.store.get(&acc(), &sub.task_id).await.unwrap().unwrap();
        assert_eq!(record.status, TaskStatus::Queued);
        assert_eq!(sub.total_expiry_ms, record.created_at_ms + 6_000);
        assert_eq!(record.expires_at_ms, Some(record.created_at_ms + 1_000));
        assert_eq!(f.fleet.pending(&acc()), 1);
    }

    #[tokio::test]
    async fn missing_execution_timeout_uses_configured_default() {
        let f = fixture();
        register(&f.fleet, "w-1", &["linux"]).await;

        let sub = f.coordinator.submit(resolved(&["linux"])).await.unwrap();
        let record = f.store.get(&acc(), &sub.task_id).await.unwrap().unwrap();

        assert_eq!(record.execution_timeout_ms, 600_000);
        assert_eq!(record.expires_at_ms, None);
        assert_eq!(sub.total_expiry_ms, record.created_at_ms + 600_000);
    }

    #[tokio::test]
    async fn no_eligible_worker_persists_nothing() {
        let f = fixture();
        register(&f.fleet, "w-1", &["windows"]).await;

        match f.coordinator.submit(resolved(&["linux"])).await {
            Err(CoreError::NoEligibleWorker { task_type }) => assert_eq!(task_type, "shell"),
            other => panic!("expected NoEligibleWorker, got {other:?}"),
        }
        assert!(f.store.is_empty());
    }

    #[tokio::test]
    async fn invalid_payload_persists_nothing() {
        let f = fixture();
        register(&f.fleet, "w-1", &["linux"]).await;

        let mut task = resolved(&["linux"]);
        task.spec.payload = TaskPayload::new(PayloadFormat::Json, b"{oops".to_vec());

        assert!(matches!(
            f.coordinator.submit(task).await,
            Err(CoreError::InvalidPayload(_))
        ));
        assert!(f.store.is_empty());
    }

    #[tokio::test]
    async fn parked_skips_eligibility_until_release() {
        let f = fixture();

        let mut task = resolved(&["linux"]);
        task.spec = task.spec.parked();
        let sub = f.coordinator.submit(task).await.unwrap();
        assert_eq!(sub.stage, TaskStage::Parked);
        assert_eq!(f.fleet.pending(&acc()), 0);

        assert!(matches!(
            f.coordinator.release_parked(&acc(), &sub.task_id).await,
            Err(CoreError::NoEligibleWorker { .. })
        ));
        let still = f.store.get(&acc(), &sub.task_id).await.unwrap().unwrap();
        assert_eq!(still.status, TaskStatus::Parked);

        register(&f.fleet, "w-1", &["linux"]).await;
        f.coordinator
            .release_parked(&acc(), &sub.task_id)
            .await
            .unwrap();
        let queued = f.store.get(&acc(), &sub.task_id).await.unwrap().unwrap();
        assert_eq!(queued.status, TaskStatus::Queued);
        assert_eq!(f.fleet.pending(&acc()), 1);

        match f.coordinator.release_parked(&acc(), &sub.task_id).await {
            Err(CoreError::NotParked { status, .. }) => assert_eq!(status, TaskStatus::Queued),
            other => panic!("expected NotParked, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn release_of_unknown_task_is_not_found() {
        let f = fixture();
        assert!(matches!(
            f.coordinator
                .release_parked(&acc(), &TaskId::from("nope"))
                .await,
            Err(CoreError::TaskNotFound(_))
        ));
    }

    #[tokio::test]
    async fn poll_dispatches_only_to_workers_with_every_capability() {
        let f = fixture();
        register(&f.fleet, "w-ab", &["A", "B"]).await;
        register(&f.fleet, "w-a", &["A"]).await;

        let sub = f.coordinator.submit(resolved(&["A", "B"])).await.unwrap();

        assert!(f
            .coordinator
            .poll(&acc(), &WorkerId::from("w-a"))
            .await
            .unwrap()
            .is_none());

        let record = f
            .coordinator
            .poll(&acc(), &WorkerId::from("w-ab"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.id, sub.task_id);
        assert_eq!(record.status, TaskStatus::Dispatched);
        assert_eq!(record.worker_id, Some(WorkerId::from("w-ab")));
        assert!(record.dispatched_at_ms.is_some());
    }

    #[tokio::test]
    async fn acquire_requires_the_assigned_worker() {
        let f = fixture();
        register(&f.fleet, "w-1", &["linux"]).await;
        register(&f.fleet, "w-2", &["linux"]).await;
        let sub = f.coordinator.submit(resolved(&["linux"])).await.unwrap();

        let dispatched = f
            .coordinator
            .poll(&acc(), &WorkerId::from("w-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(dispatched.id, sub.task_id);

        assert!(matches!(
            f.coordinator
                .acquire(&acc(), &sub.task_id, &WorkerId::from("w-2"))
                .await,
            Err(CoreError::InvalidRequest(_))
        ));

        let acquired = f
            .coordinator
            .acquire(&acc(), &sub.task_id, &WorkerId::from("w-1"))
            .await
            .unwrap();
        assert_eq!(acquired.status, TaskStatus::Acquired);

        let again = f
            .coordinator
            .acquire(&acc(), &sub.task_id, &WorkerId::from("w-1"))
            .await
            .unwrap();
        assert_eq!(again.status, TaskStatus::Acquired);
    }

    #[tokio::test(start_paused = true)]
    async fn sync_submit_times_out_after_total_expiry() {
        let f = fixture();
        register(&f.fleet, "w-1", &["linux"]).await;

        let mut task = resolved(&["linux"]);
        task.spec = task
            .spec
            .with_mode(ExecutionMode::Sync)
            .with_execution_timeout(200)
            .with_queue_timeout(100);

        match f.coordinator.submit(task).await {
            Err(CoreError::SyncWaitTimeout { waited_ms, .. }) => assert!(waited_ms <= 300),
            other => panic!("expected SyncWaitTimeout, got {other:?}"),
        }
        assert!(f.waiters.is_empty());
        assert_eq!(f.store.len(), 1);
    }

    #[tokio::test]
    async fn sync_submit_observes_completion_written_by_another_replica() {
        let f = fixture();
        register(&f.fleet, "w-1", &["linux"]).await;

        let mut task = resolved(&["linux"]);
        task.spec = task
            .spec
            .with_mode(ExecutionMode::Sync)
            .with_execution_timeout(5_000);

        let store = f.store.clone();
        let waiters = f.waiters.clone();
        let reporter = tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(5)).await;
                let Some(id) = store_first_id(&store) else {
                    continue;
                };
                // Written straight into the shared store: the local waiter is never signalled.
                let out = store
                    .transition(
                        &AccountId::from("acc"),
                        &id,
                        StatusGuard::Any,
                        TaskStatus::Completed,
                        TransitionPatch::completed(now_ms())
                            .with_result(TaskResult::success(None)),
                    )
                    .await
                    .unwrap();
                assert!(matches!(out, Transition::Applied { .. }));
                assert!(waiters.contains(&id));
                break;
            }
        });

        let sub = f.coordinator.submit(task).await.unwrap();
        reporter.await.unwrap();

        assert_eq!(sub.stage, TaskStage::Completed);
        assert!(sub.result.unwrap().is_success());
        assert!(f.waiters.is_empty());
    }

    fn with_fleet(fleet: Arc<dyn WorkerFleet>) -> (DispatchCoordinator, Arc<MemoryTaskStore>, Arc<WaitRegistry>) {
        let store = Arc::new(MemoryTaskStore::new());
        let waiters = Arc::new(WaitRegistry::new());
        let coordinator = DispatchCoordinator::new(
            CoreConfig::default().with_sync_poll_interval(10),
            store.clone(),
            fleet,
            waiters.clone(),
            noop_metrics(),
        );
        (coordinator, store, waiters)
    }

    #[tokio::test]
    async fn unannounced_submission_fails_instead_of_stalling() {
        let fleet = Arc::new(FaultyFleet::default());
        register(&fleet.inner, "w-1", &["linux"]).await;
        fleet.announce_down.store(true, Ordering::SeqCst);
        let (coordinator, store, waiters) = with_fleet(fleet.clone());

        let mut task = resolved(&["linux"]);
        task.spec = task.spec.with_mode(ExecutionMode::Sync);
        match coordinator.submit(task).await {
            Err(CoreError::Fleet(FleetError::Unavailable(_))) => {}
            other => panic!("expected fleet error, got {other:?}"),
        }
        assert!(waiters.is_empty());

        let id = store_first_id(&store).unwrap();
        let record = store.get(&acc(), &id).await.unwrap().unwrap();
        assert_eq!(record.status, TaskStatus::Failed);
        assert!(!record.result.unwrap().is_success());
    }

    #[tokio::test]
    async fn unannounced_release_fails_the_parked_task() {
        let fleet = Arc::new(FaultyFleet::default());
        register(&fleet.inner, "w-1", &["linux"]).await;
        let (coordinator, store, _) = with_fleet(fleet.clone());

        let mut task = resolved(&["linux"]);
        task.spec = task.spec.parked();
        let sub = coordinator.submit(task).await.unwrap();

        fleet.announce_down.store(true, Ordering::SeqCst);
        assert!(matches!(
            coordinator.release_parked(&acc(), &sub.task_id).await,
            Err(CoreError::Fleet(_))
        ));
        let record = store.get(&acc(), &sub.task_id).await.unwrap().unwrap();
        assert_eq!(record.status, TaskStatus::Failed);
    }

    fn store_first_id(store: &MemoryTaskStore) -> Option<TaskId> {
        store.ids().into_iter().next()
    }
}
