//! Transport-free gateway over the dispatch core.
//!
//! [`TaskService`] is what the HTTP and gRPC layers call. It wires the resolver,
//! coordinator, tracker and perpetual manager together around shared collaborators, which
//! are supplied through [`TaskServiceBuilder`].
use std::sync::Arc;

use tracing::{debug, instrument};

use relay_model::{
    AccountId, CallbackDestination, CallbackToken, CreatePerpetualTask, PerpetualClientContext,
    PerpetualTask, PerpetualTaskId, ProgressPayload, SubmitSpec, TaskId, TaskRecord, TaskResult,
    TaskStage, WorkerId, WorkerProfile,
};

use crate::{
    callback::{CallbackRegistry, ChannelDelivery, InMemoryCallbackRegistry, ResultDelivery},
    config::CoreConfig,
    dispatch::{DispatchCoordinator, ResolvedTask, Submission, WaitRegistry},
    error::{CoreError, CoreResult},
    fleet::{LocalFleet, PerpetualAssignment, WorkerFleet},
    location::{LocationLookup, StaticLocations},
    metrics::{MetricsHandle, noop_metrics},
    perpetual::{MemoryPerpetualStore, PerpetualManager, PerpetualStore},
    resolver::CapabilityResolver,
    store::{MemoryTaskStore, TaskStore},
    tracker::{ProgressTracker, ReportAck},
};

pub struct TaskService {
    resolver: CapabilityResolver,
    coordinator: DispatchCoordinator,
    tracker: ProgressTracker,
    perpetual: PerpetualManager,
    callbacks: Arc<dyn CallbackRegistry>,
    fleet: Arc<dyn WorkerFleet>,
    metrics: MetricsHandle,
}

impl TaskService {
    pub fn builder() -> TaskServiceBuilder {
        TaskServiceBuilder::new()
    }

    /// Validate, resolve and dispatch a task.
    #[instrument(level = "debug", skip(self, spec), fields(account = %spec.account_id, task_type = %spec.task_type))]
    pub async fn submit(&self, spec: SubmitSpec) -> CoreResult<Submission> {
        let res = self.try_submit(spec).await;
        if let Err(e) = &res {
            if !matches!(e, CoreError::SyncWaitTimeout { .. }) {
                debug!(reason = e.kind(), error = %e, "submission rejected");
                self.metrics.record_submission_rejected(e.kind());
            }
        }
        res
    }

    async fn try_submit(&self, spec: SubmitSpec) -> CoreResult<Submission> {
        if spec.account_id.is_blank() {
            return Err(CoreError::InvalidRequest("account id is required".into()));
        }
        if spec.task_type.trim().is_empty() {
            return Err(CoreError::InvalidRequest("task type is required".into()));
        }
        if let Some(token) = &spec.callback_token {
            if self.callbacks.resolve(token).await?.is_none() {
                return Err(CoreError::CallbackNotFound(token.clone()));
            }
        }

        let capabilities = self.resolver.resolve(&spec).await?;
        self.coordinator
            .submit(ResolvedTask { spec, capabilities })
            .await
    }

    pub async fn execute_parked(&self, account: &AccountId, id: &TaskId) -> CoreResult<TaskId> {
        self.coordinator.release_parked(account, id).await
    }

    pub async fn cancel(&self, account: &AccountId, id: &TaskId) -> CoreResult<TaskStage> {
        self.tracker.cancel(account, id).await
    }

    pub async fn report_status(
        &self,
        account: &AccountId,
        id: &TaskId,
        result: TaskResult,
    ) -> CoreResult<ReportAck> {
        if let Some(payload) = &result.payload {
            payload.validate()?;
        }
        self.tracker.report_status(account, id, result).await
    }

    pub async fn report_progress(
        &self,
        account: &AccountId,
        id: &TaskId,
        token: Option<CallbackToken>,
        payload: ProgressPayload,
    ) -> CoreResult<()> {
        payload.validate()?;
        self.tracker
            .report_progress(account, id, token, payload)
            .await
    }

    pub async fn query_stage(&self, account: &AccountId, id: &TaskId) -> CoreResult<TaskStage> {
        self.tracker.query_stage(account, id).await
    }

    pub async fn fetch_results(
        &self,
        account: &AccountId,
        id: &TaskId,
    ) -> CoreResult<Option<TaskResult>> {
        self.tracker.fetch_results(account, id).await
    }

    pub async fn register_callback(
        &self,
        destination: CallbackDestination,
    ) -> CoreResult<CallbackToken> {
        if destination.target.trim().is_empty() {
            return Err(CoreError::InvalidRequest(
                "callback target is required".into(),
            ));
        }
        Ok(self.callbacks.register(destination).await?)
    }

    pub async fn invalidate_callback(&self, token: &CallbackToken) -> CoreResult<bool> {
        Ok(self.callbacks.invalidate(token).await?)
    }

    pub async fn create_perpetual(&self, req: CreatePerpetualTask) -> CoreResult<PerpetualTaskId> {
        self.perpetual.create(req).await
    }

    pub async fn reset_perpetual(
        &self,
        account: &AccountId,
        id: &PerpetualTaskId,
        context: PerpetualClientContext,
    ) -> CoreResult<()> {
        self.perpetual.reset(account, id, context).await
    }

    pub async fn delete_perpetual(
        &self,
        account: &AccountId,
        id: &PerpetualTaskId,
    ) -> CoreResult<()> {
        self.perpetual.delete(account, id).await
    }

    pub async fn get_perpetual(
        &self,
        account: &AccountId,
        id: &PerpetualTaskId,
    ) -> CoreResult<PerpetualTask> {
        self.perpetual.get(account, id).await
    }

    pub async fn list_perpetual(&self, account: &AccountId) -> CoreResult<Vec<PerpetualTask>> {
        self.perpetual.list(account).await
    }

    pub async fn is_task_type_supported(
        &self,
        account: &AccountId,
        task_type: &str,
    ) -> CoreResult<bool> {
        Ok(self.fleet.supports_task_type(account, task_type).await?)
    }

    pub async fn register_worker(&self, profile: WorkerProfile) -> CoreResult<()> {
        Ok(self.fleet.register_worker(profile).await?)
    }

    pub async fn poll_task(
        &self,
        account: &AccountId,
        worker: &WorkerId,
    ) -> CoreResult<Option<TaskRecord>> {
        self.coordinator.poll(account, worker).await
    }

    /// Cancellation requests queued for a worker since its last fetch.
    pub async fn pending_cancellations(
        &self,
        account: &AccountId,
        worker: &WorkerId,
    ) -> CoreResult<Vec<TaskId>> {
        Ok(self.fleet.take_cancellations(account, worker).await?)
    }

    /// Perpetual tasks a worker should be running, flagged where the context changed.
    pub async fn perpetual_assignments(
        &self,
        account: &AccountId,
        worker: &WorkerId,
    ) -> CoreResult<Vec<PerpetualAssignment>> {
        Ok(self.fleet.perpetual_assignments(account, worker).await?)
    }

    pub async fn acquire_task(
        &self,
        account: &AccountId,
        id: &TaskId,
        worker: &WorkerId,
    ) -> CoreResult<TaskRecord> {
        self.coordinator.acquire(account, id, worker).await
    }
}

/// Assembles a [`TaskService`]; every collaborator defaults to its in-memory implementation.
#[derive(Default)]
pub struct TaskServiceBuilder {
    config: CoreConfig,
    store: Option<Arc<dyn TaskStore>>,
    fleet: Option<Arc<dyn WorkerFleet>>,
    locations: Option<Arc<dyn LocationLookup>>,
    callbacks: Option<Arc<dyn CallbackRegistry>>,
    delivery: Option<Arc<dyn ResultDelivery>>,
    perpetual: Option<Arc<dyn PerpetualStore>>,
    metrics: Option<MetricsHandle>,
}

impl TaskServiceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: CoreConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn TaskStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_fleet(mut self, fleet: Arc<dyn WorkerFleet>) -> Self {
        self.fleet = Some(fleet);
        self
    }

    pub fn with_locations(mut self, locations: Arc<dyn LocationLookup>) -> Self {
        self.locations = Some(locations);
        self
    }

    pub fn with_callbacks(mut self, callbacks: Arc<dyn CallbackRegistry>) -> Self {
        self.callbacks = Some(callbacks);
        self
    }

    pub fn with_delivery(mut self, delivery: Arc<dyn ResultDelivery>) -> Self {
        self.delivery = Some(delivery);
        self
    }

    pub fn with_perpetual_store(mut self, store: Arc<dyn PerpetualStore>) -> Self {
        self.perpetual = Some(store);
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(self) -> TaskService {
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryTaskStore::new()));
        let fleet = self.fleet.unwrap_or_else(|| Arc::new(LocalFleet::new()));
        let locations = self
            .locations
            .unwrap_or_else(|| Arc::new(StaticLocations::new()));
        let callbacks = self
            .callbacks
            .unwrap_or_else(|| Arc::new(InMemoryCallbackRegistry::new()));
        let delivery = self
            .delivery
            .unwrap_or_else(|| Arc::new(ChannelDelivery::default()));
        let perpetual = self
            .perpetual
            .unwrap_or_else(|| Arc::new(MemoryPerpetualStore::new()));
        let metrics = self.metrics.unwrap_or_else(noop_metrics);
        let waiters = Arc::new(WaitRegistry::new());

        TaskService {
            resolver: CapabilityResolver::new(locations),
            coordinator: DispatchCoordinator::new(
                self.config,
                store.clone(),
                fleet.clone(),
                waiters.clone(),
                metrics.clone(),
            ),
            tracker: ProgressTracker::new(
                store,
                fleet.clone(),
                waiters,
                callbacks.clone(),
                delivery,
                metrics.clone(),
            ),
            perpetual: PerpetualManager::new(perpetual, fleet.clone()),
            callbacks,
            fleet,
            metrics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_model::TaskPayload;

    fn spec() -> SubmitSpec {
        SubmitSpec::new("acc", "shell", TaskPayload::binary(b"x".to_vec()), "linux")
    }

    #[tokio::test]
    async fn unknown_callback_token_is_rejected_before_persistence() {
        let service = TaskService::builder().build();
        let spec = spec().with_callback(CallbackToken::from("forged"));

        match service.submit(spec).await {
            Err(CoreError::CallbackNotFound(token)) => assert_eq!(token.as_str(), "forged"),
            other => panic!("expected CallbackNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn blank_account_is_invalid() {
        let service = TaskService::builder().build();
        let mut spec = spec();
        spec.account_id = AccountId::from(" ");
        assert!(matches!(
            service.submit(spec).await,
            Err(CoreError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn resolution_errors_surface_unchanged() {
        let service = TaskService::builder().build();
        assert!(matches!(
            service.submit(spec().with_infra_ref("nowhere")).await,
            Err(CoreError::InfrastructureLocationNotFound(_))
        ));

        let mut blank_tag = spec();
        blank_tag.runner_tag = String::new();
        assert!(matches!(
            service.submit(blank_tag).await,
            Err(CoreError::MissingRunnerTag)
        ));
    }

    #[tokio::test]
    async fn registered_callback_is_accepted() {
        let service = TaskService::builder().build();
        service
            .register_worker(
                WorkerProfile::new("w-1".into(), "acc".into())
                    .with_selectors(["linux"])
                    .with_task_types(["shell"]),
            )
            .await
            .unwrap();
        let token = service
            .register_callback(CallbackDestination::new("queue://r"))
            .await
            .unwrap();

        let sub = service.submit(spec().with_callback(token)).await.unwrap();
        assert_eq!(sub.stage, TaskStage::Queued);
    }
}
