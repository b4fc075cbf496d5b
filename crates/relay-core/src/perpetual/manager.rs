use std::sync::Arc;

use tracing::{debug, error, info, instrument};

use relay_model::{
    AccountId, CreatePerpetualTask, PerpetualClientContext, PerpetualTask, PerpetualTaskId, now_ms,
};

use crate::{
    error::{CoreError, CoreResult},
    fleet::WorkerFleet,
    perpetual::store::PerpetualStore,
};

/// Creates, resets and deletes perpetual tasks, keeping the fleet's view in step.
pub struct PerpetualManager {
    store: Arc<dyn PerpetualStore>,
    fleet: Arc<dyn WorkerFleet>,
}

impl PerpetualManager {
    pub fn new(store: Arc<dyn PerpetualStore>, fleet: Arc<dyn WorkerFleet>) -> Self {
        Self { store, fleet }
    }

    /// Create a perpetual task or, unless duplicates are allowed, return the equivalent one.
    #[instrument(level = "debug", skip(self, req), fields(account = %req.account_id, task_type = %req.task_type))]
    pub async fn create(&self, req: CreatePerpetualTask) -> CoreResult<PerpetualTaskId> {
        if req.task_type.trim().is_empty() {
            return Err(CoreError::InvalidRequest(
                "perpetual task type must not be empty".into(),
            ));
        }
        if req.schedule.interval_ms == 0 {
            return Err(CoreError::InvalidRequest(
                "perpetual interval must be positive".into(),
            ));
        }

        let (task, created) = self.store.create(req, now_ms()).await?;
        if !created {
            debug!(perpetual = %task.id, "equivalent perpetual task exists");
            return Ok(task.id);
        }
        if let Err(e) = self.fleet.refresh_perpetual(&task).await {
            error!(perpetual = %task.id, error = %e, "failed to schedule perpetual task; rolling back");
            if let Err(undo) = self.store.delete(&task.account_id, &task.id).await {
                error!(perpetual = %task.id, error = %undo, "rollback of unscheduled perpetual task failed");
            }
            return Err(e.into());
        }
        info!(perpetual = %task.id, interval_ms = task.schedule.interval_ms, "perpetual task created");
        Ok(task.id)
    }

    /// Replace the client context; workers pick it up on their next poll cycle.
    ///
    /// If the fleet can't be told, the previous context is restored and the error returned.
    #[instrument(level = "debug", skip(self, context), fields(account = %account, perpetual = %id))]
    pub async fn reset(
        &self,
        account: &AccountId,
        id: &PerpetualTaskId,
        context: PerpetualClientContext,
    ) -> CoreResult<()> {
        let previous = self.get(account, id).await?;
        let task = self
            .store
            .replace_context(account, id, context, now_ms())
            .await?
            .ok_or_else(|| CoreError::PerpetualTaskNotFound(id.clone()))?;
        if let Err(e) = self.fleet.refresh_perpetual(&task).await {
            error!(error = %e, "failed to refresh perpetual task; restoring previous context");
            if let Err(undo) = self
                .store
                .replace_context(account, id, previous.context, now_ms())
                .await
            {
                error!(error = %undo, "restoring perpetual context failed");
            }
            return Err(e.into());
        }
        info!("perpetual task context reset");
        Ok(())
    }

    /// Remove a perpetual task for good. In-flight executions run to completion.
    #[instrument(level = "debug", skip(self), fields(account = %account, perpetual = %id))]
    pub async fn delete(&self, account: &AccountId, id: &PerpetualTaskId) -> CoreResult<()> {
        self.store
            .delete(account, id)
            .await?
            .ok_or_else(|| CoreError::PerpetualTaskNotFound(id.clone()))?;
        if let Err(e) = self.fleet.forget_perpetual(account, id).await {
            error!(error = %e, "failed to unschedule deleted perpetual task");
        }
        info!("perpetual task deleted");
        Ok(())
    }

    pub async fn get(
        &self,
        account: &AccountId,
        id: &PerpetualTaskId,
    ) -> CoreResult<PerpetualTask> {
        self.store
            .get(account, id)
            .await?
            .ok_or_else(|| CoreError::PerpetualTaskNotFound(id.clone()))
    }

    pub async fn list(&self, account: &AccountId) -> CoreResult<Vec<PerpetualTask>> {
        Ok(self.store.list(account).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fleet::{FleetError, LocalFleet, PerpetualAssignment, faulty::FaultyFleet},
        perpetual::MemoryPerpetualStore,
    };
    use relay_model::{PerpetualSchedule, WorkerId, WorkerProfile};
    use std::sync::atomic::Ordering;

    fn manager() -> (PerpetualManager, Arc<LocalFleet>) {
        let fleet = Arc::new(LocalFleet::new());
        let manager = PerpetualManager::new(Arc::new(MemoryPerpetualStore::new()), fleet.clone());
        (manager, fleet)
    }

    fn acc() -> AccountId {
        AccountId::from("acc")
    }

    fn req() -> CreatePerpetualTask {
        CreatePerpetualTask::new("acc", "health", PerpetualClientContext::new("conn-1"))
    }

    async fn assignments(fleet: &LocalFleet) -> Vec<PerpetualAssignment> {
        let worker = WorkerId::from("w-1");
        fleet
            .register_worker(WorkerProfile::new(worker.clone(), acc()))
            .await
            .unwrap();
        fleet.perpetual_assignments(&acc(), &worker).await.unwrap()
    }

    #[tokio::test]
    async fn duplicate_create_is_idempotent() {
        let (manager, fleet) = manager();
        let a = manager.create(req()).await.unwrap();
        let b = manager.create(req()).await.unwrap();

        assert_eq!(a, b);
        assert_eq!(manager.list(&acc()).await.unwrap().len(), 1);
        assert_eq!(assignments(&fleet).await.len(), 1);
    }

    #[tokio::test]
    async fn zero_interval_is_rejected() {
        let (manager, _) = manager();
        let bad = req().with_schedule(PerpetualSchedule {
            interval_ms: 0,
            timeout_ms: 1_000,
        });
        assert!(matches!(
            manager.create(bad).await,
            Err(CoreError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn reset_replaces_context_and_flags_refresh() {
        let (manager, fleet) = manager();
        let id = manager.create(req()).await.unwrap();
        assignments(&fleet).await;

        manager
            .reset(&acc(), &id, PerpetualClientContext::new("conn-9"))
            .await
            .unwrap();

        let task = manager.get(&acc(), &id).await.unwrap();
        assert_eq!(task.context.client_id, "conn-9");
        let seen = assignments(&fleet).await;
        assert!(seen[0].refresh_pending);
        assert_eq!(seen[0].task.context.client_id, "conn-9");
    }

    #[tokio::test]
    async fn delete_unknown_is_not_found() {
        let (manager, fleet) = manager();
        let id = manager.create(req()).await.unwrap();

        manager.delete(&acc(), &id).await.unwrap();
        assert!(assignments(&fleet).await.is_empty());

        match manager.delete(&acc(), &id).await {
            Err(CoreError::PerpetualTaskNotFound(missing)) => assert_eq!(missing, id),
            other => panic!("expected PerpetualTaskNotFound, got {other:?}"),
        }
        assert!(matches!(
            manager
                .reset(&acc(), &id, PerpetualClientContext::new("x"))
                .await,
            Err(CoreError::PerpetualTaskNotFound(_))
        ));
    }

    #[tokio::test]
    async fn unschedulable_create_leaves_nothing_behind() {
        let fleet = Arc::new(FaultyFleet::default());
        fleet.refresh_down.store(true, Ordering::SeqCst);
        let manager = PerpetualManager::new(Arc::new(MemoryPerpetualStore::new()), fleet.clone());

        assert!(matches!(
            manager.create(req()).await,
            Err(CoreError::Fleet(FleetError::Unavailable(_)))
        ));
        assert!(manager.list(&acc()).await.unwrap().is_empty());

        fleet.refresh_down.store(false, Ordering::SeqCst);
        manager.create(req()).await.unwrap();
        assert_eq!(manager.list(&acc()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_reset_keeps_the_previous_context() {
        let fleet = Arc::new(FaultyFleet::default());
        let manager = PerpetualManager::new(Arc::new(MemoryPerpetualStore::new()), fleet.clone());
        let id = manager.create(req()).await.unwrap();

        fleet.refresh_down.store(true, Ordering::SeqCst);
        assert!(matches!(
            manager
                .reset(&acc(), &id, PerpetualClientContext::new("conn-9"))
                .await,
            Err(CoreError::Fleet(_))
        ));
        let task = manager.get(&acc(), &id).await.unwrap();
        assert_eq!(task.context.client_id, "conn-1");

        // dedupe index still points at the original context
        assert_eq!(manager.create(req()).await.unwrap(), id);
    }
}
