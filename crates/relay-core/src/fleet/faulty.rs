use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use relay_model::{AccountId, PerpetualTask, PerpetualTaskId, TaskId, TaskRecord, WorkerId, WorkerProfile};

use super::{Claim, FleetError, LocalFleet, PerpetualAssignment, WorkerFleet};

/// [`LocalFleet`] with switchable outages for announcements and perpetual refreshes.
#[derive(Debug, Default)]
pub(crate) struct FaultyFleet {
    pub inner: LocalFleet,
    pub announce_down: AtomicBool,
    pub refresh_down: AtomicBool,
}

impl FaultyFleet {
    fn check(flag: &AtomicBool) -> Result<(), FleetError> {
        if flag.load(Ordering::SeqCst) {
            Err(FleetError::Unavailable("fleet offline".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl WorkerFleet for FaultyFleet {
    async fn register_worker(&self, profile: WorkerProfile) -> Result<(), FleetError> {
        self.inner.register_worker(profile).await
    }

    async fn ensure_eligible(&self, record: &TaskRecord) -> Result<(), FleetError> {
        self.inner.ensure_eligible(record).await
    }

    async fn announce(&self, record: &TaskRecord) -> Result<(), FleetError> {
        Self::check(&self.announce_down)?;
        self.inner.announce(record).await
    }

    async fn claim(
        &self,
        account: &AccountId,
        worker: &WorkerId,
    ) -> Result<Option<Claim>, FleetError> {
        self.inner.claim(account, worker).await
    }

    async fn cancel(&self, record: &TaskRecord) -> Result<(), FleetError> {
        self.inner.cancel(record).await
    }

    async fn supports_task_type(
        &self,
        account: &AccountId,
        task_type: &str,
    ) -> Result<bool, FleetError> {
        self.inner.supports_task_type(account, task_type).await
    }

    async fn take_cancellations(
        &self,
        account: &AccountId,
        worker: &WorkerId,
    ) -> Result<Vec<TaskId>, FleetError> {
        self.inner.take_cancellations(account, worker).await
    }

    async fn perpetual_assignments(
        &self,
        account: &AccountId,
        worker: &WorkerId,
    ) -> Result<Vec<PerpetualAssignment>, FleetError> {
        self.inner.perpetual_assignments(account, worker).await
    }

    async fn refresh_perpetual(&self, task: &PerpetualTask) -> Result<(), FleetError> {
        Self::check(&self.refresh_down)?;
        self.inner.refresh_perpetual(task).await
    }

    async fn forget_perpetual(
        &self,
        account: &AccountId,
        id: &PerpetualTaskId,
    ) -> Result<(), FleetError> {
        self.inner.forget_perpetual(account, id).await
    }
}
