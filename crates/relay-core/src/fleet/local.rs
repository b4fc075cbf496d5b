use std::collections::{HashSet, VecDeque};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, trace};

use relay_model::{
    AccountId, Capability, PerpetualTask, PerpetualTaskId, TaskId, TaskRecord, WorkerId,
    WorkerProfile,
};

use super::{Claim, FleetError, PerpetualAssignment, WorkerFleet};

/// Worker ids are only unique within an account.
type WorkerKey = (AccountId, WorkerId);

#[derive(Debug, Clone)]
struct Announced {
    task_id: TaskId,
    task_type: String,
    capabilities: Vec<Capability>,
}

impl Announced {
    fn eligible(&self, worker: &WorkerProfile) -> bool {
        worker.supports(&self.task_type) && worker.satisfies(&self.capabilities)
    }
}

#[derive(Debug)]
struct Scheduled {
    task: PerpetualTask,
    /// Workers that fetched the current context.
    seen_by: HashSet<WorkerId>,
}

/// In-process fleet: registered worker profiles plus per-account announcement queues.
///
/// Nothing is pushed. Workers poll for tasks, cancellations and perpetual assignments.
#[derive(Debug, Default)]
pub struct LocalFleet {
    workers: DashMap<WorkerKey, WorkerProfile>,
    queues: DashMap<AccountId, VecDeque<Announced>>,
    cancellations: DashMap<WorkerKey, Vec<TaskId>>,
    perpetual: DashMap<PerpetualTaskId, Scheduled>,
}

impl LocalFleet {
    pub fn new() -> Self {
        Self::default()
    }

    fn account_workers(&self, account: &AccountId) -> Vec<WorkerProfile> {
        self.workers
            .iter()
            .filter(|w| &w.key().0 == account)
            .map(|w| w.value().clone())
            .collect()
    }

    fn profile(&self, account: &AccountId, worker: &WorkerId) -> Result<WorkerProfile, FleetError> {
        self.workers
            .get(&(account.clone(), worker.clone()))
            .map(|w| w.value().clone())
            .ok_or_else(|| FleetError::UnknownWorker(worker.clone()))
    }

    /// Number of tasks announced and not yet claimed for `account`.
    pub fn pending(&self, account: &AccountId) -> usize {
        self.queues.get(account).map(|q| q.len()).unwrap_or(0)
    }
}

#[async_trait]
impl WorkerFleet for LocalFleet {
    async fn register_worker(&self, profile: WorkerProfile) -> Result<(), FleetError> {
        if profile.worker_id.is_blank() || profile.account_id.is_blank() {
            return Err(FleetError::InvalidProfile(
                "worker id and account id are required".into(),
            ));
        }
        debug!(
            worker = %profile.worker_id,
            account = %profile.account_id,
            selectors = profile.selectors.len(),
            task_types = profile.task_types.len(),
            "worker registered"
        );
        let key = (profile.account_id.clone(), profile.worker_id.clone());
        self.workers.insert(key, profile);
        Ok(())
    }

    async fn ensure_eligible(&self, record: &TaskRecord) -> Result<(), FleetError> {
        let eligible = self.workers.iter().any(|w| {
            w.account_id == record.account_id
                && w.supports(&record.task_type)
                && w.satisfies(&record.capabilities)
        });
        if eligible {
            Ok(())
        } else {
            Err(FleetError::NoEligibleWorker {
                task_type: record.task_type.clone(),
            })
        }
    }

    async fn announce(&self, record: &TaskRecord) -> Result<(), FleetError> {
        self.queues
            .entry(record.account_id.clone())
            .or_default()
            .push_back(Announced {
                task_id: record.id.clone(),
                task_type: record.task_type.clone(),
                capabilities: record.capabilities.clone(),
            });
        trace!(task = %record.id, account = %record.account_id, "task announced");
        Ok(())
    }

    async fn claim(
        &self,
        account: &AccountId,
        worker: &WorkerId,
    ) -> Result<Option<Claim>, FleetError> {
        let profile = self.profile(account, worker)?;

        let Some(mut queue) = self.queues.get_mut(account) else {
            return Ok(None);
        };
        let Some(pos) = queue.iter().position(|a| a.eligible(&profile)) else {
            return Ok(None);
        };
        let Some(announced) = queue.remove(pos) else {
            return Ok(None);
        };
        trace!(task = %announced.task_id, worker = %worker, "task claimed");
        Ok(Some(Claim {
            task_id: announced.task_id,
            worker: profile,
        }))
    }

    async fn cancel(&self, record: &TaskRecord) -> Result<(), FleetError> {
        if let Some(mut queue) = self.queues.get_mut(&record.account_id) {
            queue.retain(|a| a.task_id != record.id);
        }
        if let Some(worker) = &record.worker_id {
            self.cancellations
                .entry((record.account_id.clone(), worker.clone()))
                .or_default()
                .push(record.id.clone());
            debug!(task = %record.id, worker = %worker, "cancellation forwarded to worker");
        }
        Ok(())
    }

    async fn supports_task_type(
        &self,
        account: &AccountId,
        task_type: &str,
    ) -> Result<bool, FleetError> {
        let workers = self.account_workers(account);
        Ok(!workers.is_empty() && workers.iter().all(|w| w.supports(task_type)))
    }

    async fn take_cancellations(
        &self,
        account: &AccountId,
        worker: &WorkerId,
    ) -> Result<Vec<TaskId>, FleetError> {
        self.profile(account, worker)?;
        Ok(self
            .cancellations
            .remove(&(account.clone(), worker.clone()))
            .map(|(_, ids)| ids)
            .unwrap_or_default())
    }

    async fn perpetual_assignments(
        &self,
        account: &AccountId,
        worker: &WorkerId,
    ) -> Result<Vec<PerpetualAssignment>, FleetError> {
        self.profile(account, worker)?;
        let assignments = self
            .perpetual
            .iter_mut()
            .filter(|s| &s.task.account_id == account)
            .map(|mut s| PerpetualAssignment {
                task: s.task.clone(),
                refresh_pending: s.seen_by.insert(worker.clone()),
            })
            .collect();
        Ok(assignments)
    }

    async fn refresh_perpetual(&self, task: &PerpetualTask) -> Result<(), FleetError> {
        self.perpetual.insert(
            task.id.clone(),
            Scheduled {
                task: task.clone(),
                seen_by: HashSet::new(),
            },
        );
        trace!(perpetual_task = %task.id, account = %task.account_id, "perpetual context refreshed");
        Ok(())
    }

    async fn forget_perpetual(
        &self,
        account: &AccountId,
        id: &PerpetualTaskId,
    ) -> Result<(), FleetError> {
        self.perpetual
            .remove_if(id, |_, s| &s.task.account_id == account);
        Ok(())
    }
}
