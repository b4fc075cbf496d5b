use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::DashMap;

use relay_model::{
    AccountId, CreatePerpetualTask, PerpetualClientContext, PerpetualTask, PerpetualTaskId,
    UnixMs,
};

use crate::store::StoreError;

/// Storage for perpetual tasks.
///
/// `create` performs the duplicate check and the insert as one atomic step.
#[async_trait]
pub trait PerpetualStore: Send + Sync + 'static {
    /// Insert a task built from `req`, or return the equivalent existing one when
    /// `req.allow_duplicate` is `false`. The flag is `true` if a new task was created.
    async fn create(
        &self,
        req: CreatePerpetualTask,
        now: UnixMs,
    ) -> Result<(PerpetualTask, bool), StoreError>;

    async fn get(
        &self,
        account: &AccountId,
        id: &PerpetualTaskId,
    ) -> Result<Option<PerpetualTask>, StoreError>;

    async fn list(&self, account: &AccountId) -> Result<Vec<PerpetualTask>, StoreError>;

    /// Swap the client context, keeping the schedule. `None` if the task is unknown.
    async fn replace_context(
        &self,
        account: &AccountId,
        id: &PerpetualTaskId,
        context: PerpetualClientContext,
        now: UnixMs,
    ) -> Result<Option<PerpetualTask>, StoreError>;

    async fn delete(
        &self,
        account: &AccountId,
        id: &PerpetualTaskId,
    ) -> Result<Option<PerpetualTask>, StoreError>;
}

type DedupeKey = (String, PerpetualClientContext);

#[derive(Debug, Default)]
struct AccountTasks {
    tasks: HashMap<PerpetualTaskId, PerpetualTask>,
    index: HashMap<DedupeKey, PerpetualTaskId>,
}

impl AccountTasks {
    fn key(task_type: &str, context: &PerpetualClientContext) -> DedupeKey {
        (task_type.to_string(), context.fingerprint())
    }

    /// Index `task` unless an equivalent task already owns the key.
    fn add_to_index(&mut self, task: &PerpetualTask) {
        self.index
            .entry(Self::key(&task.task_type, &task.context))
            .or_insert_with(|| task.id.clone());
    }

    fn remove_from_index(&mut self, task: &PerpetualTask) {
        let key = Self::key(&task.task_type, &task.context);
        if self.index.get(&key) == Some(&task.id) {
            self.index.remove(&key);
            // Hand the key over to a remaining equivalent task, if any.
            if let Some(other) = self
                .tasks
                .values()
                .find(|t| t.id != task.id && Self::key(&t.task_type, &t.context) == key)
            {
                self.index.insert(key, other.id.clone());
            }
        }
    }
}

/// In-process perpetual store.
///
/// All tasks of one account sit behind a single map entry, so dedupe, reset and delete
/// for that account are serialised by the entry's shard lock.
#[derive(Debug, Default)]
pub struct MemoryPerpetualStore {
    accounts: DashMap<AccountId, AccountTasks>,
}

impl MemoryPerpetualStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PerpetualStore for MemoryPerpetualStore {
    async fn create(
        &self,
        req: CreatePerpetualTask,
        now: UnixMs,
    ) -> Result<(PerpetualTask, bool), StoreError> {
        let mut account = self.accounts.entry(req.account_id.clone()).or_default();

        if !req.allow_duplicate {
            let key = AccountTasks::key(&req.task_type, &req.context);
            if let Some(existing) = account.index.get(&key).and_then(|id| account.tasks.get(id)) {
                return Ok((existing.clone(), false));
            }
        }

        let task = PerpetualTask::from_request(PerpetualTaskId::generate(), req, now);
        if account.tasks.contains_key(&task.id) {
            return Err(StoreError::Backend(format!("perpetual id collision: {}", task.id)));
        }
        account.add_to_index(&task);
        account.tasks.insert(task.id.clone(), task.clone());
        Ok((task, true))
    }

    async fn get(
        &self,
        account: &AccountId,
        id: &PerpetualTaskId,
    ) -> Result<Option<PerpetualTask>, StoreError> {
        Ok(self
            .accounts
            .get(account)
            .and_then(|a| a.tasks.get(id).cloned()))
    }

    async fn list(&self, account: &AccountId) -> Result<Vec<PerpetualTask>, StoreError> {
        let mut tasks: Vec<PerpetualTask> = self
            .accounts
            .get(account)
            .map(|a| a.tasks.values().cloned().collect())
            .unwrap_or_default();
        tasks.sort_by(|a, b| {
            a.created_at_ms
                .cmp(&b.created_at_ms)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(tasks)
    }

    async fn replace_context(
        &self,
        account: &AccountId,
        id: &PerpetualTaskId,
        mut context: PerpetualClientContext,
        now: UnixMs,
    ) -> Result<Option<PerpetualTask>, StoreError> {
        let Some(mut entry) = self.accounts.get_mut(account) else {
            return Ok(None);
        };
        let Some(before) = entry.tasks.get(id).cloned() else {
            return Ok(None);
        };
        entry.remove_from_index(&before);

        context.last_context_updated_ms = now;
        let mut after = before;
        after.context = context;
        after.updated_at_ms = now;

        entry.tasks.insert(id.clone(), after.clone());
        entry.add_to_index(&after);
        Ok(Some(after))
    }

    async fn delete(
        &self,
        account: &AccountId,
        id: &PerpetualTaskId,
    ) -> Result<Option<PerpetualTask>, StoreError> {
        let Some(mut entry) = self.accounts.get_mut(account) else {
            return Ok(None);
        };
        let Some(task) = entry.tasks.remove(id) else {
            return Ok(None);
        };
        entry.remove_from_index(&task);
        Ok(Some(task))
    }
}
