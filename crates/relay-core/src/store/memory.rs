use async_trait::async_trait;
use dashmap::{DashMap, mapref::entry::Entry};
use tracing::trace;

use relay_model::{AccountId, ProgressEvent, TaskId, TaskRecord, TaskStatus};

use super::{StatusGuard, StoreError, TaskStore, Transition, TransitionPatch, apply_transition};

/// In-process task store.
///
/// Each record lives in one `DashMap` shard; a transition holds only that shard's lock, so
/// there is no global lock across records.
#[derive(Debug, Default)]
pub struct MemoryTaskStore {
    records: DashMap<TaskId, TaskRecord>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Ids of every stored record, in no particular order.
    pub fn ids(&self) -> Vec<TaskId> {
        self.records.iter().map(|r| r.key().clone()).collect()
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn insert(&self, record: TaskRecord) -> Result<(), StoreError> {
        match self.records.entry(record.id.clone()) {
            Entry::Occupied(e) => Err(StoreError::DuplicateId(e.key().clone())),
            Entry::Vacant(e) => {
                trace!(task = %record.id, status = %record.status, "record inserted");
                e.insert(record);
                Ok(())
            }
        }
    }

    async fn get(
        &self,
        account: &AccountId,
        id: &TaskId,
    ) -> Result<Option<TaskRecord>, StoreError> {
        Ok(self
            .records
            .get(id)
            .filter(|r| &r.account_id == account)
            .map(|r| r.value().clone()))
    }

    async fn transition(
        &self,
        account: &AccountId,
        id: &TaskId,
        guard: StatusGuard,
        next: TaskStatus,
        patch: TransitionPatch,
    ) -> Result<Transition, StoreError> {
        let Some(mut record) = self.records.get_mut(id) else {
            return Ok(Transition::Missing);
        };
        if &record.account_id != account {
            return Ok(Transition::Missing);
        }
        let outcome = apply_transition(&mut record, guard, next, patch);
        if let Transition::Applied { previous, .. } = &outcome {
            trace!(task = %id, from = %previous, to = %next, "record transitioned");
        }
        Ok(outcome)
    }

    async fn append_progress(
        &self,
        account: &AccountId,
        id: &TaskId,
        event: ProgressEvent,
    ) -> Result<bool, StoreError> {
        match self.records.get_mut(id) {
            Some(mut record) if &record.account_id == account => {
                record.progress.push(event);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
