use dashmap::DashMap;
use tokio::sync::oneshot;

use relay_model::{TaskId, TaskResult, TaskStatus};

/// Terminal outcome handed to a blocked sync caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub status: TaskStatus,
    pub result: Option<TaskResult>,
}

/// Per-task completion channels of blocked sync submissions.
///
/// This is the only transient state of the core. Entries live from just before the record
/// is persisted until the caller is woken or gives up.
#[derive(Debug, Default)]
pub struct WaitRegistry {
    waiters: DashMap<TaskId, oneshot::Sender<Completion>>,
}

impl WaitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter for `id`, replacing any stale one.
    pub fn register(&self, id: TaskId) -> oneshot::Receiver<Completion> {
        let (tx, rx) = oneshot::channel();
        self.waiters.insert(id, tx);
        rx
    }

    /// Wake the waiter of `id`. Returns `false` when nobody is waiting (an orphaned completion).
    pub fn notify(&self, id: &TaskId, completion: Completion) -> bool {
        match self.waiters.remove(id) {
            Some((_, tx)) => tx.send(completion).is_ok(),
            None => false,
        }
    }

    /// Forget the waiter of `id` without waking it.
    pub fn remove(&self, id: &TaskId) -> bool {
        self.waiters.remove(id).is_some()
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.waiters.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }
}
