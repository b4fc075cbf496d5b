use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{AccountId, Capability, WorkerId};

/// Capabilities advertised by a single worker agent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerProfile {
    pub worker_id: WorkerId,
    pub account_id: AccountId,
    /// Tags, runner types and worker-group names the worker answers to.
    #[serde(default)]
    pub selectors: BTreeSet<String>,
    /// Task types the worker knows how to execute.
    #[serde(default)]
    pub task_types: BTreeSet<String>,
}

impl WorkerProfile {
    pub fn new(worker_id: WorkerId, account_id: AccountId) -> Self {
        Self {
            worker_id,
            account_id,
            selectors: BTreeSet::new(),
            task_types: BTreeSet::new(),
        }
    }

    pub fn with_selectors<I, S>(mut self, selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selectors.extend(selectors.into_iter().map(Into::into));
        self
    }

    pub fn with_task_types<I, S>(mut self, task_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.task_types.extend(task_types.into_iter().map(Into::into));
        self
    }

    /// Returns `true` if the worker advertises the given label.
    pub fn advertises(&self, label: &str) -> bool {
        self.selectors.contains(label)
    }

    /// Returns `true` if the worker can execute the given task type.
    pub fn supports(&self, task_type: &str) -> bool {
        self.task_types.contains(task_type)
    }

    /// Conjunctive match: every capability must be satisfied.
    pub fn satisfies(&self, capabilities: &[Capability]) -> bool {
        capabilities.iter().all(|c| c.matches(self))
    }
}
