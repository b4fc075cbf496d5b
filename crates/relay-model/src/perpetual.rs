//! Recurring background tasks owned by a client (e.g. connector health checks).
//!
//! Perpetual tasks are not one-shot records: the fleet re-runs them on their schedule until
//! they are deleted. Two creations are considered the same task when account, type and
//! client context match, ignoring [`PerpetualClientContext::last_context_updated_ms`].
use serde::{Deserialize, Serialize};

use crate::{AccountId, Labels, PerpetualTaskId, TimeoutMs, UnixMs};

/// Client-owned context the worker needs to execute a perpetual task.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerpetualClientContext {
    /// Owning client component (e.g. a connector id).
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Labels::is_empty")]
    pub client_params: Labels,
    /// Pre-built execution bundle, opaque to the control plane.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_bundle: Option<Vec<u8>>,
    #[serde(default)]
    pub last_context_updated_ms: UnixMs,
}

impl PerpetualClientContext {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            ..Self::default()
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, val: impl Into<String>) -> Self {
        self.client_params.insert(key, val);
        self
    }

    pub fn with_bundle(mut self, bundle: impl Into<Vec<u8>>) -> Self {
        self.execution_bundle = Some(bundle.into());
        self
    }

    /// Copy of the context with the update timestamp cleared.
    ///
    /// Used as the dedupe key: timestamps change on every reset without changing what runs.
    pub fn fingerprint(&self) -> PerpetualClientContext {
        PerpetualClientContext {
            last_context_updated_ms: 0,
            ..self.clone()
        }
    }
}

/// Cadence of a perpetual task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerpetualSchedule {
    pub interval_ms: TimeoutMs,
    pub timeout_ms: TimeoutMs,
}

impl Default for PerpetualSchedule {
    fn default() -> Self {
        Self {
            interval_ms: 60_000,
            timeout_ms: 30_000,
        }
    }
}

/// Request to create a perpetual task.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePerpetualTask {
    pub account_id: AccountId,
    pub task_type: String,
    pub context: PerpetualClientContext,
    #[serde(default)]
    pub schedule: PerpetualSchedule,
    /// When `false`, an equivalent existing task is returned instead of creating a new one.
    #[serde(default)]
    pub allow_duplicate: bool,
    #[serde(default)]
    pub description: String,
}

impl CreatePerpetualTask {
    pub fn new(
        account_id: impl Into<AccountId>,
        task_type: impl Into<String>,
        context: PerpetualClientContext,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            task_type: task_type.into(),
            context,
            schedule: PerpetualSchedule::default(),
            allow_duplicate: false,
            description: String::new(),
        }
    }

    pub fn with_schedule(mut self, schedule: PerpetualSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn allow_duplicate(mut self) -> Self {
        self.allow_duplicate = true;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Persisted perpetual task.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerpetualTask {
    pub id: PerpetualTaskId,
    pub account_id: AccountId,
    pub task_type: String,
    pub context: PerpetualClientContext,
    pub schedule: PerpetualSchedule,
    #[serde(default)]
    pub description: String,
    pub created_at_ms: UnixMs,
    pub updated_at_ms: UnixMs,
}

impl PerpetualTask {
    /// Materialise a creation request under a fresh id.
    pub fn from_request(id: PerpetualTaskId, req: CreatePerpetualTask, now: UnixMs) -> Self {
        let mut context = req.context;
        if context.last_context_updated_ms == 0 {
            context.last_context_updated_ms = now;
        }
        Self {
            id,
            account_id: req.account_id,
            task_type: req.task_type,
            context,
            schedule: req.schedule,
            description: req.description,
            created_at_ms: now,
            updated_at_ms: now,
        }
    }
}
