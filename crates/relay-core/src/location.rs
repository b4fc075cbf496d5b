//! Lookup of pre-provisioned execution infrastructure locations.
use std::collections::BTreeMap;

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LocationError {
    #[error("location backend unavailable: {0}")]
    Unavailable(String),
}

/// Read-only binding `infra_ref -> worker_group`, owned by the provisioning subsystem.
#[async_trait]
pub trait LocationLookup: Send + Sync + 'static {
    /// Worker group bound to `infra_ref`, or `None` when the reference is unknown.
    async fn worker_group(&self, infra_ref: &str) -> Result<Option<String>, LocationError>;
}

/// In-memory location table, usually preloaded from configuration.
#[derive(Debug, Default)]
pub struct StaticLocations {
    entries: DashMap<String, String>,
}

impl StaticLocations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind (or rebind) an infrastructure reference to a worker group.
    pub fn bind(&self, infra_ref: impl Into<String>, worker_group: impl Into<String>) {
        self.entries.insert(infra_ref.into(), worker_group.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<BTreeMap<String, String>> for StaticLocations {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self {
            entries: map.into_iter().collect(),
        }
    }
}

#[async_trait]
impl LocationLookup for StaticLocations {
    async fn worker_group(&self, infra_ref: &str) -> Result<Option<String>, LocationError> {
        Ok(self.entries.get(infra_ref).map(|g| g.value().clone()))
    }
}
