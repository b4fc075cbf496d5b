use serde::{Deserialize, Serialize};

use relay_model::TimeoutMs;

/// Tunables of the dispatch core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Execution timeout applied when a submission carries none.
    pub default_execution_timeout_ms: TimeoutMs,
    /// How often a sync waiter re-reads the store for completions reported elsewhere.
    pub sync_poll_interval_ms: u64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            default_execution_timeout_ms: 600_000,
            sync_poll_interval_ms: 250,
        }
    }
}

impl CoreConfig {
    pub fn with_default_execution_timeout(mut self, ms: TimeoutMs) -> Self {
        self.default_execution_timeout_ms = ms;
        self
    }

    pub fn with_sync_poll_interval(mut self, ms: u64) -> Self {
        self.sync_poll_interval_ms = ms;
        self
    }
}
