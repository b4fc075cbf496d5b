use std::{
    collections::BTreeMap,
    net::SocketAddr,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use relay_core::config::CoreConfig;
use relay_observe::LoggerConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Process configuration, read from a JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP API and `/metrics` listener.
    pub http_addr: SocketAddr,
    /// gRPC listener; only used when built with the `grpc` feature.
    pub grpc_addr: Option<SocketAddr>,
    pub logger: LoggerConfig,
    pub core: CoreConfig,
    /// Execution infrastructure bindings: `infra_ref -> worker_group`.
    pub locations: BTreeMap<String, String>,
    /// Per-request timeout for webhook callback deliveries.
    pub callback_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            grpc_addr: None,
            logger: LoggerConfig::default(),
            core: CoreConfig::default(),
            locations: BTreeMap::new(),
            callback_timeout_ms: 10_000,
        }
    }
}

impl ServerConfig {
    /// Load from `path`, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_path_means_defaults() {
        let cfg = ServerConfig::load(None).unwrap();
        assert_eq!(cfg.http_addr.port(), 8080);
        assert!(cfg.grpc_addr.is_none());
        assert!(cfg.locations.is_empty());
        assert_eq!(cfg.callback_timeout_ms, 10_000);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let cfg: ServerConfig = serde_json::from_str(
            r#"{
                "http_addr": "127.0.0.1:9000",
                "core": { "sync_poll_interval_ms": 100 },
                "locations": { "infra-1": "group-a" }
            }"#,
        )
        .unwrap();

        assert_eq!(cfg.http_addr.port(), 9000);
        assert_eq!(cfg.core.sync_poll_interval_ms, 100);
        assert_eq!(cfg.locations.get("infra-1").map(String::as_str), Some("group-a"));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let path = Path::new("/definitely/not/here/relay.json");
        assert!(matches!(
            ServerConfig::load(Some(path)),
            Err(ConfigError::Read { .. })
        ));
    }
}
