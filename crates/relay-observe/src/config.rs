use std::io::IsTerminal;

use serde::{Deserialize, Serialize};

use crate::{LoggerFormat, LoggerLevel, LoggerResult};

/// Environment variable that overrides [`LoggerConfig::level`] when set.
pub const LOG_ENV_VAR: &str = "RELAY_LOG";

/// Logger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub format: LoggerFormat,
    /// Filter expression; see [`LoggerLevel`].
    pub level: LoggerLevel,
    /// Include module targets in output.
    pub with_targets: bool,
    /// Colored text output. Ignored unless stdout is a terminal.
    pub use_color: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: LoggerFormat::default(),
            level: LoggerLevel::default(),
            with_targets: true,
            use_color: true,
        }
    }
}

impl LoggerConfig {
    pub fn should_use_color(&self) -> bool {
        self.use_color && std::io::stdout().is_terminal()
    }

    /// Level from [`LOG_ENV_VAR`] if present and non-empty, otherwise the configured one.
    pub fn effective_level(&self) -> LoggerResult<LoggerLevel> {
        match std::env::var(LOG_ENV_VAR) {
            Ok(v) if !v.trim().is_empty() => v.parse(),
            _ => Ok(self.level.clone()),
        }
    }
}
