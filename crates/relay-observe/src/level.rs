use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::{LoggerError, LoggerResult};

/// Validated `EnvFilter` expression, e.g. `"info"` or `"relay_core=debug,info"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LoggerLevel(String);

impl LoggerLevel {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Build the filter. Only fails if the expression was not validated on construction.
    pub fn to_env_filter(&self) -> LoggerResult<EnvFilter> {
        EnvFilter::try_new(&self.0).map_err(|e| LoggerError::InvalidLevel(format!("{}: {e}", self.0)))
    }
}

impl Default for LoggerLevel {
    fn default() -> Self {
        LoggerLevel("info".to_string())
    }
}

impl TryFrom<String> for LoggerLevel {
    type Error = LoggerError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        EnvFilter::try_new(&s)
            .map(|_| LoggerLevel(s.clone()))
            .map_err(|e| LoggerError::InvalidLevel(format!("{s}: {e}")))
    }
}

impl FromStr for LoggerLevel {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s.to_string())
    }
}

impl From<LoggerLevel> for String {
    fn from(level: LoggerLevel) -> Self {
        level.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_directives() {
        for ok in ["info", "warn", "relay_core=trace,relay_api=debug,info"] {
            let level: LoggerLevel = ok.parse().unwrap();
            assert!(level.to_env_filter().is_ok());
        }
    }

    #[test]
    fn rejects_garbage_levels() {
        for bad in ["relay_core=loud", "x=trace,y=wat"] {
            assert!(
                bad.parse::<LoggerLevel>().is_err(),
                "{bad:?} must be rejected"
            );
        }
    }

    #[test]
    fn deserialization_validates() {
        let ok: LoggerLevel = serde_json::from_str(r#""debug""#).unwrap();
        assert_eq!(ok.as_str(), "debug");
        assert!(serde_json::from_str::<LoggerLevel>(r#""a=nope""#).is_err());
    }
}
