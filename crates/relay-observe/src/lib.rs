//! Process-wide logging setup for relay binaries.
mod config;
pub use config::{LOG_ENV_VAR, LoggerConfig};

mod error;
pub use error::{LoggerError, LoggerResult};

mod format;
pub use format::LoggerFormat;

mod level;
pub use level::LoggerLevel;

mod timer;
pub use timer::UtcRfc3339;

mod init;
pub use init::init_logger;
