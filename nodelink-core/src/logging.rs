//! Structured logging setup for the bridge.
//!
//! Installs a [`tracing`](https://docs.rs/tracing) subscriber writing to a
//! rolling log file through a non-blocking appender. The returned
//! [`WorkerGuard`] must be held for the lifetime of the host application or
//! buffered log lines are lost on exit. The `RUST_LOG` environment variable
//! overrides the configured level.

use std::path::PathBuf;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerConfig {
    pub log_dir: PathBuf,

    pub log_file_prefix: CompactString,

    pub log_level: CompactString,

    pub rotation: LogRotation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogRotation {
    Never,
    Daily,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("./logs"),
            log_file_prefix: CompactString::const_new("nodelink"),
            log_level: CompactString::const_new("info"),
            rotation: LogRotation::Daily,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Logger already initialized")]
    AlreadyInitialized,

    #[error("Invalid log directory: {0}")]
    InvalidLogDirectory(String),

    #[error("Failed to create log directory: {0}")]
    DirectoryCreationFailed(#[from] std::io::Error),
}

/// Logging facade; `init` installs the global subscriber.
pub struct Logger;

impl Logger {
    /// Install the global subscriber per config and return the appender
    /// guard.
    pub fn init(config: &LoggerConfig) -> Result<WorkerGuard, LoggingError> {
        if config.log_dir.as_os_str().is_empty() {
            return Err(LoggingError::InvalidLogDirectory(
                "log_dir must not be empty".into(),
            ));
        }

        std::fs::create_dir_all(&config.log_dir)?;

        let rotation = match config.rotation {
            LogRotation::Never => Rotation::NEVER,
            LogRotation::Daily => Rotation::DAILY,
        };

        let appender =
            RollingFileAppender::new(rotation, &config.log_dir, config.log_file_prefix.as_str());
        let (writer, guard) = tracing_appender::non_blocking(appender);

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(writer).with_ansi(false))
            .try_init()
            .map_err(|_| LoggingError::AlreadyInitialized)?;

        Ok(guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_log_dir_rejected() {
        let config = LoggerConfig {
            log_dir: PathBuf::new(),
            ..LoggerConfig::default()
        };

        assert!(matches!(
            Logger::init(&config),
            Err(LoggingError::InvalidLogDirectory(_))
        ));
    }

    #[test]
    fn test_init_creates_log_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let config = LoggerConfig {
            log_dir: tmp.path().join("logs"),
            rotation: LogRotation::Never,
            ..LoggerConfig::default()
        };

        // First init in the process wins; a sibling test binary may have
        // installed a subscriber already, so accept that outcome too.
        match Logger::init(&config) {
            Ok(_guard) => assert!(config.log_dir.is_dir()),

            Err(LoggingError::AlreadyInitialized) => {}

            Err(e) => panic!("unexpected init failure: {e}"),
        }
    }
}
