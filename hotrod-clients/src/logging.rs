//! Tracing subscriber setup for binaries embedding the registry.
//!
//! The library itself only emits `tracing` events; installing a subscriber
//! is left to the host. [`init_logging`] is the setup used by the
//! `hotrod-clients` CLI.

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "hotrod_clients=info";

/// Filter used when `RUST_LOG` is unset and verbose output is requested.
pub const VERBOSE_LOG_FILTER: &str = "hotrod_clients=debug";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to create log directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to open log file {}: {reason}", path.display())]
    OpenFile { path: PathBuf, reason: String },

    #[error("failed to install tracing subscriber: {0}")]
    Install(String),
}

/// Subscriber settings.
#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    /// Use [`VERBOSE_LOG_FILTER`] instead of [`DEFAULT_LOG_FILTER`].
    pub verbose: bool,
    /// Write to this file instead of stderr.
    pub log_file: Option<PathBuf>,
    /// Filter directive overriding both defaults and `RUST_LOG`.
    pub filter: Option<String>,
}

impl LoggingConfig {
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    pub fn with_filter(mut self, directive: impl Into<String>) -> Self {
        self.filter = Some(directive.into());
        self
    }

    fn env_filter(&self) -> EnvFilter {
        let default = if self.verbose {
            VERBOSE_LOG_FILTER
        } else {
            DEFAULT_LOG_FILTER
        };
        let directive = match &self.filter {
            Some(filter) => filter.clone(),
            None => std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_else(|_| default.to_string()),
        };
        EnvFilter::builder().parse_lossy(directive)
    }
}

/// Install the global subscriber.
///
/// With a log file, events go through a non-blocking writer; keep the
/// returned guard alive until exit or buffered events are lost.
pub fn init_logging(config: LoggingConfig) -> Result<Option<WorkerGuard>, LoggingError> {
    let filter = config.env_filter();
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(LocalTime::rfc_3339())
        .with_target(true);

    match &config.log_file {
        Some(path) => {
            let dir = match path.parent() {
                Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
                _ => PathBuf::from("."),
            };
            std::fs::create_dir_all(&dir).map_err(|source| LoggingError::CreateDir {
                path: dir.clone(),
                source,
            })?;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "hotrod-clients.log".to_string());

            let appender = RollingFileAppender::builder()
                .rotation(Rotation::NEVER)
                .filename_prefix(file_name)
                .build(&dir)
                .map_err(|e| LoggingError::OpenFile {
                    path: path.clone(),
                    reason: e.to_string(),
                })?;
            let (writer, guard) = tracing_appender::non_blocking(appender);

            builder
                .with_ansi(false)
                .with_writer(writer)
                .try_init()
                .map_err(|e| LoggingError::Install(e.to_string()))?;
            Ok(Some(guard))
        }
        None => {
            builder
                .with_writer(io::stderr)
                .try_init()
                .map_err(|e| LoggingError::Install(e.to_string()))?;
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_filter_wins() {
        let config = LoggingConfig::default().verbose(true).with_filter("warn");
        assert_eq!(config.env_filter().to_string(), "warn");
    }

    #[test]
    fn test_builder_methods() {
        let config = LoggingConfig::default()
            .verbose(true)
            .with_log_file("/tmp/hotrod.log");
        assert!(config.verbose);
        assert_eq!(config.log_file, Some(PathBuf::from("/tmp/hotrod.log")));
        assert!(config.filter.is_none());
    }
}
