//! Configuration file errors.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading a clients configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {}: {source}", path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(String),

    #[error("invalid value '{value}' for {key} in [{section}]: {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    #[error("unrecognised section [{0}]")]
    InvalidSection(String),
}
