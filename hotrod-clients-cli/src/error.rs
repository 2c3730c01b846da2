//! CLI error type.

use std::io;

use thiserror::Error;

use hotrod_clients::config::ConfigError;
use hotrod_clients::logging::LoggingError;
use hotrod_clients::ClientError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Config(String),

    #[error("unknown client '{0}'. Use 'hotrod-clients clients' to list configured clients.")]
    UnknownClient(String),

    #[error(transparent)]
    Settings(#[from] ConfigError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Logging(#[from] LoggingError),

    #[error("failed to read schema directory: {0}")]
    SchemaDir(#[source] io::Error),

    #[error("failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),
}
