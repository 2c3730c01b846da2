//! Client registry error types.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::client::RemoteError;

/// Result type for registry and translation operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur while configuring or resolving clients.
///
/// Missing configuration is not represented here: it is an `Ok(None)`
/// from [`ClientRegistry::named_manager`](crate::registry::ClientRegistry::named_manager).
#[derive(Debug, Error)]
pub enum ClientError {
    /// A property value could not be interpreted.
    #[error("invalid value '{value}' for property {key}: {reason}")]
    InvalidProperty {
        key: String,
        value: String,
        reason: String,
    },

    /// A server address in a server list is malformed.
    #[error("invalid server address '{0}'")]
    InvalidServerAddress(String),

    /// A Hot Rod URI is malformed.
    #[error("invalid Hot Rod URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    /// The built configuration is inconsistent.
    #[error("invalid client configuration: {0}")]
    InvalidConfiguration(String),

    /// A cache configuration resource could not be resolved or read.
    #[error("cannot load configuration for cache {cache} from {}: {source}", path.display())]
    CacheConfigurationResource {
        cache: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A schema file was rejected by the serialization context.
    #[error("invalid schema file '{file}': {reason}")]
    InvalidSchema { file: String, reason: String },

    /// No connection manager is available to produce a cache.
    #[error("Unable to produce RemoteCache. RemoteCacheManager is null. Client: {client}, cache: {cache}")]
    ManagerUnavailable { client: String, cache: String },

    /// A counter manager was requested for a client that was never started.
    #[error("no connection manager registered for client {0}")]
    NoConnectionManager(String),

    /// Writing a schema file to the server failed.
    #[error("failed to register schema {file} on the server: {source}")]
    SchemaPush {
        file: String,
        #[source]
        source: RemoteError,
    },

    /// The registry has been shut down.
    #[error("client registry is shut down")]
    RegistryClosed,

    /// Error reported by the remote client.
    #[error(transparent)]
    Remote(#[from] RemoteError),
}
