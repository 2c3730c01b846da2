//! Traits at the boundary with the remote cache client.
//!
//! The registry never talks to a server itself. It hands a built
//! [`Configuration`] to a [`ClientFactory`] and works with the returned
//! [`RemoteCacheManager`] from then on. Keeping these as traits lets the
//! registry run against any client implementation, including the
//! in-process one in [`memory`](super::memory).
//!
//! All calls are blocking; whatever timeout the client applies is the only
//! bound on them.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::configuration::Configuration;

/// Name of the reserved cache the server uses to distribute protobuf schemas.
pub const PROTOBUF_METADATA_CACHE_NAME: &str = "___protobuf_metadata";

/// Name under which the server exposes its default cache.
pub const DEFAULT_CACHE_NAME: &str = "";

/// Result type for remote client operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors reported by a remote client implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// Could not establish a connection to the cluster.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The connection manager has been stopped.
    #[error("cache manager is stopped")]
    Stopped,

    /// The server rejected an operation on a cache.
    #[error("operation on cache '{cache}' rejected: {reason}")]
    Rejected { cache: String, reason: String },

    /// A cache template could not be understood by the server.
    #[error("invalid cache template: {0}")]
    InvalidTemplate(String),

    /// The named counter does not exist.
    #[error("counter '{0}' is not defined")]
    UndefinedCounter(String),

    /// A bounded counter update would leave its bounds.
    #[error("counter '{name}' would leave its bounds [{lower}, {upper}]")]
    CounterOutOfBounds { name: String, lower: i64, upper: i64 },
}

/// Declarative cache configuration sent to the server when creating a cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheTemplate(String);

impl CacheTemplate {
    pub fn new(definition: impl Into<String>) -> Self {
        Self(definition.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A named remote key-value cache.
///
/// Keys are strings and values raw bytes; marshalling of richer types is
/// the caller's concern.
pub trait RemoteCache: Send + Sync {
    /// Cache name on the server.
    fn name(&self) -> &str;

    /// Get a value.
    fn get(&self, key: &str) -> RemoteResult<Option<Vec<u8>>>;

    /// Store a value, returning the previous one.
    fn put(&self, key: &str, value: Vec<u8>) -> RemoteResult<Option<Vec<u8>>>;

    /// Remove a value, returning it.
    fn remove(&self, key: &str) -> RemoteResult<Option<Vec<u8>>>;

    fn contains_key(&self, key: &str) -> RemoteResult<bool>;

    /// Number of entries in the cache.
    fn size(&self) -> RemoteResult<u64>;

    fn clear(&self) -> RemoteResult<()>;
}

/// Long-lived handle on a pool of connections to one cluster.
pub trait RemoteCacheManager: Send + Sync {
    /// Configuration this manager was built from.
    fn configuration(&self) -> &Configuration;

    /// Look up an existing cache.
    ///
    /// Returns `Ok(None)` if the server has no cache with this name.
    fn cache(&self, name: &str) -> RemoteResult<Option<Arc<dyn RemoteCache>>>;

    /// Look up the server's default cache.
    fn default_cache(&self) -> RemoteResult<Option<Arc<dyn RemoteCache>>>;

    /// Return the named cache, creating it from `template` if it does not exist.
    fn get_or_create_cache(
        &self,
        name: &str,
        template: &CacheTemplate,
    ) -> RemoteResult<Arc<dyn RemoteCache>>;

    /// Names of all caches on the server.
    fn cache_names(&self) -> RemoteResult<Vec<String>>;

    /// Distributed counter façade over this manager's connections.
    fn counter_manager(&self) -> Arc<dyn CounterManager>;

    fn is_started(&self) -> bool;

    /// Release all connections. Idempotent.
    fn stop(&self);
}

/// Builds connection managers from a client configuration.
pub trait ClientFactory: Send + Sync {
    /// Create and start a connection manager.
    fn connect(&self, configuration: Configuration) -> RemoteResult<Arc<dyn RemoteCacheManager>>;
}

/// Bounds of a distributed counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterKind {
    Unbounded,
    Bounded { lower: i64, upper: i64 },
}

/// Definition of a distributed counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterConfiguration {
    pub kind: CounterKind,
    pub initial_value: i64,
}

impl CounterConfiguration {
    pub fn unbounded(initial_value: i64) -> Self {
        Self {
            kind: CounterKind::Unbounded,
            initial_value,
        }
    }

    pub fn bounded(initial_value: i64, lower: i64, upper: i64) -> Self {
        Self {
            kind: CounterKind::Bounded { lower, upper },
            initial_value,
        }
    }
}

/// Cluster-wide named counters.
pub trait CounterManager: Send + Sync {
    /// Define a counter. Returns `false` if it already existed.
    fn define_counter(&self, name: &str, configuration: CounterConfiguration)
        -> RemoteResult<bool>;

    fn is_defined(&self, name: &str) -> RemoteResult<bool>;

    fn configuration(&self, name: &str) -> RemoteResult<Option<CounterConfiguration>>;

    /// Atomically add `delta` and return the new value.
    fn add_and_get(&self, name: &str, delta: i64) -> RemoteResult<i64>;

    fn value(&self, name: &str) -> RemoteResult<i64>;

    /// Reset a counter to its initial value.
    fn reset(&self, name: &str) -> RemoteResult<()>;

    fn remove(&self, name: &str) -> RemoteResult<()>;

    fn counter_names(&self) -> RemoteResult<Vec<String>>;
}
