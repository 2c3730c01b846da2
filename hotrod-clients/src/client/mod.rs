//! Remote cache client abstraction.
//!
//! # Available Implementations
//!
//! - [`memory::MemoryClientFactory`]: in-process cluster, used by the CLI
//!   `check` command and by tests
//!
//! A network client plugs in by implementing [`ClientFactory`] and the
//! traits it returns.

pub mod memory;
mod traits;

pub use traits::{
    CacheTemplate, ClientFactory, CounterConfiguration, CounterKind, CounterManager, RemoteCache,
    RemoteCacheManager, RemoteError, RemoteResult, DEFAULT_CACHE_NAME,
    PROTOBUF_METADATA_CACHE_NAME,
};
