//! Client configuration model.
//!
//! [`ConfigurationBuilder`] collects servers, security, per-cache overrides
//! and the marshaller, either directly or from a property bag, and produces
//! an immutable [`Configuration`] for a
//! [`ClientFactory`](crate::client::ClientFactory).
//!
//! # Example
//!
//! ```
//! use hotrod_clients::configuration::{ConfigurationBuilder, NearCacheMode};
//!
//! let mut builder = ConfigurationBuilder::new();
//! builder.add_servers("node1:11222;node2").unwrap();
//! builder.security().authentication().username("app").password("secret");
//! builder
//!     .remote_cache("books")
//!     .near_cache_mode(NearCacheMode::Invalidated)
//!     .near_cache_max_entries(1000);
//!
//! let config = builder.build().unwrap();
//! assert_eq!(config.servers().len(), 2);
//! assert!(config.authentication().enabled);
//! ```

mod builder;
mod types;
mod uri;

pub use builder::{
    AuthenticationBuilder, ConfigurationBuilder, RemoteCacheConfigurationBuilder,
    SecurityBuilder, SslBuilder, DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_MAX_RETRIES,
    DEFAULT_SOCKET_TIMEOUT_MS,
};
pub use types::{
    parse_server_list, AuthenticationConfiguration, ClientIntelligence, Configuration,
    NearCacheMode, RemoteCacheConfiguration, SecurityConfiguration, ServerAddress,
    SslConfiguration, DEFAULT_PORT, DEFAULT_REALM, DEFAULT_SASL_MECHANISM, DEFAULT_SERVER_NAME,
    UNBOUNDED_NEAR_CACHE,
};
pub use uri::HotRodUri;
