//! hotrod-clients - Named Hot Rod client registry
//!
//! This library wires remote cache clients into a host process. It reads
//! per-client configuration, translates it into a client [`Configuration`],
//! builds one connection manager per client name on first use, registers
//! protobuf schemas with the marshaller and the server, and hands out cache
//! handles until the registry is shut down.
//!
//! The remote client itself is reached only through the traits in
//! [`client`]; an in-process implementation lives in [`client::memory`].
//!
//! # Example
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use hotrod_clients::client::memory::MemoryClientFactory;
//! use hotrod_clients::config::ClientsSettings;
//! use hotrod_clients::registry::ClientRegistry;
//!
//! let settings = ClientsSettings::load("clients.ini")?;
//! let registry = ClientRegistry::open(settings, Arc::new(MemoryClientFactory::new()));
//!
//! let books = registry.remote_cache("<default>", Some("books"))?;
//! books.put("isbn-1", b"Dune".to_vec())?;
//!
//! registry.shutdown_all();
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod configuration;
pub mod error;
pub mod logging;
pub mod marshall;
pub mod properties;
pub mod registry;
pub mod schema;
pub mod translator;

pub use client::{
    CacheTemplate, ClientFactory, CounterManager, RemoteCache, RemoteCacheManager, RemoteError,
};
pub use config::{ClientDefinition, ClientRuntimeConfig, ClientsRuntimeConfig, ClientsSettings};
pub use configuration::{Configuration, ConfigurationBuilder};
pub use error::{ClientError, ClientResult};
pub use properties::Properties;
pub use registry::{ClientRegistry, DEFAULT_CACHE_TEMPLATE, DEFAULT_CLIENT_NAME};
pub use schema::SchemaRegistration;
