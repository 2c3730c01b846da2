//! Client settings: runtime configuration, client definitions and the
//! INI configuration file.
//!
//! A [`ClientsSettings`] is the complete input of a
//! [`ClientRegistry`](crate::registry::ClientRegistry). It pairs the
//! structured runtime settings of every client with the raw property bag,
//! marshaller and schemas supplied for it. Settings are usually loaded
//! from a file with [`ClientsSettings::load`], then extended in code.

mod error;
mod file;
mod runtime;

pub use error::ConfigError;
pub use file::default_config_path;
pub use runtime::{
    ClientDefinition, ClientRuntimeConfig, ClientsRuntimeConfig, ClientsSettings,
    RemoteCacheConfig,
};
