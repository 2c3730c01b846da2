//! Structured per-client runtime settings and client definitions.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::configuration::{ClientIntelligence, NearCacheMode};
use crate::marshall::Marshaller;
use crate::properties::Properties;
use crate::schema::SchemaRegistration;

/// Overrides for one named cache of a client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteCacheConfig {
    /// Declarative cache definition file, resolved against the resource
    /// directory. Takes precedence over `configuration`.
    pub configuration_uri: Option<PathBuf>,
    /// Inline declarative cache definition.
    pub configuration: Option<String>,
    pub near_cache_max_entries: Option<i64>,
    pub near_cache_mode: Option<NearCacheMode>,
    pub near_cache_use_bloom_filter: Option<bool>,
}

/// Runtime settings for one client.
///
/// `server_list`, `auth_username` and `auth_password` are deprecated
/// spellings of `hosts`, `username` and `password`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRuntimeConfig {
    pub uri: Option<String>,
    pub hosts: Option<String>,
    pub server_list: Option<String>,
    pub username: Option<String>,
    pub auth_username: Option<String>,
    pub password: Option<String>,
    pub auth_password: Option<String>,
    pub use_auth: Option<bool>,
    pub auth_realm: Option<String>,
    pub auth_server_name: Option<String>,
    pub auth_client_subject: Option<String>,
    pub auth_callback_handler: Option<String>,
    pub sasl_mechanism: Option<String>,
    pub trust_store: Option<PathBuf>,
    pub trust_store_password: Option<String>,
    pub trust_store_type: Option<String>,
    pub ssl_provider: Option<String>,
    pub ssl_protocol: Option<String>,
    pub ssl_ciphers: Vec<String>,
    pub client_intelligence: Option<ClientIntelligence>,
    pub tracing_propagation_enabled: bool,
    pub cache: BTreeMap<String, RemoteCacheConfig>,
}

impl Default for ClientRuntimeConfig {
    fn default() -> Self {
        Self {
            uri: None,
            hosts: None,
            server_list: None,
            username: None,
            auth_username: None,
            password: None,
            auth_password: None,
            use_auth: None,
            auth_realm: None,
            auth_server_name: None,
            auth_client_subject: None,
            auth_callback_handler: None,
            sasl_mechanism: None,
            trust_store: None,
            trust_store_password: None,
            trust_store_type: None,
            ssl_provider: None,
            ssl_protocol: None,
            ssl_ciphers: Vec::new(),
            client_intelligence: None,
            tracing_propagation_enabled: true,
            cache: BTreeMap::new(),
        }
    }
}

impl ClientRuntimeConfig {
    /// Runtime settings pointing at a `;`-separated server list.
    pub fn with_hosts(hosts: impl Into<String>) -> Self {
        Self {
            hosts: Some(hosts.into()),
            ..Self::default()
        }
    }

    /// Runtime settings pointing at a Hot Rod URI.
    pub fn with_uri(uri: impl Into<String>) -> Self {
        Self {
            uri: Some(uri.into()),
            ..Self::default()
        }
    }

    /// Add or replace the overrides for a cache.
    pub fn with_cache(mut self, name: impl Into<String>, cache: RemoteCacheConfig) -> Self {
        self.cache.insert(name.into(), cache);
        self
    }
}

/// Runtime settings for every client plus global switches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientsRuntimeConfig {
    /// Push schemas to the server after connecting. Enabled when unset.
    pub use_schema_registration: Option<bool>,
    /// Directory relative cache configuration URIs are resolved against.
    pub resource_dir: PathBuf,
    pub clients: BTreeMap<String, ClientRuntimeConfig>,
}

impl Default for ClientsRuntimeConfig {
    fn default() -> Self {
        Self {
            use_schema_registration: None,
            resource_dir: PathBuf::from("."),
            clients: BTreeMap::new(),
        }
    }
}

impl ClientsRuntimeConfig {
    pub fn client(&self, name: &str) -> Option<&ClientRuntimeConfig> {
        self.clients.get(name)
    }

    pub fn schema_registration_enabled(&self) -> bool {
        self.use_schema_registration.unwrap_or(true)
    }

    /// Resolve a resource path against `resource_dir` unless it is absolute.
    pub fn resolve_resource(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.resource_dir.join(path)
        }
    }
}

/// Everything supplied for one client besides its runtime settings.
#[derive(Debug, Clone, Default)]
pub struct ClientDefinition {
    pub properties: Properties,
    pub marshaller: Option<Arc<dyn Marshaller>>,
    pub schemas: SchemaRegistration,
}

impl ClientDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.set(key, value);
        self
    }

    pub fn with_marshaller(mut self, marshaller: Arc<dyn Marshaller>) -> Self {
        self.marshaller = Some(marshaller);
        self
    }

    pub fn with_schemas(mut self, schemas: SchemaRegistration) -> Self {
        self.schemas = schemas;
        self
    }
}

/// Runtime settings plus client definitions: the full input of a registry.
#[derive(Debug, Clone, Default)]
pub struct ClientsSettings {
    pub runtime: ClientsRuntimeConfig,
    pub clients: BTreeMap<String, ClientDefinition>,
}

impl ClientsSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_runtime(mut self, name: impl Into<String>, runtime: ClientRuntimeConfig) -> Self {
        self.runtime.clients.insert(name.into(), runtime);
        self
    }

    pub fn with_definition(mut self, name: impl Into<String>, definition: ClientDefinition) -> Self {
        self.clients.insert(name.into(), definition);
        self
    }

    pub fn with_resource_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.runtime.resource_dir = dir.into();
        self
    }

    pub fn with_schema_registration(mut self, enabled: bool) -> Self {
        self.runtime.use_schema_registration = Some(enabled);
        self
    }

    pub fn definition(&self, name: &str) -> Option<&ClientDefinition> {
        self.clients.get(name)
    }

    /// Mutable definition for `name`, created empty on first access.
    pub fn definition_mut(&mut self, name: &str) -> &mut ClientDefinition {
        self.clients.entry(name.to_string()).or_default()
    }

    pub fn runtime_config(&self, name: &str) -> Option<&ClientRuntimeConfig> {
        self.runtime.client(name)
    }

    /// Every client name with a definition or a runtime section.
    pub fn client_names(&self) -> BTreeSet<&str> {
        self.clients
            .keys()
            .chain(self.runtime.clients.keys())
            .map(String::as_str)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_defaults() {
        let runtime = ClientRuntimeConfig::default();
        assert!(runtime.tracing_propagation_enabled);
        assert!(runtime.hosts.is_none());

        let all = ClientsRuntimeConfig::default();
        assert!(all.schema_registration_enabled());
        assert_eq!(all.resource_dir, PathBuf::from("."));
    }

    #[test]
    fn test_resolve_resource() {
        let runtime = ClientsRuntimeConfig {
            resource_dir: PathBuf::from("/srv/app"),
            ..ClientsRuntimeConfig::default()
        };
        assert_eq!(
            runtime.resolve_resource(Path::new("orders.xml")),
            PathBuf::from("/srv/app/orders.xml")
        );
        assert_eq!(
            runtime.resolve_resource(Path::new("/etc/orders.xml")),
            PathBuf::from("/etc/orders.xml")
        );
    }

    #[test]
    fn test_client_names_merges_sources() {
        let settings = ClientsSettings::new()
            .with_runtime("site-lon", ClientRuntimeConfig::with_hosts("lon:11222"))
            .with_definition("site-nyc", ClientDefinition::new())
            .with_definition("site-lon", ClientDefinition::new());

        let names: Vec<_> = settings.client_names().into_iter().collect();
        assert_eq!(names, vec!["site-lon", "site-nyc"]);
    }

    #[test]
    fn test_definition_mut_creates_entry() {
        let mut settings = ClientsSettings::new();
        settings
            .definition_mut("reports")
            .properties
            .set("custom", "1");
        assert_eq!(
            settings.definition("reports").unwrap().properties.get("custom"),
            Some("1")
        );
    }
}
