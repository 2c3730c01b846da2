//! Registry of named connection managers.
//!
//! The registry owns at most one [`RemoteCacheManager`] per client name.
//! Managers are built on first use from the registry's [`ClientsSettings`]
//! and live until [`ClientRegistry::shutdown_all`].
//!
//! # Lifecycle
//!
//! ```text
//! absent ──first named_manager() with servers──► active ──shutdown_all()──► stopped
//!   │
//!   └── no settings / no servers: stays absent, every lookup returns None
//! ```
//!
//! Concurrent first access to one name builds exactly one manager. Builds
//! serialize on a per-name lock, so a slow connect for one client never
//! blocks lookups of another.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::client::{
    CacheTemplate, ClientFactory, CounterManager, RemoteCache, RemoteCacheManager,
    DEFAULT_CACHE_NAME,
};
use crate::config::{ClientDefinition, ClientsSettings};
use crate::error::{ClientError, ClientResult};
use crate::schema;
use crate::translator;

/// Name of the default client.
pub const DEFAULT_CLIENT_NAME: &str = "<default>";

/// Template used for caches created on first access.
pub const DEFAULT_CACHE_TEMPLATE: &str =
    "<distributed-cache><encoding media-type=\"application/x-protostream\"/></distributed-cache>";

/// Whether `name` designates the default client.
///
/// The empty name is an alias of [`DEFAULT_CLIENT_NAME`].
pub fn is_default(name: &str) -> bool {
    name.is_empty() || name == DEFAULT_CLIENT_NAME
}

fn canonical(name: &str) -> &str {
    if is_default(name) {
        DEFAULT_CLIENT_NAME
    } else {
        name
    }
}

/// Thread-safe name → connection manager registry.
pub struct ClientRegistry {
    factory: Arc<dyn ClientFactory>,
    settings: ClientsSettings,
    managers: DashMap<String, Arc<dyn RemoteCacheManager>>,
    /// Per-name build locks. Never held together with a `managers` guard.
    builds: DashMap<String, Arc<Mutex<()>>>,
    closed: AtomicBool,
}

impl fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientRegistry")
            .field("clients", &self.settings.client_names())
            .field("registered", &self.registered_clients())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl ClientRegistry {
    /// Open a registry. No connection is made until a manager is requested.
    pub fn open(settings: ClientsSettings, factory: Arc<dyn ClientFactory>) -> Self {
        debug!(
            clients = settings.client_names().len(),
            schema_registration = settings.runtime.schema_registration_enabled(),
            "Opened client registry"
        );
        Self {
            factory,
            settings,
            managers: DashMap::new(),
            builds: DashMap::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> &ClientsSettings {
        &self.settings
    }

    /// Manager of client `name`, building it on first access.
    ///
    /// Returns `Ok(None)` when the client has no usable configuration or no
    /// servers. Nothing is registered in that case, so later calls evaluate
    /// the configuration again.
    pub fn named_manager(&self, name: &str) -> ClientResult<Option<Arc<dyn RemoteCacheManager>>> {
        self.ensure_open()?;
        let name = canonical(name);

        if let Some(existing) = self.registered(name) {
            return Ok(Some(existing));
        }

        let lock = Arc::clone(self.builds.entry(name.to_string()).or_default().value());
        let _build = lock.lock();

        self.ensure_open()?;
        if let Some(existing) = self.registered(name) {
            return Ok(Some(existing));
        }
        let Some(manager) = self.initialize(name)? else {
            return Ok(None);
        };
        // Checked under the build lock; shutdown_all waits on it.
        if self.is_closed() {
            manager.stop();
            return Err(ClientError::RegistryClosed);
        }
        self.managers.insert(name.to_string(), Arc::clone(&manager));
        Ok(Some(manager))
    }

    fn registered(&self, name: &str) -> Option<Arc<dyn RemoteCacheManager>> {
        self.managers.get(name).map(|m| Arc::clone(m.value()))
    }

    /// Manager of the default client.
    pub fn default_manager(&self) -> ClientResult<Option<Arc<dyn RemoteCacheManager>>> {
        self.named_manager(DEFAULT_CLIENT_NAME)
    }

    /// Cache handle for `cache` (or the default cache) of client `client`.
    ///
    /// A cache missing on the server is created from
    /// [`DEFAULT_CACHE_TEMPLATE`].
    pub fn remote_cache(&self, client: &str, cache: Option<&str>) -> ClientResult<Arc<dyn RemoteCache>> {
        let client = canonical(client);
        // The empty name designates the server's default cache.
        let cache = cache.filter(|name| !name.is_empty());
        let cache_name = cache.unwrap_or(DEFAULT_CACHE_NAME);

        let Some(manager) = self.named_manager(client)? else {
            error!(
                client,
                cache = cache_name,
                "Unable to produce remote cache: no connection manager"
            );
            return Err(ClientError::ManagerUnavailable {
                client: client.to_string(),
                cache: cache_name.to_string(),
            });
        };

        let existing = match cache {
            Some(name) => manager.cache(name)?,
            None => manager.default_cache()?,
        };
        if let Some(existing) = existing {
            return Ok(existing);
        }

        warn!(
            client,
            cache = cache_name,
            "Cache not found on the server, creating it with the default template"
        );
        let created =
            manager.get_or_create_cache(cache_name, &CacheTemplate::new(DEFAULT_CACHE_TEMPLATE))?;
        Ok(created)
    }

    /// Counter manager of an already registered client.
    ///
    /// Never builds a connection manager.
    pub fn counter_manager(&self, name: &str) -> ClientResult<Arc<dyn CounterManager>> {
        self.ensure_open()?;
        let name = canonical(name);
        self.managers
            .get(name)
            .map(|manager| manager.counter_manager())
            .ok_or_else(|| ClientError::NoConnectionManager(name.to_string()))
    }

    /// Names of clients with a live manager, sorted.
    pub fn registered_clients(&self) -> Vec<String> {
        let mut names: Vec<String> = self.managers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stop every registered manager and close the registry.
    ///
    /// Each manager is stopped once. Later lookups fail with
    /// [`ClientError::RegistryClosed`].
    pub fn shutdown_all(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        // Wait out in-flight builds; they see the closed flag afterwards.
        let locks: Vec<Arc<Mutex<()>>> =
            self.builds.iter().map(|e| Arc::clone(e.value())).collect();
        for lock in locks {
            drop(lock.lock());
        }

        let mut stopped = 0usize;
        for name in self.registered_clients() {
            if let Some((name, manager)) = self.managers.remove(&name) {
                manager.stop();
                debug!(client = %name, "Stopped connection manager");
                stopped += 1;
            }
        }
        info!(stopped, "Client registry shut down");
    }

    fn ensure_open(&self) -> ClientResult<()> {
        if self.is_closed() {
            Err(ClientError::RegistryClosed)
        } else {
            Ok(())
        }
    }

    fn initialize(&self, name: &str) -> ClientResult<Option<Arc<dyn RemoteCacheManager>>> {
        debug!(client = name, "Initializing connection manager");

        let runtime = self.settings.runtime_config(name);
        let definition = self.settings.definition(name);
        let empty = ClientDefinition::default();
        let definition = match (definition, runtime) {
            (Some(definition), Some(_)) => definition,
            (Some(definition), None) if !definition.properties.is_empty() => definition,
            (None, Some(_)) => &empty,
            _ => {
                debug!(client = name, "No configuration for client, skipping");
                return Ok(None);
            }
        };

        let translated =
            translator::builder_from_properties(name, definition, &self.settings.runtime)?;
        if translated.builder.servers().is_empty() {
            debug!(client = name, "No servers configured for client, skipping");
            return Ok(None);
        }

        let manager = self.factory.connect(translated.builder.build()?)?;
        info!(
            client = name,
            servers = %manager.configuration().server_list(),
            "Started connection manager"
        );

        if self.settings.runtime.schema_registration_enabled() {
            if let Err(e) = schema::push_schemas(manager.as_ref(), &translated.schema_files) {
                error!(client = name, error = %e, "Schema registration failed");
                manager.stop();
                return Err(e);
            }
        }

        Ok(Some(manager))
    }
}
