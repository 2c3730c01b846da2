//! In-process cluster implementing the remote client traits.
//!
//! A [`MemoryServer`] plays the role of a cluster: it owns named caches,
//! counters and the protobuf metadata cache. Every manager produced by a
//! [`MemoryClientFactory`] talks to the same server, so state written
//! through one client is visible through another, as it would be on a real
//! cluster.
//!
//! Cache entries are held in `moka::sync::Cache`, bounded by entry count.
//! Past the bound, entries are evicted silently. The protobuf metadata cache
//! is never bounded, so registered schemas are not lost.
//!
//! The server also records the templates caches were created from and can
//! be told to reject writes to a cache, which is how failure paths are
//! exercised in tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use moka::sync::Cache as MokaCache;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use super::traits::{
    CacheTemplate, ClientFactory, CounterConfiguration, CounterKind, CounterManager, RemoteCache,
    RemoteCacheManager, RemoteError, RemoteResult, DEFAULT_CACHE_NAME, PROTOBUF_METADATA_CACHE_NAME,
};
use crate::configuration::Configuration;

/// Maximum entries held per in-memory cache.
pub const DEFAULT_MAX_ENTRIES: u64 = 100_000;

/// One named cache on a [`MemoryServer`].
pub struct MemoryRemoteCache {
    name: String,
    entries: MokaCache<String, Vec<u8>>,
    reject_writes: AtomicBool,
}

impl MemoryRemoteCache {
    fn new(name: &str, max_entries: Option<u64>) -> Self {
        let mut builder = MokaCache::builder();
        if let Some(max_entries) = max_entries {
            builder = builder.max_capacity(max_entries);
        }
        Self {
            name: name.to_string(),
            entries: builder.build(),
            reject_writes: AtomicBool::new(false),
        }
    }

    fn check_writable(&self) -> RemoteResult<()> {
        if self.reject_writes.load(Ordering::Acquire) {
            return Err(RemoteError::Rejected {
                cache: self.name.clone(),
                reason: "cache is read-only".to_string(),
            });
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.get(key)
    }

    /// Get a value as UTF-8 text.
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key)
            .and_then(|bytes| String::from_utf8(bytes).ok())
    }

    pub fn put(&self, key: &str, value: Vec<u8>) -> RemoteResult<Option<Vec<u8>>> {
        self.check_writable()?;
        let mut previous = None;
        self.entries
            .entry(key.to_string())
            .and_upsert_with(|existing| {
                previous = existing.map(|entry| entry.into_value());
                value
            });
        Ok(previous)
    }

    pub fn remove(&self, key: &str) -> RemoteResult<Option<Vec<u8>>> {
        self.check_writable()?;
        Ok(self.entries.remove(key))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Exact number of live entries.
    pub fn len(&self) -> u64 {
        self.entries.iter().count() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All keys currently stored, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.iter().map(|(k, _)| (*k).clone()).collect();
        keys.sort();
        keys
    }

    pub fn clear(&self) -> RemoteResult<()> {
        self.check_writable()?;
        self.entries.invalidate_all();
        self.entries.run_pending_tasks();
        Ok(())
    }
}

/// In-process stand-in for a cluster.
pub struct MemoryServer {
    caches: DashMap<String, Arc<MemoryRemoteCache>>,
    created: Mutex<Vec<(String, CacheTemplate)>>,
    default_cache: RwLock<Option<String>>,
    counters: Arc<MemoryCounterManager>,
    connections: AtomicUsize,
    max_entries: u64,
}

impl MemoryServer {
    /// Create a server holding only the protobuf metadata cache.
    pub fn new() -> Arc<Self> {
        Self::with_max_entries(DEFAULT_MAX_ENTRIES)
    }

    /// Create a server whose caches hold at most `max_entries` entries.
    pub fn with_max_entries(max_entries: u64) -> Arc<Self> {
        let server = Self {
            caches: DashMap::new(),
            created: Mutex::new(Vec::new()),
            default_cache: RwLock::new(None),
            counters: Arc::new(MemoryCounterManager::default()),
            connections: AtomicUsize::new(0),
            max_entries,
        };
        server.define_cache(PROTOBUF_METADATA_CACHE_NAME);
        Arc::new(server)
    }

    /// Define a cache directly on the server, as an administrator would.
    ///
    /// Defining an existing cache returns it unchanged.
    pub fn define_cache(&self, name: &str) -> Arc<MemoryRemoteCache> {
        Arc::clone(
            self.caches
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(self.new_cache(name)))
                .value(),
        )
    }

    /// Define a cache and make it the server's default cache.
    pub fn define_default_cache(&self, name: &str) -> Arc<MemoryRemoteCache> {
        let cache = self.define_cache(name);
        *self.default_cache.write() = Some(name.to_string());
        cache
    }

    pub fn cache(&self, name: &str) -> Option<Arc<MemoryRemoteCache>> {
        self.caches.get(name).map(|c| Arc::clone(c.value()))
    }

    pub fn has_cache(&self, name: &str) -> bool {
        self.caches.contains_key(name)
    }

    /// The protobuf metadata cache.
    pub fn metadata_cache(&self) -> Arc<MemoryRemoteCache> {
        self.define_cache(PROTOBUF_METADATA_CACHE_NAME)
    }

    /// Make every write to the named cache fail.
    pub fn reject_writes(&self, name: &str) {
        self.define_cache(name)
            .reject_writes
            .store(true, Ordering::Release);
    }

    /// Caches created through `get_or_create_cache`, in creation order.
    pub fn created_caches(&self) -> Vec<(String, CacheTemplate)> {
        self.created.lock().clone()
    }

    /// Number of connection managers built against this server.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn counters(&self) -> Arc<MemoryCounterManager> {
        Arc::clone(&self.counters)
    }

    fn new_cache(&self, name: &str) -> MemoryRemoteCache {
        let max_entries = (name != PROTOBUF_METADATA_CACHE_NAME).then_some(self.max_entries);
        MemoryRemoteCache::new(name, max_entries)
    }

    fn create_from_template(
        &self,
        name: &str,
        template: &CacheTemplate,
    ) -> RemoteResult<Arc<MemoryRemoteCache>> {
        let definition = template.as_str().trim_start();
        if !(definition.starts_with('<') || definition.starts_with('{')) {
            return Err(RemoteError::InvalidTemplate(template.to_string()));
        }

        match self.caches.entry(name.to_string()) {
            Entry::Occupied(existing) => Ok(Arc::clone(existing.get())),
            Entry::Vacant(vacant) => {
                let cache = Arc::new(self.new_cache(name));
                vacant.insert(Arc::clone(&cache));
                self.created.lock().push((name.to_string(), template.clone()));
                debug!(cache = name, "Created cache from template");
                Ok(cache)
            }
        }
    }
}

/// Cache handle bound to the manager that produced it.
struct MemoryCacheHandle {
    cache: Arc<MemoryRemoteCache>,
    started: Arc<AtomicBool>,
}

impl MemoryCacheHandle {
    fn check_started(&self) -> RemoteResult<()> {
        if self.started.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(RemoteError::Stopped)
        }
    }
}

impl RemoteCache for MemoryCacheHandle {
    fn name(&self) -> &str {
        self.cache.name()
    }

    fn get(&self, key: &str) -> RemoteResult<Option<Vec<u8>>> {
        self.check_started()?;
        Ok(self.cache.get(key))
    }

    fn put(&self, key: &str, value: Vec<u8>) -> RemoteResult<Option<Vec<u8>>> {
        self.check_started()?;
        self.cache.put(key, value)
    }

    fn remove(&self, key: &str) -> RemoteResult<Option<Vec<u8>>> {
        self.check_started()?;
        self.cache.remove(key)
    }

    fn contains_key(&self, key: &str) -> RemoteResult<bool> {
        self.check_started()?;
        Ok(self.cache.contains_key(key))
    }

    fn size(&self) -> RemoteResult<u64> {
        self.check_started()?;
        Ok(self.cache.len())
    }

    fn clear(&self) -> RemoteResult<()> {
        self.check_started()?;
        self.cache.clear()
    }
}

/// Connection manager bound to a [`MemoryServer`].
pub struct MemoryCacheManager {
    configuration: Configuration,
    server: Arc<MemoryServer>,
    started: Arc<AtomicBool>,
}

impl MemoryCacheManager {
    fn handle(&self, cache: Arc<MemoryRemoteCache>) -> Arc<dyn RemoteCache> {
        Arc::new(MemoryCacheHandle {
            cache,
            started: Arc::clone(&self.started),
        })
    }

    fn check_started(&self) -> RemoteResult<()> {
        if self.started.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(RemoteError::Stopped)
        }
    }
}

impl RemoteCacheManager for MemoryCacheManager {
    fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    fn cache(&self, name: &str) -> RemoteResult<Option<Arc<dyn RemoteCache>>> {
        self.check_started()?;
        Ok(self.server.cache(name).map(|c| self.handle(c)))
    }

    fn default_cache(&self) -> RemoteResult<Option<Arc<dyn RemoteCache>>> {
        self.check_started()?;
        let name = self
            .server
            .default_cache
            .read()
            .clone()
            .unwrap_or_else(|| DEFAULT_CACHE_NAME.to_string());
        Ok(self.server.cache(&name).map(|c| self.handle(c)))
    }

    fn get_or_create_cache(
        &self,
        name: &str,
        template: &CacheTemplate,
    ) -> RemoteResult<Arc<dyn RemoteCache>> {
        self.check_started()?;
        let cache = self.server.create_from_template(name, template)?;
        Ok(self.handle(cache))
    }

    fn cache_names(&self) -> RemoteResult<Vec<String>> {
        self.check_started()?;
        let mut names: Vec<String> = self.server.caches.iter().map(|e| e.key().clone()).collect();
        names.sort();
        Ok(names)
    }

    fn counter_manager(&self) -> Arc<dyn CounterManager> {
        self.server.counters()
    }

    fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    fn stop(&self) {
        if self.started.swap(false, Ordering::AcqRel) {
            info!(servers = %self.configuration.server_list(), "Stopped in-memory cache manager");
        }
    }
}

/// Factory producing managers bound to one [`MemoryServer`].
pub struct MemoryClientFactory {
    server: Arc<MemoryServer>,
}

impl MemoryClientFactory {
    /// Create a factory with a fresh server.
    pub fn new() -> Self {
        Self::with_server(MemoryServer::new())
    }

    /// Create a factory bound to an existing server.
    pub fn with_server(server: Arc<MemoryServer>) -> Self {
        Self { server }
    }

    pub fn server(&self) -> Arc<MemoryServer> {
        Arc::clone(&self.server)
    }
}

impl Default for MemoryClientFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientFactory for MemoryClientFactory {
    fn connect(&self, configuration: Configuration) -> RemoteResult<Arc<dyn RemoteCacheManager>> {
        if configuration.servers().is_empty() {
            return Err(RemoteError::Connection(
                "no servers configured".to_string(),
            ));
        }

        self.server.connections.fetch_add(1, Ordering::SeqCst);
        info!(servers = %configuration.server_list(), "Started in-memory cache manager");

        Ok(Arc::new(MemoryCacheManager {
            configuration,
            server: Arc::clone(&self.server),
            started: Arc::new(AtomicBool::new(true)),
        }))
    }
}

#[derive(Debug, Clone, Copy)]
struct CounterState {
    configuration: CounterConfiguration,
    value: i64,
}

/// Counters held by a [`MemoryServer`].
#[derive(Default)]
pub struct MemoryCounterManager {
    counters: Mutex<HashMap<String, CounterState>>,
}

impl CounterManager for MemoryCounterManager {
    fn define_counter(
        &self,
        name: &str,
        configuration: CounterConfiguration,
    ) -> RemoteResult<bool> {
        if let CounterKind::Bounded { lower, upper } = configuration.kind {
            if lower > upper
                || configuration.initial_value < lower
                || configuration.initial_value > upper
            {
                return Err(RemoteError::CounterOutOfBounds {
                    name: name.to_string(),
                    lower,
                    upper,
                });
            }
        }

        let mut counters = self.counters.lock();
        if counters.contains_key(name) {
            return Ok(false);
        }
        counters.insert(
            name.to_string(),
            CounterState {
                configuration,
                value: configuration.initial_value,
            },
        );
        Ok(true)
    }

    fn is_defined(&self, name: &str) -> RemoteResult<bool> {
        Ok(self.counters.lock().contains_key(name))
    }

    fn configuration(&self, name: &str) -> RemoteResult<Option<CounterConfiguration>> {
        Ok(self.counters.lock().get(name).map(|s| s.configuration))
    }

    fn add_and_get(&self, name: &str, delta: i64) -> RemoteResult<i64> {
        let mut counters = self.counters.lock();
        let state = counters
            .get_mut(name)
            .ok_or_else(|| RemoteError::UndefinedCounter(name.to_string()))?;

        let next = state.value.saturating_add(delta);
        if let CounterKind::Bounded { lower, upper } = state.configuration.kind {
            if next < lower || next > upper {
                return Err(RemoteError::CounterOutOfBounds {
                    name: name.to_string(),
                    lower,
                    upper,
                });
            }
        }
        state.value = next;
        Ok(next)
    }

    fn value(&self, name: &str) -> RemoteResult<i64> {
        self.counters
            .lock()
            .get(name)
            .map(|s| s.value)
            .ok_or_else(|| RemoteError::UndefinedCounter(name.to_string()))
    }

    fn reset(&self, name: &str) -> RemoteResult<()> {
        let mut counters = self.counters.lock();
        let state = counters
            .get_mut(name)
            .ok_or_else(|| RemoteError::UndefinedCounter(name.to_string()))?;
        state.value = state.configuration.initial_value;
        Ok(())
    }

    fn remove(&self, name: &str) -> RemoteResult<()> {
        self.counters.lock().remove(name);
        Ok(())
    }

    fn counter_names(&self) -> RemoteResult<Vec<String>> {
        let mut names: Vec<String> = self.counters.lock().keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::ConfigurationBuilder;

    fn configuration() -> Configuration {
        let mut builder = ConfigurationBuilder::new();
        builder.add_server("localhost", 11222);
        builder.build().unwrap()
    }

    fn manager(server: &Arc<MemoryServer>) -> Arc<dyn RemoteCacheManager> {
        MemoryClientFactory::with_server(Arc::clone(server))
            .connect(configuration())
            .unwrap()
    }

    #[test]
    fn test_new_server_has_metadata_cache() {
        let server = MemoryServer::new();
        assert!(server.has_cache(PROTOBUF_METADATA_CACHE_NAME));
        assert_eq!(server.connections(), 0);
    }

    #[test]
    fn test_connect_requires_servers() {
        let factory = MemoryClientFactory::new();
        let result = factory.connect(ConfigurationBuilder::new().build().unwrap());
        assert!(matches!(result, Err(RemoteError::Connection(_))));
        assert_eq!(factory.server().connections(), 0);
    }

    #[test]
    fn test_put_get_through_manager() {
        let server = MemoryServer::new();
        server.define_cache("books");
        let manager = manager(&server);

        let cache = manager.cache("books").unwrap().unwrap();
        assert_eq!(cache.put("k", b"v1".to_vec()).unwrap(), None);
        assert_eq!(cache.put("k", b"v2".to_vec()).unwrap(), Some(b"v1".to_vec()));
        assert_eq!(cache.get("k").unwrap(), Some(b"v2".to_vec()));
        assert_eq!(cache.size().unwrap(), 1);

        // Visible directly on the server.
        assert_eq!(server.cache("books").unwrap().get_string("k").as_deref(), Some("v2"));
    }

    #[test]
    fn test_missing_cache_is_none() {
        let server = MemoryServer::new();
        let manager = manager(&server);
        assert!(manager.cache("nope").unwrap().is_none());
        assert!(manager.default_cache().unwrap().is_none());
    }

    #[test]
    fn test_get_or_create_records_template_once() {
        let server = MemoryServer::new();
        let manager = manager(&server);
        let template = CacheTemplate::new("<distributed-cache/>");

        manager.get_or_create_cache("orders", &template).unwrap();
        manager.get_or_create_cache("orders", &template).unwrap();

        let created = server.created_caches();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].0, "orders");
    }

    #[test]
    fn test_get_or_create_rejects_garbage_template() {
        let server = MemoryServer::new();
        let manager = manager(&server);
        let result = manager.get_or_create_cache("orders", &CacheTemplate::new("distributed"));
        assert!(matches!(result, Err(RemoteError::InvalidTemplate(_))));
        assert!(!server.has_cache("orders"));
    }

    #[test]
    fn test_reject_writes() {
        let server = MemoryServer::new();
        server.reject_writes(PROTOBUF_METADATA_CACHE_NAME);
        let manager = manager(&server);

        let cache = manager.cache(PROTOBUF_METADATA_CACHE_NAME).unwrap().unwrap();
        assert!(matches!(
            cache.put("a.proto", b"x".to_vec()),
            Err(RemoteError::Rejected { .. })
        ));
    }

    #[test]
    fn test_stop_invalidates_handles() {
        let server = MemoryServer::new();
        server.define_cache("books");
        let manager = manager(&server);
        let cache = manager.cache("books").unwrap().unwrap();

        manager.stop();
        manager.stop();

        assert!(!manager.is_started());
        assert_eq!(cache.get("k"), Err(RemoteError::Stopped));
        assert!(matches!(manager.cache("books"), Err(RemoteError::Stopped)));
    }

    #[test]
    fn test_default_cache() {
        let server = MemoryServer::new();
        server.define_default_cache("main");
        let manager = manager(&server);
        let cache = manager.default_cache().unwrap().unwrap();
        assert_eq!(cache.name(), "main");
    }

    #[test]
    fn test_unnamed_cache_serves_as_default() {
        let server = MemoryServer::new();
        let manager = manager(&server);
        manager
            .get_or_create_cache(DEFAULT_CACHE_NAME, &CacheTemplate::new("<local-cache/>"))
            .unwrap();
        assert_eq!(manager.default_cache().unwrap().unwrap().name(), "");
    }

    #[test]
    fn test_clear() {
        let server = MemoryServer::new();
        let cache = server.define_cache("books");
        cache.put("a", vec![1]).unwrap();
        cache.put("b", vec![2]).unwrap();
        cache.clear().unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_metadata_cache_is_never_evicted() {
        let server = MemoryServer::with_max_entries(2);
        let metadata = server.metadata_cache();
        for i in 0..10 {
            metadata.put(&format!("schema-{i}.proto"), vec![1]).unwrap();
        }
        metadata.entries.run_pending_tasks();
        assert_eq!(metadata.len(), 10);
    }

    #[test]
    fn test_concurrent_puts_see_each_previous_value_once() {
        const WRITERS: u8 = 8;

        let server = MemoryServer::new();
        let cache = server.define_cache("books");
        let previous: Vec<Option<Vec<u8>>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..WRITERS)
                .map(|i| {
                    let cache = &cache;
                    scope.spawn(move || cache.put("k", vec![i]).unwrap())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        // Each write replaces exactly one earlier value.
        assert_eq!(previous.iter().filter(|p| p.is_none()).count(), 1);
        let mut seen: Vec<u8> = previous.into_iter().flatten().flatten().collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), usize::from(WRITERS) - 1);
    }

    #[test]
    fn test_bounded_counter() {
        let counters = MemoryCounterManager::default();
        assert!(counters
            .define_counter("seats", CounterConfiguration::bounded(0, 0, 2))
            .unwrap());
        assert!(!counters
            .define_counter("seats", CounterConfiguration::bounded(0, 0, 2))
            .unwrap());

        assert_eq!(counters.add_and_get("seats", 2).unwrap(), 2);
        assert!(matches!(
            counters.add_and_get("seats", 1),
            Err(RemoteError::CounterOutOfBounds { .. })
        ));
        assert_eq!(counters.value("seats").unwrap(), 2);

        counters.reset("seats").unwrap();
        assert_eq!(counters.value("seats").unwrap(), 0);
    }

    #[test]
    fn test_undefined_counter() {
        let counters = MemoryCounterManager::default();
        assert_eq!(
            counters.add_and_get("ghost", 1),
            Err(RemoteError::UndefinedCounter("ghost".to_string()))
        );
    }

    #[test]
    fn test_counters_shared_between_managers() {
        let server = MemoryServer::new();
        let first = manager(&server);
        let second = manager(&server);

        first
            .counter_manager()
            .define_counter("hits", CounterConfiguration::unbounded(10))
            .unwrap();
        assert_eq!(second.counter_manager().add_and_get("hits", 5).unwrap(), 15);
        assert_eq!(server.connections(), 2);
    }
}
