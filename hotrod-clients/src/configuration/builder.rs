//! Client configuration builder.
//!
//! Settings can be applied one by one or in bulk from a [`Properties`] bag
//! via [`ConfigurationBuilder::with_properties`]. The bag is kept on the
//! built [`Configuration`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::types::{
    parse_server_list, AuthenticationConfiguration, ClientIntelligence, Configuration,
    NearCacheMode, RemoteCacheConfiguration, SecurityConfiguration, ServerAddress,
    SslConfiguration, DEFAULT_REALM, DEFAULT_SASL_MECHANISM, DEFAULT_SERVER_NAME,
    UNBOUNDED_NEAR_CACHE,
};
use super::uri::HotRodUri;
use crate::error::{ClientError, ClientResult};
use crate::marshall::{Marshaller, ProtoStreamMarshaller, Utf8Marshaller};
use crate::properties::{keys, Properties, PROTOBUF_FILE_PREFIX};

pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_SOCKET_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Per-cache settings understood under `infinispan.client.hotrod.cache.<name>.`.
const CACHE_SETTINGS: [&str; 6] = [
    "configuration_uri",
    "configuration",
    "template_name",
    "near_cache.mode",
    "near_cache.max_entries",
    "near_cache.use_bloom_filter",
];

/// Authentication settings being assembled.
#[derive(Debug, Clone, Default)]
pub struct AuthenticationBuilder {
    enabled: Option<bool>,
    username: Option<String>,
    password: Option<String>,
    realm: Option<String>,
    server_name: Option<String>,
    client_subject: Option<String>,
    callback_handler: Option<String>,
    sasl_mechanism: Option<String>,
}

impl AuthenticationBuilder {
    /// Explicitly enable or disable authentication.
    ///
    /// Without this, authentication is enabled when a username or callback
    /// handler is set.
    pub fn enable(&mut self, enabled: bool) -> &mut Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn username(&mut self, username: impl Into<String>) -> &mut Self {
        self.username = Some(username.into());
        self
    }

    pub fn password(&mut self, password: impl Into<String>) -> &mut Self {
        self.password = Some(password.into());
        self
    }

    pub fn realm(&mut self, realm: impl Into<String>) -> &mut Self {
        self.realm = Some(realm.into());
        self
    }

    pub fn server_name(&mut self, server_name: impl Into<String>) -> &mut Self {
        self.server_name = Some(server_name.into());
        self
    }

    pub fn client_subject(&mut self, subject: impl Into<String>) -> &mut Self {
        self.client_subject = Some(subject.into());
        self
    }

    pub fn callback_handler(&mut self, handler: impl Into<String>) -> &mut Self {
        self.callback_handler = Some(handler.into());
        self
    }

    pub fn sasl_mechanism(&mut self, mechanism: impl Into<String>) -> &mut Self {
        self.sasl_mechanism = Some(mechanism.into());
        self
    }

    fn build(&self) -> ClientResult<AuthenticationConfiguration> {
        let enabled = self
            .enabled
            .unwrap_or(self.username.is_some() || self.callback_handler.is_some());
        let sasl_mechanism = self
            .sasl_mechanism
            .clone()
            .unwrap_or_else(|| DEFAULT_SASL_MECHANISM.to_string());

        if enabled
            && self.username.is_none()
            && self.callback_handler.is_none()
            && !sasl_mechanism.eq_ignore_ascii_case("EXTERNAL")
        {
            return Err(ClientError::InvalidConfiguration(format!(
                "authentication with {} requires a username or a callback handler",
                sasl_mechanism
            )));
        }

        Ok(AuthenticationConfiguration {
            enabled,
            username: self.username.clone(),
            password: self.password.clone(),
            realm: self.realm.clone().unwrap_or_else(|| DEFAULT_REALM.to_string()),
            server_name: self
                .server_name
                .clone()
                .unwrap_or_else(|| DEFAULT_SERVER_NAME.to_string()),
            client_subject: self.client_subject.clone(),
            callback_handler: self.callback_handler.clone(),
            sasl_mechanism,
        })
    }
}

/// TLS settings being assembled.
#[derive(Debug, Clone, Default)]
pub struct SslBuilder {
    enabled: Option<bool>,
    sni_host_name: Option<String>,
    trust_store_file_name: Option<PathBuf>,
    trust_store_password: Option<String>,
    trust_store_type: Option<String>,
    provider: Option<String>,
    protocol: Option<String>,
    ciphers: Vec<String>,
}

impl SslBuilder {
    /// Explicitly enable or disable TLS.
    ///
    /// Without this, TLS is enabled when a trust store is configured.
    pub fn enable(&mut self, enabled: bool) -> &mut Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn sni_host_name(&mut self, host: impl Into<String>) -> &mut Self {
        self.sni_host_name = Some(host.into());
        self
    }

    pub fn trust_store_file_name(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.trust_store_file_name = Some(path.into());
        self
    }

    pub fn trust_store_password(&mut self, password: impl Into<String>) -> &mut Self {
        self.trust_store_password = Some(password.into());
        self
    }

    pub fn trust_store_type(&mut self, store_type: impl Into<String>) -> &mut Self {
        self.trust_store_type = Some(store_type.into());
        self
    }

    pub fn provider(&mut self, provider: impl Into<String>) -> &mut Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn protocol(&mut self, protocol: impl Into<String>) -> &mut Self {
        self.protocol = Some(protocol.into());
        self
    }

    pub fn ciphers<I, S>(&mut self, ciphers: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ciphers = ciphers.into_iter().map(Into::into).collect();
        self
    }

    fn build(&self) -> SslConfiguration {
        SslConfiguration {
            enabled: self
                .enabled
                .unwrap_or(self.trust_store_file_name.is_some()),
            sni_host_name: self.sni_host_name.clone(),
            trust_store_file_name: self.trust_store_file_name.clone(),
            trust_store_password: self.trust_store_password.clone(),
            trust_store_type: self.trust_store_type.clone(),
            provider: self.provider.clone(),
            protocol: self.protocol.clone(),
            ciphers: self.ciphers.clone(),
        }
    }
}

/// Authentication and TLS.
#[derive(Debug, Clone, Default)]
pub struct SecurityBuilder {
    authentication: AuthenticationBuilder,
    ssl: SslBuilder,
}

impl SecurityBuilder {
    pub fn authentication(&mut self) -> &mut AuthenticationBuilder {
        &mut self.authentication
    }

    pub fn ssl(&mut self) -> &mut SslBuilder {
        &mut self.ssl
    }
}

/// Settings for one named remote cache.
#[derive(Debug, Clone, Default)]
pub struct RemoteCacheConfigurationBuilder {
    configuration: Option<String>,
    configuration_uri: Option<PathBuf>,
    template_name: Option<String>,
    near_cache_mode: Option<NearCacheMode>,
    near_cache_max_entries: Option<i64>,
    near_cache_use_bloom_filter: Option<bool>,
}

impl RemoteCacheConfigurationBuilder {
    /// Inline declarative definition used when the cache is created.
    pub fn configuration(&mut self, definition: impl Into<String>) -> &mut Self {
        self.configuration = Some(definition.into());
        self
    }

    /// Load the declarative definition from a file.
    ///
    /// The file is read immediately; its contents replace any inline
    /// definition.
    pub fn configuration_uri(&mut self, path: impl AsRef<Path>) -> std::io::Result<&mut Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        self.configuration = Some(contents);
        self.configuration_uri = Some(path.to_path_buf());
        Ok(self)
    }

    pub fn template_name(&mut self, template: impl Into<String>) -> &mut Self {
        self.template_name = Some(template.into());
        self
    }

    pub fn near_cache_mode(&mut self, mode: NearCacheMode) -> &mut Self {
        self.near_cache_mode = Some(mode);
        self
    }

    pub fn near_cache_max_entries(&mut self, max_entries: i64) -> &mut Self {
        self.near_cache_max_entries = Some(max_entries);
        self
    }

    pub fn near_cache_use_bloom_filter(&mut self, enabled: bool) -> &mut Self {
        self.near_cache_use_bloom_filter = Some(enabled);
        self
    }

    fn build(&self, name: &str) -> ClientResult<RemoteCacheConfiguration> {
        let max_entries = self.near_cache_max_entries.unwrap_or(UNBOUNDED_NEAR_CACHE);
        let bloom = self.near_cache_use_bloom_filter.unwrap_or(false);
        if bloom && max_entries <= 0 {
            return Err(ClientError::InvalidConfiguration(format!(
                "near cache bloom filter for cache {} requires a positive near cache max entries",
                name
            )));
        }

        Ok(RemoteCacheConfiguration {
            name: name.to_string(),
            configuration: self.configuration.clone(),
            configuration_uri: self.configuration_uri.clone(),
            template_name: self.template_name.clone(),
            near_cache_mode: self.near_cache_mode.unwrap_or_default(),
            near_cache_max_entries: max_entries,
            near_cache_use_bloom_filter: bloom,
        })
    }
}

/// Builder for [`Configuration`].
#[derive(Debug, Clone)]
pub struct ConfigurationBuilder {
    servers: Vec<ServerAddress>,
    marshaller: Option<Arc<dyn Marshaller>>,
    security: SecurityBuilder,
    client_intelligence: ClientIntelligence,
    tracing_propagation_enabled: bool,
    connect_timeout_ms: u64,
    socket_timeout_ms: u64,
    max_retries: u32,
    tcp_no_delay: bool,
    tcp_keep_alive: bool,
    remote_caches: BTreeMap<String, RemoteCacheConfigurationBuilder>,
    properties: Properties,
}

impl Default for ConfigurationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigurationBuilder {
    pub fn new() -> Self {
        Self {
            servers: Vec::new(),
            marshaller: None,
            security: SecurityBuilder::default(),
            client_intelligence: ClientIntelligence::default(),
            tracing_propagation_enabled: true,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            socket_timeout_ms: DEFAULT_SOCKET_TIMEOUT_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            tcp_no_delay: true,
            tcp_keep_alive: false,
            remote_caches: BTreeMap::new(),
            properties: Properties::new(),
        }
    }

    pub fn add_server(&mut self, host: impl Into<String>, port: u16) -> &mut Self {
        self.servers.push(ServerAddress::new(host, port));
        self
    }

    /// Append every address of a `;`-separated server list.
    pub fn add_servers(&mut self, server_list: &str) -> ClientResult<&mut Self> {
        let servers = parse_server_list(server_list)?;
        self.servers.extend(servers);
        Ok(self)
    }

    pub fn clear_servers(&mut self) -> &mut Self {
        self.servers.clear();
        self
    }

    pub fn servers(&self) -> &[ServerAddress] {
        &self.servers
    }

    /// Configure servers, credentials and extra properties from a Hot Rod URI.
    ///
    /// Replaces any servers configured so far.
    pub fn uri(&mut self, uri: &str) -> ClientResult<&mut Self> {
        let parsed: HotRodUri = uri.parse()?;

        self.servers = parsed.servers;
        if parsed.ssl {
            self.security.ssl.enable(true);
        }
        if let Some(user) = parsed.username {
            self.security.authentication.username(user);
        }
        if let Some(password) = parsed.password {
            self.security.authentication.password(password);
        }
        for (key, value) in &parsed.properties {
            self.apply_property(key, value)?;
        }
        Ok(self)
    }

    pub fn marshaller(&mut self, marshaller: Arc<dyn Marshaller>) -> &mut Self {
        self.marshaller = Some(marshaller);
        self
    }

    pub fn security(&mut self) -> &mut SecurityBuilder {
        &mut self.security
    }

    pub fn client_intelligence(&mut self, intelligence: ClientIntelligence) -> &mut Self {
        self.client_intelligence = intelligence;
        self
    }

    pub fn tracing_propagation_enabled(&mut self, enabled: bool) -> &mut Self {
        self.tracing_propagation_enabled = enabled;
        self
    }

    pub fn connect_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn socket_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.socket_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn max_retries(&mut self, retries: u32) -> &mut Self {
        self.max_retries = retries;
        self
    }

    pub fn tcp_no_delay(&mut self, enabled: bool) -> &mut Self {
        self.tcp_no_delay = enabled;
        self
    }

    pub fn tcp_keep_alive(&mut self, enabled: bool) -> &mut Self {
        self.tcp_keep_alive = enabled;
        self
    }

    /// Settings for a named cache, created on first access.
    pub fn remote_cache(&mut self, name: &str) -> &mut RemoteCacheConfigurationBuilder {
        self.remote_caches.entry(name.to_string()).or_default()
    }

    /// Property bag applied so far.
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Apply every recognised property in `properties`.
    ///
    /// A URI takes the place of the server list. Unknown keys and schema
    /// files are kept on the configuration but otherwise ignored.
    pub fn with_properties(&mut self, properties: &Properties) -> ClientResult<&mut Self> {
        if let Some(uri) = properties.get(keys::URI) {
            self.uri(uri)?;
        } else if let Some(list) = properties.get(keys::SERVER_LIST) {
            self.servers = parse_server_list(list)?;
        }

        for (key, value) in properties {
            if key == keys::URI || key == keys::SERVER_LIST {
                continue;
            }
            self.apply_property(key, value)?;
        }

        self.properties.extend(properties.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(self)
    }

    fn apply_property(&mut self, key: &str, value: &str) -> ClientResult<()> {
        let single: Properties = [(key, value)].into_iter().collect();
        let flag = || -> ClientResult<bool> {
            single
                .get_bool(key)
                .map(|v| v.unwrap_or_default())
        };
        let auth = &mut self.security.authentication;
        let ssl = &mut self.security.ssl;

        match key {
            keys::MARSHALLER => {
                if self.marshaller.is_none() {
                    self.marshaller = Some(marshaller_by_name(key, value)?);
                }
            }
            keys::CLIENT_INTELLIGENCE => {
                self.client_intelligence =
                    single.get_parsed(key)?.unwrap_or_default();
            }
            keys::TRACING_PROPAGATION_ENABLED => self.tracing_propagation_enabled = flag()?,
            keys::USE_AUTH => {
                auth.enable(flag()?);
            }
            keys::AUTH_USERNAME => {
                auth.username(value);
            }
            keys::AUTH_PASSWORD => {
                auth.password(value);
            }
            keys::AUTH_REALM => {
                auth.realm(value);
            }
            keys::AUTH_SERVER_NAME => {
                auth.server_name(value);
            }
            keys::AUTH_CLIENT_SUBJECT => {
                auth.client_subject(value);
            }
            keys::AUTH_CALLBACK_HANDLER => {
                auth.callback_handler(value);
            }
            keys::SASL_MECHANISM => {
                auth.sasl_mechanism(value);
            }
            keys::USE_SSL => {
                ssl.enable(flag()?);
            }
            keys::SNI_HOST_NAME => {
                ssl.sni_host_name(value);
            }
            keys::TRUST_STORE_FILE_NAME => {
                ssl.trust_store_file_name(value);
            }
            keys::TRUST_STORE_PASSWORD => {
                ssl.trust_store_password(value);
            }
            keys::TRUST_STORE_TYPE => {
                ssl.trust_store_type(value);
            }
            keys::SSL_PROVIDER => {
                ssl.provider(value);
            }
            keys::SSL_PROTOCOL => {
                ssl.protocol(value);
            }
            keys::SSL_CIPHERS => {
                ssl.ciphers(value.split_whitespace());
            }
            keys::CONNECT_TIMEOUT => {
                self.connect_timeout_ms = single.get_parsed(key)?.unwrap_or_default();
            }
            keys::SOCKET_TIMEOUT => {
                self.socket_timeout_ms = single.get_parsed(key)?.unwrap_or_default();
            }
            keys::MAX_RETRIES => {
                self.max_retries = single.get_parsed(key)?.unwrap_or_default();
            }
            keys::TCP_NO_DELAY => self.tcp_no_delay = flag()?,
            keys::TCP_KEEP_ALIVE => self.tcp_keep_alive = flag()?,
            _ if key.starts_with(PROTOBUF_FILE_PREFIX) => {}
            _ => {
                if let Some(rest) = key.strip_prefix(keys::CACHE_PREFIX) {
                    self.apply_cache_property(key, rest, value)?;
                }
            }
        }
        Ok(())
    }

    fn apply_cache_property(&mut self, key: &str, rest: &str, value: &str) -> ClientResult<()> {
        let Some((cache, setting)) = CACHE_SETTINGS.iter().find_map(|setting| {
            rest.strip_suffix(setting)
                .and_then(|prefix| prefix.strip_suffix('.'))
                .filter(|name| !name.is_empty())
                .map(|name| (name, *setting))
        }) else {
            return Ok(());
        };

        let single: Properties = [(key, value)].into_iter().collect();
        let builder = self.remote_cache(cache);
        match setting {
            "configuration" => {
                builder.configuration(value);
            }
            "configuration_uri" => {
                builder.configuration_uri(value).map_err(|source| {
                    ClientError::CacheConfigurationResource {
                        cache: cache.to_string(),
                        path: PathBuf::from(value),
                        source,
                    }
                })?;
            }
            "template_name" => {
                builder.template_name(value);
            }
            "near_cache.mode" => {
                builder.near_cache_mode(single.get_parsed(key)?.unwrap_or_default());
            }
            "near_cache.max_entries" => {
                builder.near_cache_max_entries(
                    single.get_parsed(key)?.unwrap_or(UNBOUNDED_NEAR_CACHE),
                );
            }
            "near_cache.use_bloom_filter" => {
                builder.near_cache_use_bloom_filter(single.get_bool(key)?.unwrap_or(false));
            }
            _ => {}
        }
        Ok(())
    }

    /// Validate and freeze the configuration.
    pub fn build(&self) -> ClientResult<Configuration> {
        let remote_caches = self
            .remote_caches
            .iter()
            .map(|(name, builder)| builder.build(name).map(|c| (name.clone(), c)))
            .collect::<ClientResult<BTreeMap<_, _>>>()?;

        Ok(Configuration {
            servers: self.servers.clone(),
            marshaller: self.marshaller.clone(),
            security: SecurityConfiguration {
                authentication: self.security.authentication.build()?,
                ssl: self.security.ssl.build(),
            },
            client_intelligence: self.client_intelligence,
            tracing_propagation_enabled: self.tracing_propagation_enabled,
            connect_timeout_ms: self.connect_timeout_ms,
            socket_timeout_ms: self.socket_timeout_ms,
            max_retries: self.max_retries,
            tcp_no_delay: self.tcp_no_delay,
            tcp_keep_alive: self.tcp_keep_alive,
            remote_caches,
            properties: self.properties.clone(),
        })
    }
}

/// Resolve the marshaller named by the `marshaller` property.
fn marshaller_by_name(key: &str, name: &str) -> ClientResult<Arc<dyn Marshaller>> {
    let lower = name.to_ascii_lowercase();
    if lower.contains("protostream") {
        Ok(Arc::new(ProtoStreamMarshaller::new()))
    } else if lower.contains("utf8") {
        Ok(Arc::new(Utf8Marshaller))
    } else {
        Err(ClientError::InvalidProperty {
            key: key.to_string(),
            value: name.to_string(),
            reason: "unknown marshaller".to_string(),
        })
    }
}
