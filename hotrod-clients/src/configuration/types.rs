//! Built client configuration types.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use regex::Regex;
use serde::{Serialize, Serializer};

use crate::error::{ClientError, ClientResult};
use crate::marshall::Marshaller;
use crate::properties::Properties;

/// Port used when a server address does not name one.
pub const DEFAULT_PORT: u16 = 11222;

/// SASL mechanism used when authentication is enabled without one.
pub const DEFAULT_SASL_MECHANISM: &str = "SCRAM-SHA-512";

/// Realm used when authentication is enabled without one.
pub const DEFAULT_REALM: &str = "default";

/// Server name used when authentication is enabled without one.
pub const DEFAULT_SERVER_NAME: &str = "infinispan";

/// Near-cache size meaning "unbounded".
pub const UNBOUNDED_NEAR_CACHE: i64 = -1;

/// One `host:port` entry of a server list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerAddress {
    pub host: String,
    pub port: u16,
}

/// `host`, `host:port`, `[v6]` or `[v6]:port`.
fn address_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:\[([0-9A-Fa-f:.]+)\]|([A-Za-z0-9._\-]+))(?::(\d{1,5}))?$").unwrap()
    })
}

impl ServerAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse a single server address, defaulting the port to [`DEFAULT_PORT`].
    pub fn parse(raw: &str) -> ClientResult<Self> {
        let trimmed = raw.trim();
        let invalid = || ClientError::InvalidServerAddress(trimmed.to_string());

        let captures = address_pattern().captures(trimmed).ok_or_else(invalid)?;
        let host = captures
            .get(1)
            .or_else(|| captures.get(2))
            .ok_or_else(invalid)?
            .as_str();

        let port = match captures.get(3) {
            Some(p) => match p.as_str().parse::<u16>() {
                Ok(0) | Err(_) => return Err(invalid()),
                Ok(port) => port,
            },
            None => DEFAULT_PORT,
        };

        Ok(Self::new(host, port))
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl Serialize for ServerAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Parse a server list: addresses separated by `;` or `,`.
///
/// Empty entries are skipped, so an empty string yields an empty list.
pub fn parse_server_list(raw: &str) -> ClientResult<Vec<ServerAddress>> {
    raw.split([';', ','])
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(ServerAddress::parse)
        .collect()
}

/// How much cluster topology the client tracks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientIntelligence {
    /// Talk to the configured servers only.
    Basic,
    /// Follow cluster membership changes.
    TopologyAware,
    /// Route each key to its owner.
    #[default]
    HashDistributionAware,
}

impl FromStr for ClientIntelligence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "BASIC" => Ok(Self::Basic),
            "TOPOLOGY_AWARE" => Ok(Self::TopologyAware),
            "HASH_DISTRIBUTION_AWARE" => Ok(Self::HashDistributionAware),
            other => Err(format!(
                "unknown client intelligence '{}' (expected BASIC, TOPOLOGY_AWARE or HASH_DISTRIBUTION_AWARE)",
                other
            )),
        }
    }
}

impl fmt::Display for ClientIntelligence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Basic => "BASIC",
            Self::TopologyAware => "TOPOLOGY_AWARE",
            Self::HashDistributionAware => "HASH_DISTRIBUTION_AWARE",
        };
        f.write_str(name)
    }
}

/// Near-cache behaviour for a remote cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NearCacheMode {
    #[default]
    Disabled,
    /// Local copies invalidated by server events.
    Invalidated,
}

impl FromStr for NearCacheMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DISABLED" => Ok(Self::Disabled),
            "INVALIDATED" => Ok(Self::Invalidated),
            other => Err(format!(
                "unknown near cache mode '{}' (expected DISABLED or INVALIDATED)",
                other
            )),
        }
    }
}

impl fmt::Display for NearCacheMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => f.write_str("DISABLED"),
            Self::Invalidated => f.write_str("INVALIDATED"),
        }
    }
}

/// SASL authentication settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticationConfiguration {
    pub enabled: bool,
    pub username: Option<String>,
    #[serde(skip)]
    pub password: Option<String>,
    pub realm: String,
    pub server_name: String,
    pub client_subject: Option<String>,
    pub callback_handler: Option<String>,
    pub sasl_mechanism: String,
}

/// TLS settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SslConfiguration {
    pub enabled: bool,
    pub sni_host_name: Option<String>,
    pub trust_store_file_name: Option<PathBuf>,
    #[serde(skip)]
    pub trust_store_password: Option<String>,
    pub trust_store_type: Option<String>,
    pub provider: Option<String>,
    pub protocol: Option<String>,
    pub ciphers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityConfiguration {
    pub authentication: AuthenticationConfiguration,
    pub ssl: SslConfiguration,
}

/// Per-cache client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteCacheConfiguration {
    pub name: String,
    /// Declarative definition used when the cache is created on demand.
    pub configuration: Option<String>,
    /// File the definition was loaded from.
    pub configuration_uri: Option<PathBuf>,
    pub template_name: Option<String>,
    pub near_cache_mode: NearCacheMode,
    /// [`UNBOUNDED_NEAR_CACHE`] for no limit.
    pub near_cache_max_entries: i64,
    pub near_cache_use_bloom_filter: bool,
}

/// Immutable client configuration handed to a
/// [`ClientFactory`](crate::client::ClientFactory).
///
/// Built by [`ConfigurationBuilder`](super::ConfigurationBuilder). Secrets and
/// the marshaller instance are skipped when serialized.
#[derive(Debug, Clone, Serialize)]
pub struct Configuration {
    pub(super) servers: Vec<ServerAddress>,
    #[serde(rename = "marshaller", serialize_with = "serialize_marshaller")]
    pub(super) marshaller: Option<Arc<dyn Marshaller>>,
    pub(super) security: SecurityConfiguration,
    pub(super) client_intelligence: ClientIntelligence,
    pub(super) tracing_propagation_enabled: bool,
    pub(super) connect_timeout_ms: u64,
    pub(super) socket_timeout_ms: u64,
    pub(super) max_retries: u32,
    pub(super) tcp_no_delay: bool,
    pub(super) tcp_keep_alive: bool,
    pub(super) remote_caches: BTreeMap<String, RemoteCacheConfiguration>,
    #[serde(skip)]
    pub(super) properties: Properties,
}

fn serialize_marshaller<S: Serializer>(
    marshaller: &Option<Arc<dyn Marshaller>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match marshaller {
        Some(m) => serializer.serialize_some(m.media_type()),
        None => serializer.serialize_none(),
    }
}

impl Configuration {
    pub fn servers(&self) -> &[ServerAddress] {
        &self.servers
    }

    /// Servers formatted as a `;`-separated list.
    pub fn server_list(&self) -> String {
        self.servers
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(";")
    }

    pub fn marshaller(&self) -> Option<&Arc<dyn Marshaller>> {
        self.marshaller.as_ref()
    }

    pub fn security(&self) -> &SecurityConfiguration {
        &self.security
    }

    pub fn authentication(&self) -> &AuthenticationConfiguration {
        &self.security.authentication
    }

    pub fn ssl(&self) -> &SslConfiguration {
        &self.security.ssl
    }

    pub fn client_intelligence(&self) -> ClientIntelligence {
        self.client_intelligence
    }

    pub fn tracing_propagation_enabled(&self) -> bool {
        self.tracing_propagation_enabled
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn socket_timeout(&self) -> Duration {
        Duration::from_millis(self.socket_timeout_ms)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn tcp_no_delay(&self) -> bool {
        self.tcp_no_delay
    }

    pub fn tcp_keep_alive(&self) -> bool {
        self.tcp_keep_alive
    }

    pub fn remote_caches(&self) -> &BTreeMap<String, RemoteCacheConfiguration> {
        &self.remote_caches
    }

    pub fn remote_cache(&self, name: &str) -> Option<&RemoteCacheConfiguration> {
        self.remote_caches.get(name)
    }

    /// Full property bag the configuration was built from, schema files included.
    pub fn properties(&self) -> &Properties {
        &self.properties
    }
}
