//! INI configuration file loading.
//!
//! Section layout:
//!
//! | Section                               | Meaning                                  |
//! |---------------------------------------|------------------------------------------|
//! | `[infinispan-client]`                 | default client runtime + global keys     |
//! | `[infinispan-client.cache.C]`         | cache `C` of the default client          |
//! | `[infinispan-client.N]`               | runtime settings of client `N`           |
//! | `[infinispan-client.N.cache.C]`       | cache `C` of client `N`                  |
//! | `[hotrod-client]`                     | raw property bag of the default client   |
//! | `[hotrod-client.N]`                   | raw property bag of client `N`           |

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ini::{Ini, ParseOption};
use tracing::{debug, warn};

use super::error::ConfigError;
use super::runtime::{ClientRuntimeConfig, ClientsSettings, RemoteCacheConfig};
use crate::registry::DEFAULT_CLIENT_NAME;

const CLIENT_SECTION: &str = "infinispan-client";
const PROPERTIES_SECTION: &str = "hotrod-client";
const CACHE_SEGMENT: &str = "cache.";
const USE_SCHEMA_REGISTRATION: &str = "use-schema-registration";

/// Default location of the clients configuration file.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("hotrod-clients").join("clients.ini"))
}

/// Where a section's keys go.
#[derive(Debug, PartialEq, Eq)]
enum SectionTarget<'a> {
    Client(&'a str),
    Cache { client: &'a str, cache: &'a str },
    Properties(&'a str),
}

fn classify(section: &str) -> Option<SectionTarget<'_>> {
    if section == PROPERTIES_SECTION {
        return Some(SectionTarget::Properties(DEFAULT_CLIENT_NAME));
    }
    if let Some(name) = section
        .strip_prefix(PROPERTIES_SECTION)
        .and_then(|rest| rest.strip_prefix('.'))
    {
        return (!name.is_empty()).then_some(SectionTarget::Properties(name));
    }

    if section == CLIENT_SECTION {
        return Some(SectionTarget::Client(DEFAULT_CLIENT_NAME));
    }
    let rest = section
        .strip_prefix(CLIENT_SECTION)
        .and_then(|rest| rest.strip_prefix('.'))?;

    if let Some(cache) = rest.strip_prefix(CACHE_SEGMENT) {
        return (!cache.is_empty()).then_some(SectionTarget::Cache {
            client: DEFAULT_CLIENT_NAME,
            cache,
        });
    }
    match rest.split_once(".cache.") {
        Some((client, cache)) if !client.is_empty() && !cache.is_empty() => {
            Some(SectionTarget::Cache { client, cache })
        }
        Some(_) => None,
        None => (!rest.is_empty()).then_some(SectionTarget::Client(rest)),
    }
}

impl ClientsSettings {
    /// Load settings from an INI file.
    ///
    /// Relative cache configuration URIs resolve against the file's
    /// directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;

        let resource_dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let settings = Self::from_ini_str(&text, resource_dir)?;
        debug!(
            path = %path.display(),
            clients = settings.client_names().len(),
            "Loaded clients configuration"
        );
        Ok(settings)
    }

    /// Parse settings from INI text.
    pub fn from_ini_str(text: &str, resource_dir: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let options = ParseOption {
            enabled_escape: false,
            ..ParseOption::default()
        };
        let ini =
            Ini::load_from_str_opt(text, options).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let mut settings = ClientsSettings::new().with_resource_dir(resource_dir);

        for (section, entries) in ini.iter() {
            let Some(section) = section else {
                if entries.iter().next().is_some() {
                    return Err(ConfigError::Parse(
                        "keys must appear inside a section".to_string(),
                    ));
                }
                continue;
            };

            let target =
                classify(section).ok_or_else(|| ConfigError::InvalidSection(section.to_string()))?;

            match target {
                SectionTarget::Properties(client) => {
                    let definition = settings.definition_mut(client);
                    for (key, value) in entries.iter() {
                        definition.properties.set(key, value);
                    }
                }
                SectionTarget::Client(client) => {
                    let runtime = settings
                        .runtime
                        .clients
                        .entry(client.to_string())
                        .or_default();
                    for (key, value) in entries.iter() {
                        if key == USE_SCHEMA_REGISTRATION && client == DEFAULT_CLIENT_NAME {
                            settings.runtime.use_schema_registration =
                                Some(parse_flag(section, key, value)?);
                        } else {
                            apply_client_key(runtime, section, key, value)?;
                        }
                    }
                }
                SectionTarget::Cache { client, cache } => {
                    let cache_config = settings
                        .runtime
                        .clients
                        .entry(client.to_string())
                        .or_default()
                        .cache
                        .entry(cache.to_string())
                        .or_default();
                    for (key, value) in entries.iter() {
                        apply_cache_key(cache_config, section, key, value)?;
                    }
                }
            }
        }

        Ok(settings)
    }
}

fn apply_client_key(
    runtime: &mut ClientRuntimeConfig,
    section: &str,
    key: &str,
    value: &str,
) -> Result<(), ConfigError> {
    let text = Some(value.to_string());
    match key {
        "uri" => runtime.uri = text,
        "hosts" => runtime.hosts = text,
        "server-list" => runtime.server_list = text,
        "username" => runtime.username = text,
        "auth-username" => runtime.auth_username = text,
        "password" => runtime.password = text,
        "auth-password" => runtime.auth_password = text,
        "use-auth" => runtime.use_auth = Some(parse_flag(section, key, value)?),
        "auth-realm" => runtime.auth_realm = text,
        "auth-server-name" => runtime.auth_server_name = text,
        "auth-client-subject" => runtime.auth_client_subject = text,
        "auth-callback-handler" => runtime.auth_callback_handler = text,
        "sasl-mechanism" => runtime.sasl_mechanism = text,
        "trust-store" => runtime.trust_store = Some(PathBuf::from(value)),
        "trust-store-password" => runtime.trust_store_password = text,
        "trust-store-type" => runtime.trust_store_type = text,
        "ssl-provider" => runtime.ssl_provider = text,
        "ssl-protocol" => runtime.ssl_protocol = text,
        "ssl-ciphers" => {
            runtime.ssl_ciphers = value
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect();
        }
        "client-intelligence" => {
            runtime.client_intelligence = Some(parse_value(section, key, value)?)
        }
        "tracing-propagation-enabled" => {
            runtime.tracing_propagation_enabled = parse_flag(section, key, value)?
        }
        _ => warn!(section, key, "Ignoring unknown client setting"),
    }
    Ok(())
}

fn apply_cache_key(
    cache: &mut RemoteCacheConfig,
    section: &str,
    key: &str,
    value: &str,
) -> Result<(), ConfigError> {
    match key {
        "configuration-uri" => cache.configuration_uri = Some(PathBuf::from(value)),
        "configuration" => cache.configuration = Some(value.to_string()),
        "near-cache-max-entries" => {
            cache.near_cache_max_entries = Some(parse_value(section, key, value)?)
        }
        "near-cache-mode" => cache.near_cache_mode = Some(parse_value(section, key, value)?),
        "near-cache-use-bloom-filter" => {
            cache.near_cache_use_bloom_filter = Some(parse_flag(section, key, value)?)
        }
        _ => warn!(section, key, "Ignoring unknown cache setting"),
    }
    Ok(())
}

fn parse_value<T>(section: &str, key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse::<T>().map_err(|e| ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_flag(section: &str, key: &str, value: &str) -> Result<bool, ConfigError> {
    parse_value(section, key, &value.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::{ClientIntelligence, NearCacheMode};

    const SAMPLE: &str = r#"
[infinispan-client]
hosts = localhost:11222
use-schema-registration = false
username = app

[infinispan-client.cache.books]
near-cache-mode = INVALIDATED
near-cache-max-entries = 1000

[infinispan-client.site-lon]
hosts = lon-1:11222;lon-2:11222
client-intelligence = BASIC
ssl-ciphers = TLS_AES_128_GCM_SHA256, TLS_AES_256_GCM_SHA384

[infinispan-client.site-lon.cache.orders.v2]
configuration-uri = orders.xml

[hotrod-client]
infinispan.client.hotrod.connect_timeout = 5000

[hotrod-client.site-nyc]
infinispan.client.hotrod.server_list = nyc:11222
"#;

    #[test]
    fn test_classify_sections() {
        assert_eq!(
            classify("infinispan-client"),
            Some(SectionTarget::Client(DEFAULT_CLIENT_NAME))
        );
        assert_eq!(
            classify("infinispan-client.cache.books"),
            Some(SectionTarget::Cache {
                client: DEFAULT_CLIENT_NAME,
                cache: "books"
            })
        );
        assert_eq!(
            classify("infinispan-client.a.cache.b"),
            Some(SectionTarget::Cache {
                client: "a",
                cache: "b"
            })
        );
        assert_eq!(
            classify("hotrod-client.a"),
            Some(SectionTarget::Properties("a"))
        );
        assert_eq!(classify("infinispan-clients"), None);
        assert_eq!(classify("infinispan-client."), None);
        assert_eq!(classify("server"), None);
    }

    #[test]
    fn test_from_ini_str() {
        let settings = ClientsSettings::from_ini_str(SAMPLE, "/srv/app").unwrap();

        assert_eq!(settings.runtime.use_schema_registration, Some(false));
        assert_eq!(settings.runtime.resource_dir, PathBuf::from("/srv/app"));

        let default = settings.runtime_config(DEFAULT_CLIENT_NAME).unwrap();
        assert_eq!(default.hosts.as_deref(), Some("localhost:11222"));
        assert_eq!(default.username.as_deref(), Some("app"));
        let books = &default.cache["books"];
        assert_eq!(books.near_cache_mode, Some(NearCacheMode::Invalidated));
        assert_eq!(books.near_cache_max_entries, Some(1000));

        let lon = settings.runtime_config("site-lon").unwrap();
        assert_eq!(lon.client_intelligence, Some(ClientIntelligence::Basic));
        assert_eq!(lon.ssl_ciphers.len(), 2);
        assert_eq!(
            lon.cache["orders.v2"].configuration_uri,
            Some(PathBuf::from("orders.xml"))
        );

        let raw = &settings.definition(DEFAULT_CLIENT_NAME).unwrap().properties;
        assert_eq!(raw.get("infinispan.client.hotrod.connect_timeout"), Some("5000"));
        assert!(settings.definition("site-nyc").is_some());
        assert!(settings.runtime_config("site-nyc").is_none());
    }

    #[test]
    fn test_empty_client_section_still_registers_client() {
        let settings = ClientsSettings::from_ini_str("[infinispan-client.empty]\n", ".").unwrap();
        assert!(settings.runtime_config("empty").is_some());
    }

    #[test]
    fn test_invalid_section() {
        let result = ClientsSettings::from_ini_str("[server]\nport = 1\n", ".");
        assert!(matches!(result, Err(ConfigError::InvalidSection(s)) if s == "server"));
    }

    #[test]
    fn test_invalid_value() {
        let result = ClientsSettings::from_ini_str(
            "[infinispan-client]\nuse-auth = maybe\n",
            ".",
        );
        match result {
            Err(ConfigError::InvalidValue { key, .. }) => assert_eq!(key, "use-auth"),
            other => panic!("expected invalid value, got {:?}", other),
        }
    }

    #[test]
    fn test_keys_outside_section_rejected() {
        let result = ClientsSettings::from_ini_str("hosts = a\n", ".");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_uses_file_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clients.ini");
        fs::write(&path, "[infinispan-client]\nhosts = a:1\n").unwrap();

        let settings = ClientsSettings::load(&path).unwrap();
        assert_eq!(settings.runtime.resource_dir, dir.path());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = ClientsSettings::load(dir.path().join("absent.ini"));
        assert!(matches!(result, Err(ConfigError::ReadFailed { .. })));
    }

    #[test]
    fn test_default_config_path_file_name() {
        if let Some(path) = default_config_path() {
            assert!(path.ends_with("hotrod-clients/clients.ini"));
        }
    }
}
