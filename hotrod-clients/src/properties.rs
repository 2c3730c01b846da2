//! Flat client property bag.
//!
//! `Properties` is the string-keyed bag a client is configured from. The
//! well-known keys live in [`keys`]; any key starting with
//! [`PROTOBUF_FILE_PREFIX`] names an embedded schema file whose value is the
//! file's text. That prefix is the contract between schema registration and
//! the server-side schema push.

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::{ClientError, ClientResult};

/// Prefix of keys that carry an embedded `.proto` file.
pub const PROTOBUF_FILE_PREFIX: &str = "infinispan.client.hotrod.protofile.";

/// Well-known client property names.
pub mod keys {
    /// Common prefix of every client property.
    pub const PREFIX: &str = "infinispan.client.hotrod.";

    pub const URI: &str = "infinispan.client.hotrod.uri";
    pub const SERVER_LIST: &str = "infinispan.client.hotrod.server_list";
    pub const MARSHALLER: &str = "infinispan.client.hotrod.marshaller";
    pub const CLIENT_INTELLIGENCE: &str = "infinispan.client.hotrod.client_intelligence";
    pub const TRACING_PROPAGATION_ENABLED: &str =
        "infinispan.client.hotrod.tracing.propagation_enabled";

    pub const USE_AUTH: &str = "infinispan.client.hotrod.use_auth";
    pub const AUTH_USERNAME: &str = "infinispan.client.hotrod.auth_username";
    pub const AUTH_PASSWORD: &str = "infinispan.client.hotrod.auth_password";
    pub const AUTH_REALM: &str = "infinispan.client.hotrod.auth_realm";
    pub const AUTH_SERVER_NAME: &str = "infinispan.client.hotrod.auth_server_name";
    pub const AUTH_CLIENT_SUBJECT: &str = "infinispan.client.hotrod.auth_client_subject";
    pub const AUTH_CALLBACK_HANDLER: &str = "infinispan.client.hotrod.auth_callback_handler";
    pub const SASL_MECHANISM: &str = "infinispan.client.hotrod.sasl_mechanism";

    pub const USE_SSL: &str = "infinispan.client.hotrod.use_ssl";
    pub const SNI_HOST_NAME: &str = "infinispan.client.hotrod.sni_host_name";
    pub const TRUST_STORE_FILE_NAME: &str = "infinispan.client.hotrod.trust_store_file_name";
    pub const TRUST_STORE_PASSWORD: &str = "infinispan.client.hotrod.trust_store_password";
    pub const TRUST_STORE_TYPE: &str = "infinispan.client.hotrod.trust_store_type";
    pub const SSL_PROVIDER: &str = "infinispan.client.hotrod.ssl_provider";
    pub const SSL_PROTOCOL: &str = "infinispan.client.hotrod.ssl_protocol";
    pub const SSL_CIPHERS: &str = "infinispan.client.hotrod.ssl_ciphers";

    pub const CONNECT_TIMEOUT: &str = "infinispan.client.hotrod.connect_timeout";
    pub const SOCKET_TIMEOUT: &str = "infinispan.client.hotrod.socket_timeout";
    pub const MAX_RETRIES: &str = "infinispan.client.hotrod.max_retries";
    pub const TCP_NO_DELAY: &str = "infinispan.client.hotrod.tcp_no_delay";
    pub const TCP_KEEP_ALIVE: &str = "infinispan.client.hotrod.tcp_keep_alive";

    /// Prefix of per-cache keys: `infinispan.client.hotrod.cache.<name>.<setting>`.
    pub const CACHE_PREFIX: &str = "infinispan.client.hotrod.cache.";
}

/// Ordered string property bag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: BTreeMap<String, String>,
}

impl Properties {
    /// Create an empty property bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a property value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Set a property, returning the previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    /// Remove a property, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterate over all entries in key order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.entries.iter()
    }

    /// Parse a boolean property.
    ///
    /// Accepts `true`/`false` in any case. Returns `Ok(None)` when the key
    /// is absent.
    pub fn get_bool(&self, key: &str) -> ClientResult<Option<bool>> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(Some(true)),
                "false" => Ok(Some(false)),
                _ => Err(ClientError::InvalidProperty {
                    key: key.to_string(),
                    value: raw.to_string(),
                    reason: "expected true or false".to_string(),
                }),
            },
        }
    }

    /// Parse a property with `FromStr`.
    pub fn get_parsed<T>(&self, key: &str) -> ClientResult<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|e| ClientError::InvalidProperty {
                    key: key.to_string(),
                    value: raw.to_string(),
                    reason: e.to_string(),
                }),
        }
    }

    /// Store a schema file under the reserved prefix.
    pub fn insert_schema_file(&mut self, file_name: &str, contents: impl Into<String>) {
        self.entries
            .insert(format!("{}{}", PROTOBUF_FILE_PREFIX, file_name), contents.into());
    }

    /// Iterate over embedded schema files as `(file name, contents)`.
    pub fn schema_files(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().filter_map(|(key, value)| {
            key.strip_prefix(PROTOBUF_FILE_PREFIX)
                .map(|name| (name, value.as_str()))
        })
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for Properties {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.entries.insert(k.into(), v.into());
        }
    }
}

impl<'a> IntoIterator for &'a Properties {
    type Item = (&'a String, &'a String);
    type IntoIter = btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_returns_previous_value() {
        let mut props = Properties::new();
        assert!(props.set(keys::SERVER_LIST, "a:1").is_none());
        assert_eq!(props.set(keys::SERVER_LIST, "b:2").as_deref(), Some("a:1"));
        assert_eq!(props.get(keys::SERVER_LIST), Some("b:2"));
    }

    #[test]
    fn test_get_bool() {
        let props: Properties = [(keys::USE_AUTH, "TRUE"), (keys::USE_SSL, "nope")]
            .into_iter()
            .collect();

        assert_eq!(props.get_bool(keys::USE_AUTH).unwrap(), Some(true));
        assert_eq!(props.get_bool(keys::TCP_NO_DELAY).unwrap(), None);
        assert!(matches!(
            props.get_bool(keys::USE_SSL),
            Err(ClientError::InvalidProperty { .. })
        ));
    }

    #[test]
    fn test_get_parsed_reports_key() {
        let props: Properties = [(keys::CONNECT_TIMEOUT, "soon")].into_iter().collect();
        let err = props.get_parsed::<u64>(keys::CONNECT_TIMEOUT).unwrap_err();
        assert!(err.to_string().contains("connect_timeout"));
    }

    #[test]
    fn test_schema_files_only_yields_prefixed_keys() {
        let mut props = Properties::new();
        props.set(keys::SERVER_LIST, "localhost");
        props.insert_schema_file("library.proto", "package library;");

        let files: Vec<_> = props.schema_files().collect();
        assert_eq!(files, vec![("library.proto", "package library;")]);
        assert!(props.contains_key("infinispan.client.hotrod.protofile.library.proto"));
    }
}
