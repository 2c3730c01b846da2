//! Translation of client settings into a [`ConfigurationBuilder`].
//!
//! Runtime settings are written into a copy of the client's property bag
//! under the well-known `infinispan.client.hotrod.*` keys, then the bag is
//! applied to a fresh builder. Per-cache overrides are applied last,
//! directly on the builder.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{ClientDefinition, ClientRuntimeConfig, ClientsRuntimeConfig};
use crate::configuration::ConfigurationBuilder;
use crate::error::{ClientError, ClientResult};
use crate::properties::{keys, Properties};
use crate::schema;

/// A translated client: its builder and the schema files to push.
#[derive(Debug)]
pub struct TranslatedClient {
    pub builder: ConfigurationBuilder,
    pub schema_files: Vec<(String, String)>,
}

/// Build the configuration of client `name`.
///
/// When the definition carries a proto-stream marshaller, its schemas are
/// registered into the marshaller's serialization context first. A missing
/// or unreadable cache configuration file is an error.
pub fn builder_from_properties(
    name: &str,
    definition: &ClientDefinition,
    runtime: &ClientsRuntimeConfig,
) -> ClientResult<TranslatedClient> {
    debug!(client = name, "Translating client configuration");

    let mut properties = definition.properties.clone();
    let mut builder = ConfigurationBuilder::new();

    if let Some(marshaller) = &definition.marshaller {
        if let Some(proto) = marshaller.as_proto_stream() {
            schema::register_with_marshaller(proto, &definition.schemas, &mut properties)?;
        }
        builder.marshaller(Arc::clone(marshaller));
    }

    let client_runtime = runtime.client(name);
    if let Some(client_runtime) = client_runtime {
        write_runtime_properties(name, client_runtime, &mut properties);
    }

    builder.with_properties(&properties)?;

    if let Some(client_runtime) = client_runtime {
        apply_cache_overrides(&mut builder, client_runtime, runtime)?;
    }

    let schema_files = schema::collect_schema_files(&definition.schemas, &properties);
    Ok(TranslatedClient {
        builder,
        schema_files,
    })
}

fn write_runtime_properties(name: &str, runtime: &ClientRuntimeConfig, properties: &mut Properties) {
    if let Some(uri) = &runtime.uri {
        properties.set(keys::URI, uri);
    } else {
        if let Some(server_list) = &runtime.server_list {
            warn!(
                client = name,
                "'server-list' is deprecated, use 'hosts' instead"
            );
            properties.set(keys::SERVER_LIST, server_list);
        }
        if let Some(hosts) = &runtime.hosts {
            properties.set(keys::SERVER_LIST, hosts);
        }
    }

    if let Some(username) = &runtime.auth_username {
        warn!(
            client = name,
            "'auth-username' is deprecated, use 'username' instead"
        );
        properties.set(keys::AUTH_USERNAME, username);
    }
    if let Some(username) = &runtime.username {
        properties.set(keys::AUTH_USERNAME, username);
    }

    if let Some(password) = &runtime.auth_password {
        warn!(
            client = name,
            "'auth-password' is deprecated, use 'password' instead"
        );
        properties.set(keys::AUTH_PASSWORD, password);
    }
    if let Some(password) = &runtime.password {
        properties.set(keys::AUTH_PASSWORD, password);
    }

    properties.set(
        keys::TRACING_PROPAGATION_ENABLED,
        runtime.tracing_propagation_enabled.to_string(),
    );

    let optional = [
        (
            keys::CLIENT_INTELLIGENCE,
            runtime.client_intelligence.map(|i| i.to_string()),
        ),
        (keys::USE_AUTH, runtime.use_auth.map(|b| b.to_string())),
        (keys::AUTH_REALM, runtime.auth_realm.clone()),
        (keys::AUTH_SERVER_NAME, runtime.auth_server_name.clone()),
        (keys::AUTH_CLIENT_SUBJECT, runtime.auth_client_subject.clone()),
        (keys::AUTH_CALLBACK_HANDLER, runtime.auth_callback_handler.clone()),
        (keys::SASL_MECHANISM, runtime.sasl_mechanism.clone()),
        (
            keys::TRUST_STORE_FILE_NAME,
            runtime
                .trust_store
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
        ),
        (keys::TRUST_STORE_PASSWORD, runtime.trust_store_password.clone()),
        (keys::TRUST_STORE_TYPE, runtime.trust_store_type.clone()),
        (keys::SSL_PROVIDER, runtime.ssl_provider.clone()),
        (keys::SSL_PROTOCOL, runtime.ssl_protocol.clone()),
        (
            keys::SSL_CIPHERS,
            (!runtime.ssl_ciphers.is_empty()).then(|| runtime.ssl_ciphers.join(" ")),
        ),
    ];
    for (key, value) in optional {
        if let Some(value) = value {
            properties.set(key, value);
        }
    }
}

fn apply_cache_overrides(
    builder: &mut ConfigurationBuilder,
    client: &ClientRuntimeConfig,
    runtime: &ClientsRuntimeConfig,
) -> ClientResult<()> {
    for (cache_name, cache) in &client.cache {
        let cache_builder = builder.remote_cache(cache_name);

        if let Some(uri) = &cache.configuration_uri {
            let path = runtime.resolve_resource(uri);
            info!(
                cache = %cache_name,
                path = %path.display(),
                "Loading cache configuration"
            );
            cache_builder.configuration_uri(&path).map_err(|source| {
                ClientError::CacheConfigurationResource {
                    cache: cache_name.clone(),
                    path: path.clone(),
                    source,
                }
            })?;
        } else if let Some(configuration) = &cache.configuration {
            cache_builder.configuration(configuration);
        }

        if let Some(max_entries) = cache.near_cache_max_entries {
            cache_builder.near_cache_max_entries(max_entries);
        }
        if let Some(mode) = cache.near_cache_mode {
            cache_builder.near_cache_mode(mode);
        }
        if let Some(bloom) = cache.near_cache_use_bloom_filter {
            cache_builder.near_cache_use_bloom_filter(bloom);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use proptest::prelude::*;

    use super::*;
    use crate::config::RemoteCacheConfig;
    use crate::configuration::{ClientIntelligence, NearCacheMode};
    use crate::marshall::{ProtoStreamMarshaller, StaticSchemaInitializer, Utf8Marshaller};
    use crate::schema::SchemaRegistration;

    const CLIENT: &str = "site-lon";

    fn runtime_with(client: ClientRuntimeConfig) -> ClientsRuntimeConfig {
        let mut runtime = ClientsRuntimeConfig::default();
        runtime.clients.insert(CLIENT.to_string(), client);
        runtime
    }

    #[test]
    fn test_hosts_become_servers() {
        let runtime = runtime_with(ClientRuntimeConfig::with_hosts("a:11222;b:11223"));
        let translated = builder_from_properties(CLIENT, &ClientDefinition::new(), &runtime).unwrap();

        let config = translated.builder.build().unwrap();
        assert_eq!(config.server_list(), "a:11222;b:11223");
        assert!(config.tracing_propagation_enabled());
    }

    #[test]
    fn test_uri_takes_precedence_over_hosts() {
        let client = ClientRuntimeConfig {
            hosts: Some("ignored:1".to_string()),
            ..ClientRuntimeConfig::with_uri("hotrod://user:pw@uri-host:11222")
        };
        let translated =
            builder_from_properties(CLIENT, &ClientDefinition::new(), &runtime_with(client)).unwrap();

        let config = translated.builder.build().unwrap();
        assert_eq!(config.server_list(), "uri-host:11222");
        assert!(!config.properties().contains_key(keys::SERVER_LIST));
        assert_eq!(config.authentication().username.as_deref(), Some("user"));
    }

    #[test]
    fn test_deprecated_server_list_used_without_hosts() {
        let client = ClientRuntimeConfig {
            server_list: Some("legacy:11222".to_string()),
            ..ClientRuntimeConfig::default()
        };
        let translated =
            builder_from_properties(CLIENT, &ClientDefinition::new(), &runtime_with(client)).unwrap();
        assert_eq!(translated.builder.build().unwrap().server_list(), "legacy:11222");
    }

    #[test]
    fn test_runtime_values_override_raw_properties() {
        let definition = ClientDefinition::new()
            .with_property(keys::SERVER_LIST, "raw:1")
            .with_property(keys::CONNECT_TIMEOUT, "5000");
        let client = ClientRuntimeConfig {
            client_intelligence: Some(ClientIntelligence::Basic),
            tracing_propagation_enabled: false,
            ssl_ciphers: vec!["A".to_string(), "B".to_string()],
            ..ClientRuntimeConfig::with_hosts("runtime:2")
        };

        let translated = builder_from_properties(CLIENT, &definition, &runtime_with(client)).unwrap();
        let config = translated.builder.build().unwrap();
        assert_eq!(config.server_list(), "runtime:2");
        assert_eq!(config.connect_timeout().as_millis(), 5000);
        assert_eq!(config.client_intelligence(), ClientIntelligence::Basic);
        assert!(!config.tracing_propagation_enabled());
        assert_eq!(config.ssl().ciphers, vec!["A", "B"]);
    }

    #[test]
    fn test_raw_properties_without_runtime_section() {
        let definition = ClientDefinition::new().with_property(keys::SERVER_LIST, "raw:1");
        let translated =
            builder_from_properties(CLIENT, &definition, &ClientsRuntimeConfig::default()).unwrap();
        assert_eq!(translated.builder.build().unwrap().server_list(), "raw:1");
    }

    #[test]
    fn test_proto_stream_marshaller_collects_schemas() {
        let marshaller = Arc::new(ProtoStreamMarshaller::new());
        let definition = ClientDefinition::new()
            .with_marshaller(marshaller.clone())
            .with_schemas(SchemaRegistration::new().with_initializer(Arc::new(
                StaticSchemaInitializer::new("library.proto", "package library;"),
            )));

        let translated =
            builder_from_properties(CLIENT, &definition, &ClientsRuntimeConfig::default()).unwrap();

        assert_eq!(
            translated.schema_files,
            vec![("library.proto".to_string(), "package library;".to_string())]
        );
        assert_eq!(
            marshaller.serialization_context().proto_file("library.proto"),
            Some("package library;")
        );
        let config = translated.builder.build().unwrap();
        assert_eq!(config.properties().schema_files().count(), 1);
        assert!(config.marshaller().unwrap().as_proto_stream().is_some());
    }

    #[test]
    fn test_other_marshaller_skips_context_registration() {
        let definition = ClientDefinition::new()
            .with_marshaller(Arc::new(Utf8Marshaller))
            .with_schemas(SchemaRegistration::new().with_initializer(Arc::new(
                StaticSchemaInitializer::new("library.proto", "package library;"),
            )));

        let translated =
            builder_from_properties(CLIENT, &definition, &ClientsRuntimeConfig::default()).unwrap();
        let config = translated.builder.build().unwrap();
        assert_eq!(config.properties().schema_files().count(), 0);
        // Initializer files are still pushed to the server.
        assert_eq!(translated.schema_files.len(), 1);
    }

    #[test]
    fn test_cache_configuration_uri_resolved_against_resource_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("orders.xml"), "<replicated-cache/>").unwrap();

        let client = ClientRuntimeConfig::with_hosts("a:1").with_cache(
            "orders",
            RemoteCacheConfig {
                configuration_uri: Some(PathBuf::from("orders.xml")),
                configuration: Some("<local-cache/>".to_string()),
                near_cache_mode: Some(NearCacheMode::Invalidated),
                near_cache_max_entries: Some(50),
                near_cache_use_bloom_filter: Some(true),
            },
        );
        let mut runtime = runtime_with(client);
        runtime.resource_dir = dir.path().to_path_buf();

        let translated = builder_from_properties(CLIENT, &ClientDefinition::new(), &runtime).unwrap();
        let config = translated.builder.build().unwrap();
        let orders = config.remote_cache("orders").unwrap();
        assert_eq!(orders.configuration.as_deref(), Some("<replicated-cache/>"));
        assert_eq!(orders.near_cache_mode, NearCacheMode::Invalidated);
        assert_eq!(orders.near_cache_max_entries, 50);
        assert!(orders.near_cache_use_bloom_filter);
    }

    #[test]
    fn test_missing_cache_configuration_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let client = ClientRuntimeConfig::with_hosts("a:1").with_cache(
            "orders",
            RemoteCacheConfig {
                configuration_uri: Some(PathBuf::from("absent.xml")),
                ..RemoteCacheConfig::default()
            },
        );
        let mut runtime = runtime_with(client);
        runtime.resource_dir = dir.path().to_path_buf();

        match builder_from_properties(CLIENT, &ClientDefinition::new(), &runtime) {
            Err(ClientError::CacheConfigurationResource { cache, path, .. }) => {
                assert_eq!(cache, "orders");
                assert_eq!(path, dir.path().join("absent.xml"));
            }
            other => panic!("expected cache configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_inline_cache_configuration() {
        let client = ClientRuntimeConfig::with_hosts("a:1").with_cache(
            "books",
            RemoteCacheConfig {
                configuration: Some("<local-cache/>".to_string()),
                ..RemoteCacheConfig::default()
            },
        );
        let translated =
            builder_from_properties(CLIENT, &ClientDefinition::new(), &runtime_with(client)).unwrap();
        let config = translated.builder.build().unwrap();
        assert_eq!(
            config.remote_cache("books").unwrap().configuration.as_deref(),
            Some("<local-cache/>")
        );
    }

    fn credential() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9]{0,11}"
    }

    proptest! {
        #[test]
        fn replacement_wins_over_deprecated(
            old_user in credential(),
            new_user in credential(),
            old_password in credential(),
            new_password in credential(),
        ) {
            let client = ClientRuntimeConfig {
                auth_username: Some(old_user),
                username: Some(new_user.clone()),
                auth_password: Some(old_password),
                password: Some(new_password.clone()),
                server_list: Some("legacy:1".to_string()),
                ..ClientRuntimeConfig::with_hosts("current:2")
            };

            let translated =
                builder_from_properties(CLIENT, &ClientDefinition::new(), &runtime_with(client))
                    .unwrap();
            let config = translated.builder.build().unwrap();

            prop_assert_eq!(config.server_list(), "current:2");
            prop_assert_eq!(config.authentication().username.as_deref(), Some(new_user.as_str()));
            prop_assert_eq!(
                config.authentication().password.as_deref(),
                Some(new_password.as_str())
            );
        }

        #[test]
        fn deprecated_value_used_alone(user in credential()) {
            let client = ClientRuntimeConfig {
                auth_username: Some(user.clone()),
                ..ClientRuntimeConfig::with_hosts("current:2")
            };
            let translated =
                builder_from_properties(CLIENT, &ClientDefinition::new(), &runtime_with(client))
                    .unwrap();
            let config = translated.builder.build().unwrap();
            prop_assert_eq!(config.authentication().username.as_deref(), Some(user.as_str()));
        }
    }
}
