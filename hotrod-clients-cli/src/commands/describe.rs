//! `describe` command: show the resolved configuration of a client.

use hotrod_clients::config::{ClientDefinition, ClientsSettings};
use hotrod_clients::translator::builder_from_properties;
use hotrod_clients::Configuration;

use super::common::{client_name, display_path, require_client};
use crate::error::CliError;

pub fn run(settings: &ClientsSettings, client: Option<String>, json: bool) -> Result<(), CliError> {
    let name = client_name(client);
    require_client(settings, &name)?;

    let configuration = resolve(settings, &name)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&configuration)?);
    } else {
        print!("{}", render(&name, &configuration));
    }
    Ok(())
}

/// Translate and build the configuration without connecting.
pub fn resolve(settings: &ClientsSettings, name: &str) -> Result<Configuration, CliError> {
    let empty = ClientDefinition::default();
    let definition = settings.definition(name).unwrap_or(&empty);
    let translated = builder_from_properties(name, definition, &settings.runtime)?;
    Ok(translated.builder.build()?)
}

fn render(name: &str, config: &Configuration) -> String {
    let auth = config.authentication();
    let ssl = config.ssl();

    let mut out = format!("Client: {}\n", name);
    let servers = config.server_list();
    out.push_str(&format!(
        "  Servers:             {}\n",
        if servers.is_empty() { "(none)" } else { servers.as_str() }
    ));
    out.push_str(&format!(
        "  Marshaller:          {}\n",
        config.marshaller().map_or("(default)", |m| m.media_type())
    ));
    out.push_str(&format!("  Client intelligence: {}\n", config.client_intelligence()));
    out.push_str(&format!(
        "  Tracing propagation: {}\n",
        config.tracing_propagation_enabled()
    ));
    out.push_str(&format!(
        "  Timeouts:            connect {:?}, socket {:?}, {} retries\n",
        config.connect_timeout(),
        config.socket_timeout(),
        config.max_retries()
    ));

    if auth.enabled {
        out.push_str(&format!(
            "  Authentication:      {} as {} (realm {}, server {})\n",
            auth.sasl_mechanism,
            auth.username.as_deref().unwrap_or("(callback)"),
            auth.realm,
            auth.server_name
        ));
    } else {
        out.push_str("  Authentication:      disabled\n");
    }

    if ssl.enabled {
        out.push_str(&format!(
            "  TLS:                 enabled, trust store {}\n",
            display_path(ssl.trust_store_file_name.as_ref())
        ));
    } else {
        out.push_str("  TLS:                 disabled\n");
    }

    for (cache_name, cache) in config.remote_caches() {
        out.push_str(&format!(
            "  Cache {}: near cache {} (max {}), definition {}\n",
            cache_name,
            cache.near_cache_mode,
            cache.near_cache_max_entries,
            display_path(cache.configuration_uri.as_ref())
        ));
    }

    let schema_files = config.properties().schema_files().count();
    out.push_str(&format!(
        "  Properties:          {} ({} schema files)\n",
        config.properties().len(),
        schema_files
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use hotrod_clients::config::{ClientRuntimeConfig, RemoteCacheConfig};
    use hotrod_clients::configuration::NearCacheMode;
    use hotrod_clients::DEFAULT_CLIENT_NAME;

    fn settings() -> ClientsSettings {
        let runtime = ClientRuntimeConfig {
            username: Some("app".to_string()),
            password: Some("secret".to_string()),
            ..ClientRuntimeConfig::with_hosts("node-1:11222")
        }
        .with_cache(
            "books",
            RemoteCacheConfig {
                near_cache_mode: Some(NearCacheMode::Invalidated),
                near_cache_max_entries: Some(100),
                ..RemoteCacheConfig::default()
            },
        );
        ClientsSettings::new().with_runtime(DEFAULT_CLIENT_NAME, runtime)
    }

    #[test]
    fn test_resolve_does_not_require_connection() {
        let config = resolve(&settings(), DEFAULT_CLIENT_NAME).unwrap();
        assert_eq!(config.server_list(), "node-1:11222");
        assert!(config.authentication().enabled);
    }

    #[test]
    fn test_render_text() {
        let config = resolve(&settings(), DEFAULT_CLIENT_NAME).unwrap();
        let out = render(DEFAULT_CLIENT_NAME, &config);

        assert!(out.contains("Servers:             node-1:11222"));
        assert!(out.contains("SCRAM-SHA-512 as app"));
        assert!(out.contains("Cache books: near cache INVALIDATED (max 100)"));
        assert!(!out.contains("secret"));
    }

    #[test]
    fn test_json_hides_password() {
        let config = resolve(&settings(), DEFAULT_CLIENT_NAME).unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("node-1:11222"));
        assert!(!json.contains("secret"));
    }
}
