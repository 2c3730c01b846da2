//! `check` command: start a client against the in-process backend.
//!
//! Runs the full startup path (translation, connect, schema push, cache
//! resolution) so configuration errors surface without a real cluster.

use std::path::Path;
use std::sync::Arc;

use hotrod_clients::client::memory::{MemoryClientFactory, MemoryServer};
use hotrod_clients::client::PROTOBUF_METADATA_CACHE_NAME;
use hotrod_clients::config::ClientsSettings;
use hotrod_clients::ClientRegistry;
use tracing::info;

use super::common::{attach_proto_dir, client_name};
use crate::error::CliError;

/// Outcome of a check.
#[derive(Debug, PartialEq, Eq)]
pub struct CheckReport {
    pub client: String,
    pub servers: Option<String>,
    pub cache: Option<String>,
    pub schema_files: u64,
}

pub fn run(
    settings: ClientsSettings,
    client: Option<String>,
    cache: Option<String>,
    proto_dir: Option<&Path>,
) -> Result<(), CliError> {
    let report = check(settings, client, cache.as_deref(), proto_dir)?;

    match &report.servers {
        None => println!("Client {} is not configured; nothing to start.", report.client),
        Some(servers) => {
            println!("{}", started_line(&report.client, servers));
            println!("  Schema files on server: {}", report.schema_files);
            if let Some(cache) = &report.cache {
                println!("  Resolved cache: {}", display_cache(cache));
            }
        }
    }
    Ok(())
}

pub fn check(
    mut settings: ClientsSettings,
    client: Option<String>,
    cache: Option<&str>,
    proto_dir: Option<&Path>,
) -> Result<CheckReport, CliError> {
    let name = client_name(client);
    if let Some(dir) = proto_dir {
        attach_proto_dir(&mut settings, &name, dir)?;
    }

    let factory = Arc::new(MemoryClientFactory::new());
    let server = factory.server();
    let registry = ClientRegistry::open(settings, factory);

    let result = resolve(&registry, &server, &name, cache);
    registry.shutdown_all();
    result
}

fn resolve(
    registry: &ClientRegistry,
    server: &MemoryServer,
    name: &str,
    cache: Option<&str>,
) -> Result<CheckReport, CliError> {
    let Some(manager) = registry.named_manager(name)? else {
        return Ok(CheckReport {
            client: name.to_string(),
            servers: None,
            cache: None,
            schema_files: 0,
        });
    };

    let resolved = registry.remote_cache(name, cache)?;
    info!(client = name, cache = resolved.name(), "Check passed");

    let schema_files = server
        .cache(PROTOBUF_METADATA_CACHE_NAME)
        .map_or(0, |metadata| metadata.len());
    Ok(CheckReport {
        client: name.to_string(),
        servers: Some(manager.configuration().server_list()),
        cache: Some(resolved.name().to_string()),
        schema_files,
    })
}

fn started_line(client: &str, servers: &str) -> String {
    format!(
        "Client {}: configuration accepted for {} (in-process check, no network connection)",
        client, servers
    )
}

fn display_cache(name: &str) -> &str {
    if name.is_empty() {
        "(default)"
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hotrod_clients::config::ClientRuntimeConfig;
    use hotrod_clients::DEFAULT_CLIENT_NAME;

    #[test]
    fn test_check_unconfigured_client() {
        let report = check(ClientsSettings::new(), None, None, None).unwrap();
        assert_eq!(report.client, DEFAULT_CLIENT_NAME);
        assert!(report.servers.is_none());
    }

    #[test]
    fn test_check_resolves_cache_and_pushes_schemas() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("library.proto"), "package library;").unwrap();
        std::fs::write(dir.path().join("shop.proto"), "package shop;").unwrap();

        let settings = ClientsSettings::new()
            .with_runtime("site-lon", ClientRuntimeConfig::with_hosts("lon:11222"));
        let report = check(
            settings,
            Some("site-lon".to_string()),
            Some("orders"),
            Some(dir.path()),
        )
        .unwrap();

        assert_eq!(
            report,
            CheckReport {
                client: "site-lon".to_string(),
                servers: Some("lon:11222".to_string()),
                cache: Some("orders".to_string()),
                schema_files: 2,
            }
        );
    }

    #[test]
    fn test_check_surfaces_configuration_errors() {
        let settings = ClientsSettings::new().with_runtime(
            DEFAULT_CLIENT_NAME,
            ClientRuntimeConfig::with_uri("http://wrong-scheme:11222"),
        );
        assert!(matches!(
            check(settings, None, None, None),
            Err(CliError::Client(_))
        ));
    }

    #[test]
    fn test_started_line_does_not_claim_a_connection() {
        let line = started_line("site-lon", "lon:11222");
        assert!(line.contains("configuration accepted for lon:11222"));
        assert!(line.contains("in-process"));
        assert!(!line.contains("connected to"));
    }

    #[test]
    fn test_display_cache() {
        assert_eq!(display_cache(""), "(default)");
        assert_eq!(display_cache("books"), "books");
    }
}
