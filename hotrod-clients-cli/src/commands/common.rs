//! Helpers shared across CLI commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use hotrod_clients::config::{default_config_path, ClientsSettings};
use hotrod_clients::marshall::{FileDescriptorSource, ProtoStreamMarshaller};
use hotrod_clients::registry::{is_default, DEFAULT_CLIENT_NAME};
use tracing::{debug, warn};

use crate::error::CliError;

/// Load settings from `path`, or from the default location when it exists.
///
/// Without any file the settings are empty.
pub fn load_settings(path: Option<&Path>) -> Result<ClientsSettings, CliError> {
    if let Some(path) = path {
        return Ok(ClientsSettings::load(path)?);
    }

    match default_config_path() {
        Some(path) if path.is_file() => {
            debug!(path = %path.display(), "Using default configuration file");
            Ok(ClientsSettings::load(path)?)
        }
        _ => {
            warn!("No configuration file found, using empty settings");
            Ok(ClientsSettings::new())
        }
    }
}

/// Client name argument, defaulting to the default client.
pub fn client_name(arg: Option<String>) -> String {
    match arg {
        Some(name) if !is_default(&name) => name,
        _ => DEFAULT_CLIENT_NAME.to_string(),
    }
}

/// Fail unless `name` appears in the settings.
pub fn require_client(settings: &ClientsSettings, name: &str) -> Result<(), CliError> {
    if settings.client_names().contains(name) {
        Ok(())
    } else {
        Err(CliError::UnknownClient(name.to_string()))
    }
}

/// Attach a proto-stream marshaller and the `*.proto` files of `dir` to
/// client `name`.
pub fn attach_proto_dir(
    settings: &mut ClientsSettings,
    name: &str,
    dir: &Path,
) -> Result<Arc<ProtoStreamMarshaller>, CliError> {
    if !dir.is_dir() {
        return Err(CliError::Config(format!(
            "schema directory {} does not exist",
            dir.display()
        )));
    }
    let source = FileDescriptorSource::from_dir(dir).map_err(CliError::SchemaDir)?;
    debug!(dir = %dir.display(), files = source.len(), "Loaded schema directory");

    let marshaller = Arc::new(ProtoStreamMarshaller::new());
    let definition = settings.definition_mut(name);
    definition.marshaller = Some(marshaller.clone());
    definition.schemas.add_descriptor_source(source);
    Ok(marshaller)
}

/// Display form of an optional path.
pub fn display_path(path: Option<&PathBuf>) -> String {
    path.map(|p| p.display().to_string())
        .unwrap_or_else(|| "(none)".to_string())
}
