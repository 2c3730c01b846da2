//! `schemas` command: show what schema registration would do for a client.

use std::path::Path;

use hotrod_clients::config::{ClientDefinition, ClientsSettings};
use hotrod_clients::translator::builder_from_properties;

use super::common::{attach_proto_dir, client_name};
use crate::error::CliError;

pub fn run(
    mut settings: ClientsSettings,
    client: Option<String>,
    proto_dir: &Path,
) -> Result<(), CliError> {
    let name = client_name(client);
    let marshaller = attach_proto_dir(&mut settings, &name, proto_dir)?;

    let empty = ClientDefinition::default();
    let definition = settings.definition(&name).unwrap_or(&empty);
    let translated = builder_from_properties(&name, definition, &settings.runtime)?;

    let ctx = marshaller.serialization_context();
    println!(
        "Client {}: {} schema files registered with the marshaller",
        name,
        ctx.file_count()
    );
    if translated.schema_files.is_empty() {
        println!("Nothing to push.");
    } else {
        let target = if settings.runtime.schema_registration_enabled() {
            "Files pushed to the server on connect:"
        } else {
            "Schema registration is disabled; files that would be pushed:"
        };
        println!("{}", target);
        for (file, contents) in &translated.schema_files {
            println!("  {:<40} {:>8} bytes", file, contents.len());
        }
    }
    Ok(())
}
