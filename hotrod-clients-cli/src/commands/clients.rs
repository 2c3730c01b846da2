//! `clients` command: list configured clients.

use hotrod_clients::config::ClientsSettings;

use crate::error::CliError;

pub fn run(settings: &ClientsSettings) -> Result<(), CliError> {
    print!("{}", render(settings));
    Ok(())
}

fn render(settings: &ClientsSettings) -> String {
    let names = settings.client_names();
    if names.is_empty() {
        return "No clients configured.\n".to_string();
    }

    let mut out = String::new();
    for name in names {
        let runtime = settings.runtime_config(name);
        let definition = settings.definition(name);

        let servers = runtime
            .and_then(|r| r.uri.as_deref().or(r.hosts.as_deref()).or(r.server_list.as_deref()))
            .unwrap_or("-");
        let properties = definition.map_or(0, |d| d.properties.len());
        let caches = runtime.map_or(0, |r| r.cache.len());

        out.push_str(&format!(
            "{:<24} servers: {:<32} properties: {:<3} caches: {}\n",
            name, servers, properties, caches
        ));
    }
    out
}
