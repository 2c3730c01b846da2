//! hotrod-clients - inspect and check named Hot Rod client configurations.
//!
//! Reads the clients configuration file (by default
//! `<config dir>/hotrod-clients/clients.ini`) and runs the library's
//! translation, schema registration and registry startup against it.

mod commands;
mod error;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use hotrod_clients::logging::{init_logging, LoggingConfig};

use crate::error::CliError;

#[derive(Debug, Parser)]
#[command(name = "hotrod-clients", version, about, long_about = None)]
struct Cli {
    /// Clients configuration file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true, value_name = "FILE")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List configured clients
    Clients,

    /// Show the resolved configuration of a client
    Describe {
        /// Client name (default client when omitted)
        client: Option<String>,

        /// Print the configuration as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show which schema files a client would register
    Schemas {
        /// Client name (default client when omitted)
        client: Option<String>,

        /// Directory containing *.proto files
        #[arg(long, value_name = "DIR")]
        proto_dir: PathBuf,
    },

    /// Start a client against an in-process backend and resolve a cache
    Check {
        /// Client name (default client when omitted)
        client: Option<String>,

        /// Cache to resolve (default cache when omitted)
        #[arg(long)]
        cache: Option<String>,

        /// Directory containing *.proto files to register
        #[arg(long, value_name = "DIR")]
        proto_dir: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let mut logging = LoggingConfig::default().verbose(cli.verbose);
    if let Some(path) = &cli.log_file {
        logging = logging.with_log_file(path);
    }
    // Dropping the guard flushes the file writer.
    let _guard = match init_logging(logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {}", CliError::from(e));
            process::exit(1);
        }
    };

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let settings = commands::common::load_settings(cli.config.as_deref())?;

    match cli.command {
        Commands::Clients => commands::clients::run(&settings),
        Commands::Describe { client, json } => commands::describe::run(&settings, client, json),
        Commands::Schemas { client, proto_dir } => {
            commands::schemas::run(settings, client, &proto_dir)
        }
        Commands::Check {
            client,
            cache,
            proto_dir,
        } => commands::check::run(settings, client, cache, proto_dir.as_deref()),
    }
}
