//! Aegis CLI: command-line client for the DID registry.
//!
//! Subcommands: keygen, did, content, status.

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Aegis, the owner-controlled DID registry.
#[derive(Parser, Debug)]
#[command(name = "aegis", version, about, long_about = None)]
struct Cli {
    /// Log verbosity for client-side diagnostics.
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a signing key and print its registry identity.
    Keygen(commands::keygen::KeygenArgs),
    /// Register, inspect, update, and list DIDs.
    Did(commands::did::DidArgs),
    /// Store and fetch DID documents in the node's content store.
    Content(commands::content::ContentArgs),
    /// Query the status of a running node.
    Status(commands::status::StatusArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Keygen(args) => commands::keygen::run(args),
        Commands::Did(args) => commands::did::run(args).await,
        Commands::Content(args) => commands::content::run(args).await,
        Commands::Status(args) => commands::status::run(args).await,
    }
}
