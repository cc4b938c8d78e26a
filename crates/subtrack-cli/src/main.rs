//! SubTrack CLI - Subscription tracker backend
//!
//! Usage:
//!   subtrack serve --port 8080          Start the REST API server
//!   subtrack analyze --file txs.json    Detect subscriptions in a transaction dump
//!   subtrack statement --file bank.pdf  Detect subscriptions in a PDF statement

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Serve { host, port } => commands::cmd_serve(&host, port).await,
        Commands::Analyze { file, mock } => commands::cmd_analyze(&file, mock).await,
        Commands::Statement { file, mock } => commands::cmd_statement(&file, mock).await,
    }
}
