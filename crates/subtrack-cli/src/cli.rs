//! CLI argument definitions using clap
//!
//! This module contains the clap structs and enums for parsing CLI
//! arguments. The actual command implementations are in the `commands`
//! module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// SubTrack - Track and detect recurring subscriptions
#[derive(Parser)]
#[command(name = "subtrack")]
#[command(about = "Subscription tracking backend and detection pipeline", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the REST API server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },

    /// Detect subscriptions in a JSON file of feed transactions
    Analyze {
        /// JSON file containing an array of raw transactions
        #[arg(short, long)]
        file: PathBuf,

        /// Use the mock classifier instead of the configured one
        #[arg(long)]
        mock: bool,
    },

    /// Detect subscriptions in a PDF bank statement
    Statement {
        /// PDF statement file
        #[arg(short, long)]
        file: PathBuf,

        /// Use the mock classifier instead of the configured one
        #[arg(long)]
        mock: bool,
    },
}
