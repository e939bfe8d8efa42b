//! CLI argument definitions using clap
//!
//! Commands:
//! - varmarshal init --config <path>
//! - varmarshal serve --config <path> [--bind <host:port>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// varmarshal - query engine for a light-curve curation portal
#[derive(Parser, Debug)]
#[command(name = "varmarshal")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write a default configuration file
    Init {
        /// Path to configuration file
        #[arg(long, default_value = "./varmarshal.json")]
        config: PathBuf,
    },

    /// Start the query API server
    Serve {
        /// Path to configuration file
        #[arg(long, default_value = "./varmarshal.json")]
        config: PathBuf,

        /// Override the configured bind address, host:port
        #[arg(long)]
        bind: Option<String>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
