//! # CLI
//!
//! Argument parsing and command dispatch for the `varmarshal` binary.

pub mod args;
pub mod commands;
pub mod errors;

use args::{Cli, Command};
use errors::CliError;

/// Parse arguments and run the selected command
pub fn run() -> Result<(), CliError> {
    let cli = Cli::parse_args();
    match cli.command {
        Command::Init { config } => commands::init(&config),
        Command::Serve { config, bind } => commands::serve(&config, bind),
    }
}
