//! CLI errors

use thiserror::Error;

use crate::config::ConfigError;

/// Errors surfaced by the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration could not be loaded or written
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// Filesystem or network fault
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// Refusing to overwrite an existing file
    #[error("refusing to overwrite {0}")]
    AlreadyExists(String),
}
