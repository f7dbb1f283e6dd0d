//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a specific file with context.
    #[error("failed to read file '{}': {source}", .path.display())]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse YAML.
    #[error("YAML parse error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Failed to parse YAML from a specific file.
    #[error("YAML parse error in '{}': {source}", .path.display())]
    YamlFileError {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Missing required field.
    #[error("missing required field: {0}")]
    MissingField(String),
}
