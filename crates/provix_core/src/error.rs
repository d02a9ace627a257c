//! Error types for the core module.

use thiserror::Error;

use crate::context::ContextError;
use crate::timeouts::DurationError;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur during core operations.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid resource id {id:?}: expected {expected} segments, got {got}")]
    InvalidIdentifier {
        id: String,
        expected: String,
        got: usize,
    },

    #[error("Invalid duration: {0}")]
    Duration(#[from] DurationError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Unsupported configuration format: {0}")]
    UnsupportedFormat(String),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}
