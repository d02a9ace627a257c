//! Error types for the adapter module.

use provix_core::CoreError;
use thiserror::Error;

/// Result type alias for adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Errors that can occur outside the diagnostics channel.
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Data source not found: {0}")]
    DataSourceNotFound(String),

    #[error("Unable to decode the {what} record: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unable to encode the {what} record: {source}")]
    Encode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid {attribute:?} attribute: {message}")]
    InvalidAttribute { attribute: String, message: String },

    #[error(transparent)]
    Core(#[from] CoreError),
}
