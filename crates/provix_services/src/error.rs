//! Error types for the representative resources.

use provix_core::{errmsg, ApiError, CoreError, Diagnostic, Diagnostics};
use provix_waiter::WaitError;
use thiserror::Error;

/// Result type alias for resource operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Wait(#[from] WaitError),

    #[error("invalid identifier: {0}")]
    Identifier(#[from] CoreError),

    #[error("resource conflict: {0}")]
    Conflict(String),
}

impl ServiceError {
    pub fn is_not_found(&self) -> bool {
        match self {
            ServiceError::Api(e) => e.is_not_found(),
            ServiceError::Wait(e) => e.is_not_found(),
            _ => false,
        }
    }

    /// Render as a fatal diagnostic under `summary`. Remote errors keep
    /// their cause so the adapter can recognise a missing object.
    pub fn to_diagnostic(&self, summary: &str) -> Diagnostic {
        match self {
            ServiceError::Api(e) => Diagnostic::from_api_error(summary, e),
            ServiceError::Wait(e) => e.to_diagnostic(summary),
            ServiceError::Conflict(_) => Diagnostic::error(errmsg::SUMMARY_RESOURCE_CONFLICT, self.to_string()),
            ServiceError::Identifier(_) => Diagnostic::error(summary, self.to_string()),
        }
    }

    pub fn into_diagnostics(self, summary: &str) -> Diagnostics {
        let mut diags = Diagnostics::new();
        diags.push(self.to_diagnostic(summary));
        diags
    }
}
