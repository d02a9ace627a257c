//! Error types for the waiter module.

use std::time::Duration;

use provix_core::{errmsg, ApiError, Diagnostic};
use thiserror::Error;

/// Result type alias for waiter operations.
pub type WaitResult<T> = Result<T, WaitError>;

/// Why a convergence wait stopped without success.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WaitError {
    #[error("error refreshing state: {0}")]
    Refresh(#[from] ApiError),

    #[error(
        "timeout while waiting for state to become '{}' (last state: '{last_state}', timeout: {timeout:?})",
        .expected.join(", ")
    )]
    Timeout {
        last_state: String,
        expected: Vec<String>,
        timeout: Duration,
    },

    #[error("unexpected state '{state}', wanted target '{}'", .expected.join(", "))]
    UnexpectedState { state: String, expected: Vec<String> },

    #[error("couldn't find resource ({checks} retries)")]
    NotFound { checks: u32 },

    #[error("context canceled")]
    Cancelled,
}

impl WaitError {
    /// True when the remote object is gone, either because a refresh failed
    /// with a 404 or because it stayed absent for every allowed check.
    pub fn is_not_found(&self) -> bool {
        match self {
            WaitError::Refresh(e) => e.is_not_found(),
            WaitError::NotFound { .. } => true,
            _ => false,
        }
    }

    /// Last state observed before a timeout.
    pub fn last_state(&self) -> Option<&str> {
        match self {
            WaitError::Timeout { last_state, .. } => Some(last_state),
            _ => None,
        }
    }

    /// Render as a fatal diagnostic. Timeouts and cancellation get their own
    /// stable summaries, everything else uses `summary`.
    pub fn to_diagnostic(&self, summary: &str) -> Diagnostic {
        match self {
            WaitError::Refresh(e) => Diagnostic::from_api_error(summary, e),
            WaitError::Timeout { .. } => Diagnostic::error(errmsg::SUMMARY_CONVERGENCE_TIMEOUT, self.to_string()),
            WaitError::Cancelled => Diagnostic::error(errmsg::SUMMARY_CONTEXT_DONE, self.to_string()),
            _ => Diagnostic::error(summary, self.to_string()),
        }
    }
}
