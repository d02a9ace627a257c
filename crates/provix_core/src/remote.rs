//! Remote API error taxonomy.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An error returned by the remote provisioning API.
///
/// `status` is the HTTP status code; `0` stands for a transport failure where
/// no response was received.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("[{status}]: {message}")]
pub struct ApiError {
    pub status: u16,
    pub message: String,
}

/// Coarse classification of an [`ApiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorKind {
    NotFound,
    Conflict,
    Forbidden,
    Rejected,
    Server,
    Transport,
}

impl ApiError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(404, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(409, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(0, message)
    }

    pub fn kind(&self) -> ApiErrorKind {
        match self.status {
            0 => ApiErrorKind::Transport,
            404 => ApiErrorKind::NotFound,
            409 => ApiErrorKind::Conflict,
            403 => ApiErrorKind::Forbidden,
            s if s >= 500 => ApiErrorKind::Server,
            _ => ApiErrorKind::Rejected,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ApiErrorKind::NotFound
    }

    pub fn is_conflict(&self) -> bool {
        self.kind() == ApiErrorKind::Conflict
    }

    pub fn is_forbidden(&self) -> bool {
        self.kind() == ApiErrorKind::Forbidden
    }

    pub fn is_rejected(&self) -> bool {
        self.kind() == ApiErrorKind::Rejected
    }

    pub fn is_server_error(&self) -> bool {
        self.kind() == ApiErrorKind::Server
    }

    pub fn has_status(&self, statuses: &[u16]) -> bool {
        statuses.contains(&self.status)
    }
}

/// True when the result carries an error that is not a "not found".
///
/// Used around lookups where absence is an expected answer.
pub fn is_critical<T>(result: &Result<T, ApiError>) -> bool {
    matches!(result, Err(e) if !e.is_not_found())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(ApiError::new(404, "x").kind(), ApiErrorKind::NotFound);
        assert_eq!(ApiError::new(409, "x").kind(), ApiErrorKind::Conflict);
        assert_eq!(ApiError::new(403, "x").kind(), ApiErrorKind::Forbidden);
        assert_eq!(ApiError::new(400, "x").kind(), ApiErrorKind::Rejected);
        assert_eq!(ApiError::new(503, "x").kind(), ApiErrorKind::Server);
        assert_eq!(ApiError::transport("reset").kind(), ApiErrorKind::Transport);
    }

    #[test]
    fn test_is_critical() {
        let missing: Result<(), ApiError> = Err(ApiError::not_found("gone"));
        let broken: Result<(), ApiError> = Err(ApiError::new(500, "boom"));
        assert!(!is_critical(&missing));
        assert!(is_critical(&broken));
        assert!(!is_critical(&Ok::<(), ApiError>(())));
    }

    #[test]
    fn test_display() {
        assert_eq!(ApiError::new(500, "boom").to_string(), "[500]: boom");
    }
}
