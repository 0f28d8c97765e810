// Central Error Type for the Application

use crate::domain::FailureKind;
use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    /// Business rule violated; the reason is surfaced verbatim to callers
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A non-terminal job already exists for the (student, course) pair
    #[error("Already active: {0}")]
    AlreadyActive(String),

    /// Optimistic-lock compare-and-swap lost to a concurrent writer
    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Transient errors are retried with backoff; everything else is terminal
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::ConcurrentModification(_) | AppError::Database(_)
        )
    }

    /// Failure kind recorded on a job that ends with this error
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            AppError::Validation(_) | AppError::Domain(_) => FailureKind::Rejected,
            AppError::NotFound(_) => FailureKind::NotFound,
            e if e.is_retryable() => FailureKind::RetriesExhausted,
            _ => FailureKind::Internal,
        }
    }

    /// Reason text without the variant prefix
    pub fn reason(&self) -> String {
        match self {
            AppError::Validation(msg)
            | AppError::NotFound(msg)
            | AppError::AlreadyActive(msg)
            | AppError::ConcurrentModification(msg)
            | AppError::Database(msg)
            | AppError::Conflict(msg)
            | AppError::Config(msg)
            | AppError::InvalidState(msg)
            | AppError::Internal(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

// Note: sqlx::Error conversion is handled in infra-sqlite crate
// by `map_sqlx_error`

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classes() {
        assert!(AppError::ConcurrentModification("v3".into()).is_retryable());
        assert!(AppError::Database("database is locked".into()).is_retryable());
        assert!(!AppError::Validation("time conflict".into()).is_retryable());
        assert!(!AppError::NotFound("course 1".into()).is_retryable());
        assert!(!AppError::Internal("panic".into()).is_retryable());
    }

    #[test]
    fn test_failure_kind() {
        assert_eq!(
            AppError::Validation("x".into()).failure_kind(),
            FailureKind::Rejected
        );
        assert_eq!(
            AppError::NotFound("x".into()).failure_kind(),
            FailureKind::NotFound
        );
        assert_eq!(
            AppError::ConcurrentModification("x".into()).failure_kind(),
            FailureKind::RetriesExhausted
        );
        assert_eq!(
            AppError::Internal("x".into()).failure_kind(),
            FailureKind::Internal
        );
    }

    #[test]
    fn test_reason_strips_prefix() {
        let err = AppError::Validation("Missing prerequisite: CS101".into());
        assert_eq!(err.reason(), "Missing prerequisite: CS101");
        assert_eq!(err.to_string(), "Validation error: Missing prerequisite: CS101");
    }
}
