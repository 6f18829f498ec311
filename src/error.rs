//! Error types for the mail service.

use thiserror::Error;

use crate::mail::RejectReason;

/// Common error type for mail operations.
#[derive(Error, Debug)]
pub enum MailError {
    /// Database error.
    ///
    /// Wraps any failure reported by the store. This is the only class
    /// of error a caller may retry, and only for idempotent operations.
    #[error("database error: {0}")]
    Database(String),

    /// Stored data violates a constraint or cannot be decoded.
    ///
    /// Deterministic: repeating the operation fails the same way.
    #[error("data integrity error: {0}")]
    Integrity(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Validation error for caller input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Submission rejected by the anti-abuse policy.
    #[error("message rejected: {0}")]
    Rejected(RejectReason),

    /// The actor is not allowed to act on the resource.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Resource not found (or hidden from the actor).
    #[error("{0} not found")]
    NotFound(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl MailError {
    /// Whether a caller may retry the failed operation automatically.
    ///
    /// Submissions must still not be retried blindly: a store failure
    /// after an ambiguous commit could deliver the message twice.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MailError::Database(_))
    }

    /// The policy reason, if this is a policy rejection.
    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            MailError::Rejected(reason) => Some(*reason),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for MailError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db)
                if db.is_foreign_key_violation()
                    || db.is_check_violation()
                    || db.is_unique_violation() =>
            {
                MailError::Integrity(e.to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                MailError::Integrity(e.to_string())
            }
            _ => MailError::Database(e.to_string()),
        }
    }
}

/// Result type alias for mail operations.
pub type Result<T> = std::result::Result<T, MailError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forbidden_error_display() {
        let err = MailError::Forbidden("only the recipient may mark a message read".to_string());
        assert_eq!(
            err.to_string(),
            "forbidden: only the recipient may mark a message read"
        );
    }

    #[test]
    fn test_validation_error_display() {
        let err = MailError::Validation("subject too long".to_string());
        assert_eq!(err.to_string(), "validation error: subject too long");
    }

    #[test]
    fn test_not_found_error_display() {
        let err = MailError::NotFound("message".to_string());
        assert_eq!(err.to_string(), "message not found");
    }

    #[test]
    fn test_rejected_error_display() {
        let err = MailError::Rejected(RejectReason::MinuteLimit);
        assert!(err.to_string().starts_with("message rejected: "));
        assert_eq!(err.reject_reason(), Some(RejectReason::MinuteLimit));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: MailError = io_err.into();
        assert!(matches!(err, MailError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_only_store_errors_are_retryable() {
        assert!(MailError::Database("locked".to_string()).is_retryable());
        assert!(!MailError::Validation("x".to_string()).is_retryable());
        assert!(!MailError::Rejected(RejectReason::Duplicate).is_retryable());
        assert!(!MailError::Forbidden("x".to_string()).is_retryable());
        assert!(!MailError::NotFound("x".to_string()).is_retryable());
        assert!(!MailError::Integrity("x".to_string()).is_retryable());
    }

    #[test]
    fn test_decode_failure_is_integrity() {
        let err: MailError = sqlx::Error::Decode("bad column".into()).into();
        assert!(matches!(err, MailError::Integrity(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_pool_failure_is_retryable() {
        let err: MailError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, MailError::Database(_)));
        assert!(err.is_retryable());
    }
}
