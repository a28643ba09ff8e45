//! Error types for memoria

use thiserror::Error;

/// Result type alias using memoria's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for memoria
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Upstream provider error (embedding model, LLM)
    #[error("Provider error: {0}")]
    Provider(String),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unauthorized access
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    /// A concurrent writer changed a record between read and write
    #[error("Write conflict: {0}")]
    Conflict(String),

    /// Timeout error
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if error is retryable
    ///
    /// Nothing inside the engine retries; callers use this to decide whether
    /// to resubmit the whole operation.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Http(_)
                | Error::Provider(_)
                | Error::RateLimit(_)
                | Error::Timeout(_)
                | Error::Database(_)
                | Error::Conflict(_)
        )
    }

    /// Check if error is a client error (user's fault)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidInput(_) | Error::NotFound(_) | Error::Unauthorized(_)
        )
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        Error::Timeout(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(Error::Timeout("embed".into()).is_retryable());
        assert!(Error::Conflict("candidate".into()).is_retryable());
        assert!(Error::Provider("upstream 502".into()).is_retryable());
        assert!(!Error::InvalidInput("empty".into()).is_retryable());
        assert!(!Error::Config("missing".into()).is_retryable());
    }

    #[test]
    fn test_client_error_classification() {
        assert!(Error::InvalidInput("limit".into()).is_client_error());
        assert!(Error::NotFound("memory".into()).is_client_error());
        assert!(!Error::Internal("boom".into()).is_client_error());
    }

    #[test]
    fn test_not_found_message() {
        let id = uuid::Uuid::new_v4();
        let err = Error::NotFound(format!("memory {}", id));
        assert_eq!(err.to_string(), format!("Not found: memory {}", id));
        assert!(!err.is_retryable());
    }
}
