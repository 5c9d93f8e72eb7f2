//! Error types for QuoteCore.
//!
//! This module defines all error types used throughout the library.

use thiserror::Error;

/// Result type alias for quote operations
pub type QuoteResult<T> = Result<T, QuoteError>;

/// Main error type for quote operations
#[derive(Error, Debug)]
pub enum QuoteError {
    #[error("Validation error in {field}: {message}")]
    Validation { field: String, message: String },

    /// Persisted data could not be decoded. Recovered locally, never shown to the user.
    #[error("Stored data is corrupted: {0}")]
    StorageParse(String),

    /// The remote quote source failed (network, non-2xx status, bad body).
    #[error("Remote error: {0}")]
    Remote(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

impl QuoteError {
    /// Create a new validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        QuoteError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new remote error
    pub fn remote(message: impl Into<String>) -> Self {
        QuoteError::Remote(message.into())
    }

    /// Create a new storage parse error
    pub fn storage_parse(message: impl Into<String>) -> Self {
        QuoteError::StorageParse(message.into())
    }

    /// True for errors caused by user input (reported back, no state change)
    pub fn is_validation(&self) -> bool {
        matches!(self, QuoteError::Validation { .. })
    }
}

impl From<reqwest::Error> for QuoteError {
    fn from(err: reqwest::Error) -> Self {
        QuoteError::Remote(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = QuoteError::validation("text", "cannot be empty");
        assert_eq!(err.to_string(), "Validation error in text: cannot be empty");
    }

    #[test]
    fn test_is_validation() {
        assert!(QuoteError::validation("field", "message").is_validation());
        assert!(!QuoteError::remote("timeout").is_validation());
        assert!(!QuoteError::storage_parse("bad json").is_validation());
    }
}
