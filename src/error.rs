//! Error types for Gamblr Chat.
//!
//! `GamblrError` covers startup and infrastructure failures. Errors that a
//! chat participant can trigger live in [`crate::chat::ChatError`] and are
//! never propagated out of the panel.

use thiserror::Error;

/// Common error type for Gamblr Chat.
#[derive(Error, Debug)]
pub enum GamblrError {
    /// Database error.
    ///
    /// Database errors from sqlx are automatically converted.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Authentication error.
    #[error("authentication error: {0}")]
    Auth(String),

    /// Validation error for configuration or user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Message store error.
    #[error("store error: {0}")]
    Store(#[from] crate::store::StoreError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for GamblrError {
    fn from(e: sqlx::Error) -> Self {
        GamblrError::Database(e.to_string())
    }
}

/// Result type alias for Gamblr Chat operations.
pub type Result<T> = std::result::Result<T, GamblrError>;
