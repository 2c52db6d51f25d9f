//! Error taxonomy for the feedback engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedbackError {
    /// A submission broke a record invariant and was not persisted.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The stored value under `key` could not be parsed.
    #[error("corrupt store data under '{key}': {message}")]
    CorruptStore { key: String, message: String },

    /// Analytics was handed a record that breaks a record invariant.
    #[error("invalid record '{id}': {reason}")]
    InvalidRecord { id: String, reason: String },

    /// The backing key-value store failed to read or write.
    #[error("storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl From<sqlx::Error> for FeedbackError {
    fn from(e: sqlx::Error) -> Self {
        FeedbackError::Storage(e.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for FeedbackError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        FeedbackError::Storage(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FeedbackError>;
