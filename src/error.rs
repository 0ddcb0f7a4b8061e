//! Error types for postbox.

use thiserror::Error;

use crate::email::{EmailId, EmailStatus, FilterError};

/// Common error type for postbox.
#[derive(Error, Debug)]
pub enum PostboxError {
    /// Database error.
    ///
    /// Errors from sqlx are converted into this variant.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Validation error for command input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// The command does not apply to the email in its current status.
    #[error("cannot {action} email {id}: status is {status}")]
    InvalidState {
        /// Target email.
        id: EmailId,
        /// Status found in storage.
        status: EmailStatus,
        /// Name of the rejected action.
        action: &'static str,
    },

    /// Filter compilation error.
    #[error("filter error: {0}")]
    Filter(#[from] FilterError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for PostboxError {
    fn from(e: sqlx::Error) -> Self {
        PostboxError::Database(e.to_string())
    }
}

impl From<validator::ValidationErrors> for PostboxError {
    fn from(e: validator::ValidationErrors) -> Self {
        PostboxError::Validation(e.to_string())
    }
}

/// Result type alias for postbox operations.
pub type Result<T> = std::result::Result<T, PostboxError>;
