//! Shared error types for the membank workspace.

use thiserror::Error;

/// Top-level error type for membank operations.
#[derive(Error, Debug)]
pub enum MembankError {
    /// The requested record was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A storage backend error occurred.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A configuration error occurred.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for MembankError {
    fn from(e: serde_json::Error) -> Self {
        MembankError::Serialization(e.to_string())
    }
}

/// Alias for Result with MembankError.
pub type MembankResult<T> = Result<T, MembankError>;
