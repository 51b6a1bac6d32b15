//! Core Error Types
//!
//! Defines the foundational error taxonomy used across the Cellflow workspace.
//! These error types are dependency-free (only thiserror + std) to keep the core
//! crate lightweight.
//!
//! The main application crate extends these with additional error variants
//! (e.g., Database, Sqlite) that require heavier dependencies.

use thiserror::Error;

/// Core error type for the Cellflow workspace.
///
/// This is the minimal error set that the core crate needs. The application
/// crate defines additional variants for storage, etc.
#[derive(Error, Debug)]
pub enum CoreError {
    /// No workbook backend is attached to the conversation
    #[error("No workbook connected")]
    NotConnected,

    /// Malformed or ill-typed tool-call arguments
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Operation name not present in the catalog
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// Wrapped downstream document-backend failure
    #[error("Backend error: {0}")]
    Backend(String),

    /// Operation exceeded its deadline
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Task short-circuited because it failed repeatedly
    #[error("Recurrent failure: {0}")]
    RecurrentFailure(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for core errors
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Create an invalid-payload error
    pub fn invalid_payload(msg: impl Into<String>) -> Self {
        Self::InvalidPayload(msg.into())
    }

    /// Create an unknown-operation error
    pub fn unknown_operation(msg: impl Into<String>) -> Self {
        Self::UnknownOperation(msg.into())
    }

    /// Create a backend error
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a recurrent-failure error
    pub fn recurrent(msg: impl Into<String>) -> Self {
        Self::RecurrentFailure(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Convert CoreError to a string
impl From<CoreError> for String {
    fn from(err: CoreError) -> String {
        err.to_string()
    }
}
