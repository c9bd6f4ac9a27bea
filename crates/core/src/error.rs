//! Core Error Types
//!
//! Foundational error types shared by the Counsel Desk workspace crates.
//! Kept dependency-free (only thiserror + std) so the core crate stays
//! lightweight. The application crate wraps these in its own `AppError`
//! alongside storage and network variants.

use thiserror::Error;

/// Core error type for tool definition, registration, and execution.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A tool ran and failed
    #[error("Execution error: {0}")]
    Execution(String),

    /// Validation errors (bad arguments, unknown columns, missing fields)
    #[error("Validation error: {0}")]
    Validation(String),

    /// A tool asked for a capability its partition does not grant
    #[error("Capability denied: {0}")]
    Denied(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for core errors
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an execution error
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a capability-denied error
    pub fn denied(msg: impl Into<String>) -> Self {
        Self::Denied(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
