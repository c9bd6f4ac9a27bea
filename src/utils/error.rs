//! Error Handling
//!
//! Unified error types for the application.
//! Uses thiserror for ergonomic error definitions.

use counsel_core::CoreError;
use counsel_llm::LlmError;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(String),

    /// SQLite errors (auto-converted from rusqlite::Error)
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool errors
    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Tool-layer errors
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Reasoning-call errors
    #[error("Reasoning call failed: {0}")]
    Llm(#[from] LlmError),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
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

/// Storage errors surface to tools as `CoreError`, keeping not-found and
/// validation distinct so the executor can classify the failure.
impl From<AppError> for CoreError {
    fn from(err: AppError) -> CoreError {
        match err {
            AppError::Core(inner) => inner,
            AppError::NotFound(msg) => CoreError::not_found(msg),
            AppError::Validation(msg) => CoreError::validation(msg),
            AppError::Serialization(e) => CoreError::Serialization(e),
            other => CoreError::execution(other.to_string()),
        }
    }
}
