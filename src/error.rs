//! Custom error types and handling
//!
//! This module defines the adapter's error types. Validation rejections
//! (bad filter ranges, nothing matched) are reported as `false` by the
//! adapter and never surface here.

use crate::config::ConfigError;

/// Adapter-wide error type
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    // Construction errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    // Caller errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Expected exactly one matching rule, found {matched}")]
    NotUnique { matched: usize },

    // Store errors
    #[error("Database error: {0}")]
    Database(String),
}

impl AdapterError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::NotUnique { .. } => "NOT_UNIQUE",
            Self::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Whether the error came from the store rather than from the caller
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

impl From<sqlx::Error> for AdapterError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(e) => AdapterError::Configuration(e.to_string()),
            sqlx::Error::Database(db_err) => AdapterError::Database(db_err.to_string()),
            _ => AdapterError::Database(err.to_string()),
        }
    }
}

impl From<ConfigError> for AdapterError {
    fn from(err: ConfigError) -> Self {
        AdapterError::Configuration(err.to_string())
    }
}

/// Result type alias using AdapterError
pub type AdapterResult<T> = Result<T, AdapterError>;
