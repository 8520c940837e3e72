//! Configuration error types.

use std::path::PathBuf;

use thiserror::Error;
use weave_core::AopConfigError;

/// Errors that can occur during configuration loading and validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File not found at the specified path.
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// The configuration sources could not be parsed or extracted.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Invalid configuration value.
    #[error("Invalid configuration: {message}")]
    ValidationError { message: String },

    /// Missing required field.
    #[error("Missing required configuration field: {field}")]
    MissingField { field: String },

    /// Two aspect sections share a name.
    #[error("Duplicate aspect name: {0}")]
    DuplicateAspect(String),

    /// An advice entry carries an unusable descriptor.
    #[error("Invalid advice '{aspect}.{method}': {source}")]
    InvalidAdvice {
        aspect: String,
        method: String,
        #[source]
        source: AopConfigError,
    },
}

impl ConfigError {
    /// Creates a validation error with the given message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }

    /// Creates a missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Creates an invalid advice error.
    pub fn invalid_advice(
        aspect: impl Into<String>,
        method: impl Into<String>,
        source: AopConfigError,
    ) -> Self {
        Self::InvalidAdvice {
            aspect: aspect.into(),
            method: method.into(),
            source,
        }
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
