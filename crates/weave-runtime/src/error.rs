//! Runtime error types.

use thiserror::Error;
use weave_core::AopConfigError;

use crate::config::ConfigError;

/// Errors that can occur while assembling proxies.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An aspect or advisor is inconsistent.
    #[error("AOP configuration error: {0}")]
    Aop(#[from] AopConfigError),

    /// An aspect with this name is already registered.
    #[error("Aspect already registered: {0}")]
    AspectExists(String),

    /// No aspect with this name is registered.
    #[error("Aspect not found: {0}")]
    AspectNotFound(String),

    /// Configuration names an advice method the aspect does not declare.
    #[error("Aspect '{aspect}' declares no method '{method}'")]
    UnknownAdviceMethod { aspect: String, method: String },
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
