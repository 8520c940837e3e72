//! Configuration module for the Weave runtime.
//!
//! Loads logging, proxy and per-aspect settings from files, environment
//! variables and code, and validates them before use.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    AdviceConfig, AspectConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, ProxyConfig,
    SpanEventConfig, WeaveConfig,
};
pub use validation::validate_config;
