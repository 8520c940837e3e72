//! Weave Runtime - configuration, logging and proxy assembly.
//!
//! This crate provides:
//! - Layered configuration loading and validation (`config`)
//! - `tracing-subscriber` setup driven by that configuration (`logging`)
//! - The [`Weaver`], which turns registered aspects into proxies
//!
//! ```ignore
//! use weave_runtime::Weaver;
//!
//! let weaver = Weaver::builder(Arc::new(my_parser)).build()?;
//! weaver.register_singleton(audit_metadata, audit_instance)?;
//!
//! let proxy = weaver.proxy(TargetSource::new(Lecturer));
//! let lecture = proxy.invoke(&teach, vec![Value::string("rust")])?;
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod weaver;

// Re-exports
pub use config::{ConfigError, ConfigLoader, ConfigResult, WeaveConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use weaver::{Weaver, WeaverBuilder, WeaverStats};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros for application code.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
