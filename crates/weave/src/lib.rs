//! # Weave
//!
//! Method interception and aspect weaving for Rust.
//!
//! ## Overview
//!
//! Weave puts a proxy in front of an object. Every call through the proxy
//! runs an ordered chain of interceptors, built from the advisors whose
//! pointcuts match the called method, before it reaches the real object.
//! Advice can be written imperatively as closures or declaratively as aspect
//! methods with match expressions and bound arguments.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────┐     ┌────────────────────────┐     ┌────────┐
//! │ Weaver │────▶│ Proxy                  │────▶│ Target │
//! │(config,│     │  expose → around →     │     └────────┘
//! │aspects)│     │  before → after → ...  │
//! └────────┘     └────────────────────────┘
//! ```
//!
//! - **Core** (`weave-core`): types, pointcuts, advice contracts, chains,
//!   the `proceed` protocol and the proxy front door
//! - **Aspect** (`weave-aspect`): aspect metadata, argument binding and
//!   expression pointcuts over a pluggable matcher
//! - **Runtime** (`weave-runtime`): configuration, logging and the `Weaver`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use weave::prelude::*;
//!
//! let weaver = Weaver::builder(Arc::new(my_parser)).build()?;
//! weaver.register_singleton(
//!     AspectMetadata::new("Audit", Type::new("Audit")).method(
//!         AdviceMethod::new("log_entry", |_aspect, args| {
//!             info!(join_point = %args.join_point(0).unwrap(), "entering");
//!             Ok(None)
//!         })
//!         .param(Type::join_point())
//!         .before("execution(Lecturer.*)"),
//!     ),
//!     Value::string("audit"),
//! )?;
//!
//! let proxy = weaver.proxy(TargetSource::new(Lecturer));
//! proxy.invoke(&teach, vec![Value::string("rust")])?;
//! ```
//!
//! ## Features
//!
//! - `toml-config` *(default)*: load `weave.toml`
//! - `yaml-config`: load `weave.yaml`
//! - `json-log`: JSON log output
//! - `testing`: the fixture glob expression parser

pub use weave_aspect as aspect;
pub use weave_core as core;
pub use weave_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use weave::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use weave_runtime::{Weaver, WeaveConfig};

    // Foundation model
    pub use weave_core::prelude::*;

    // Declarative aspects
    pub use weave_aspect::prelude::*;

    // Logging macros
    pub use weave_runtime::prelude::*;
}
