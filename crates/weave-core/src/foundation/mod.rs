//! Foundation layer - the runtime model interception works over.
//!
//! - [`Type`]: named types with single inheritance
//! - [`Method`]: interceptable method descriptors and their [`MethodKey`]
//! - [`Value`]: type-erased arguments and return values
//! - [`Target`]: the real object behind a proxy

pub mod method;
pub mod target;
pub mod types;
pub mod value;

pub use method::{Method, MethodKey};
pub use target::{BoxedTarget, Target, TargetSource};
pub use types::Type;
pub use value::Value;
