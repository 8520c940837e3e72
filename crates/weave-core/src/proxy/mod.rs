//! Proxy layer - the front door callers use in place of the target.
//!
//! - [`AdvisedSupport`]: advisors, target and the memoized chains
//! - [`ProxyFactory`]: builds a [`Proxy`] with the right shape
//! - [`MethodCall`]: the request type of the Tower integration

pub mod config;
pub mod factory;
pub mod service;

pub use config::{AdvisedSupport, ProxySettings};
pub use factory::{InterfaceProxy, Proxy, ProxyFactory, ProxyStrategy, SubtypeProxy};
pub use service::MethodCall;
