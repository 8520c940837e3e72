//! # Weave Core
//!
//! The method interception engine of the Weave AOP toolkit.
//!
//! Callers talk to a [`Proxy`] instead of the real object. Each call is run
//! through an ordered chain of interceptors built from the advisors whose
//! pointcuts match the called method, and finally reaches the target.
//!
//! ## Architecture Layers
//!
//! ### Foundation Layer
//!
//! The runtime model interception works over:
//! - **Types and methods**: [`Type`], [`Method`] and [`MethodKey`]
//! - **Values**: type-erased arguments and results ([`Value`])
//! - **Targets**: the real objects behind proxies ([`Target`], [`TargetSource`])
//!
//! ### Framework Layer
//!
//! Matching, normalization and execution:
//! - **Pointcuts**: type and method filters ([`Pointcut`])
//! - **Advice**: around, before, after-returning and throws contracts ([`Advice`])
//! - **Adapters**: normalization into [`MethodInterceptor`]s ([`AdapterRegistry`])
//! - **Chains**: per-method chain construction ([`DefaultChainFactory`])
//! - **Invocations**: the `proceed` protocol ([`MethodInvocation`])
//! - **Context**: the current join point of the running thread ([`current_join_point`])
//!
//! ### Proxy Layer
//!
//! - **Configuration**: advisors and the chain cache ([`AdvisedSupport`])
//! - **Front door**: [`ProxyFactory`] and [`Proxy`], which is also a Tower service
//!
//! ## Call Flow
//!
//! ```text
//! ┌────────┐     ┌───────┐     ┌──────────────┐     ┌──────────────┐     ┌────────┐
//! │ Caller │────▶│ Proxy │────▶│ Interceptor  │────▶│ Interceptor  │────▶│ Target │
//! └────────┘     └───────┘     │ (proceed)    │     │ (proceed)    │     └────────┘
//!                              └──────────────┘     └──────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use weave_core::prelude::*;
//!
//! struct Greeter;
//!
//! impl Target for Greeter {
//!     fn target_type(&self) -> Type {
//!         Type::new("Greeter")
//!     }
//!
//!     fn invoke(&self, _method: &Method, args: &[Value]) -> InvocationResult {
//!         Ok(Some(Value::string(format!("hello {}", args[0].as_str().unwrap_or("?")))))
//!     }
//! }
//!
//! let greet = Method::new(&Type::new("Greeter"), "greet").param(Type::string());
//! let proxy = ProxyFactory::new(TargetSource::new(Greeter))
//!     .advice(advice::around(|inv| {
//!         tracing::info!(method = %inv.method(), "entering");
//!         inv.proceed()
//!     }))
//!     .get_proxy();
//!
//! let greeting = proxy.invoke(&greet, vec![Value::string("world")])?;
//! ```

// Architectural layers
pub mod error;
pub mod foundation;
pub mod framework;
pub mod proxy;

pub use error::{AopConfigError, AopResult, InvocationError, InvocationResult, Throwable};

// Re-export foundation types
pub use foundation::{BoxedTarget, Method, MethodKey, Target, TargetSource, Type, Value};

// Re-export framework types
pub use framework::advice;
pub use framework::{
    AdapterRegistry, Advice, Advisor, AdvisorAdapter, AfterReturningAdvice, BeforeAdvice,
    BoxedAdvice, BoxedAdvisor, ChainFactory, DefaultChainFactory, DefaultPointcutAdvisor,
    ExposeInvocationInterceptor, InterceptorChain, JoinPoint, MatchAll, MethodFilter,
    MethodInterceptor, MethodInvocation, NameMatchMethodFilter, Pointcut, ProceedingJoinPoint,
    StaticPart, ThrowsAdvice, ThrowsContext, ThrowsOutcome, TypeFilter, TypeHierarchyFilter,
    current_join_point, expose_invocation_advisor, try_current_join_point,
};

// Re-export proxy types
pub use proxy::{
    AdvisedSupport, InterfaceProxy, MethodCall, Proxy, ProxyFactory, ProxySettings, ProxyStrategy,
    SubtypeProxy,
};

/// Prelude for common imports.
pub mod prelude {
    pub use super::error::{InvocationError, InvocationResult, Throwable};
    pub use super::foundation::*;
    pub use super::framework::advice;
    pub use super::framework::{
        Advice, Advisor, BoxedAdvice, BoxedAdvisor, DefaultPointcutAdvisor, JoinPoint,
        MethodInterceptor, MethodInvocation, Pointcut, ProceedingJoinPoint, ThrowsAdvice,
        ThrowsOutcome, current_join_point,
    };
    pub use super::proxy::{MethodCall, Proxy, ProxyFactory};
}
