//! Framework layer - matching, advice normalization and chain execution.
//!
//! - [`pointcut`]: type and method filters
//! - [`advisor`]: rules pairing a pointcut with advice
//! - [`advice`]: the advice contracts and the uniform interceptor form
//! - [`adapter`]: normalization of advice into interceptors
//! - [`chain`]: per-method chain construction
//! - [`invocation`]: the `proceed` protocol
//! - [`joinpoint`]: join point views for advice code
//! - [`context`]: call-scoped exposure of the current join point

pub mod adapter;
pub mod advice;
pub mod advisor;
pub mod chain;
pub mod context;
pub mod invocation;
pub mod joinpoint;
pub mod pointcut;

pub use adapter::{
    AdapterRegistry, AdvisorAdapter, AfterReturningAdviceInterceptor, BeforeAdviceInterceptor,
    ThrowsAdviceInterceptor,
};
pub use advice::{
    Advice, AfterReturningAdvice, BeforeAdvice, BoxedAdvice, MethodInterceptor, ThrowsAdvice,
    ThrowsContext, ThrowsOutcome,
};
pub use advisor::{Advisor, BoxedAdvisor, DefaultPointcutAdvisor};
pub use chain::{ChainFactory, DefaultChainFactory};
pub use context::{
    ExposeInvocationInterceptor, ExposedScope, current_join_point, expose,
    expose_invocation_advisor, is_expose_invocation_advisor, try_current_join_point,
};
pub use invocation::{InterceptorChain, JOIN_POINT_ATTRIBUTE, MethodInvocation};
pub use joinpoint::{JoinPoint, METHOD_EXECUTION, ProceedingJoinPoint, StaticPart};
pub use pointcut::{
    MatchAll, MethodFilter, NameMatchMethodFilter, Pointcut, TypeFilter, TypeHierarchyFilter,
    simple_match,
};
