//! Advice contracts.
//!
//! Advice is the cross-cutting code run around an intercepted call. Four
//! contracts exist:
//!
//! | Contract | Runs |
//! |---|---|
//! | [`MethodInterceptor`] (around) | in place of the call; decides whether to proceed |
//! | [`BeforeAdvice`] | before the call |
//! | [`AfterReturningAdvice`] | after a normal return |
//! | [`ThrowsAdvice`] | after the call raised an error |
//!
//! An advice object advertises the contracts it fulfils through the facet
//! methods of [`Advice`]. One object may fulfil several contracts; the
//! [`AdapterRegistry`](crate::framework::adapter::AdapterRegistry) turns each
//! one into an interceptor.
//!
//! ```rust,ignore
//! use weave_core::advice;
//!
//! let log = advice::before(|method, _args, _target| {
//!     tracing::info!(%method, "calling");
//!     Ok(())
//! });
//!
//! let timing = advice::around(|invocation| {
//!     let start = std::time::Instant::now();
//!     let result = invocation.proceed();
//!     tracing::info!(elapsed = ?start.elapsed(), "call finished");
//!     result
//! });
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{InvocationError, InvocationResult, Throwable};
use crate::foundation::{Method, Target, Type, Value};
use crate::framework::invocation::MethodInvocation;

/// A shared advice object.
pub type BoxedAdvice = Arc<dyn Advice>;

/// The uniform interceptor form every advice contract is normalized into.
pub trait MethodInterceptor: Send + Sync {
    /// Runs this interceptor; call [`MethodInvocation::proceed`] to continue the chain.
    fn invoke(&self, invocation: &mut MethodInvocation) -> InvocationResult;
}

impl<F> MethodInterceptor for F
where
    F: Fn(&mut MethodInvocation) -> InvocationResult + Send + Sync,
{
    fn invoke(&self, invocation: &mut MethodInvocation) -> InvocationResult {
        self(invocation)
    }
}

/// Runs before the intercepted call.
///
/// Returning an error aborts the call; the error propagates to the caller.
pub trait BeforeAdvice: Send + Sync {
    fn before(&self, method: &Method, args: &[Value], target: &dyn Target)
    -> Result<(), InvocationError>;
}

/// Runs after the intercepted call returned normally.
pub trait AfterReturningAdvice: Send + Sync {
    /// `return_value` is `None` for void methods.
    fn after_returning(
        &self,
        return_value: Option<&Value>,
        method: &Method,
        args: &[Value],
        target: &dyn Target,
    ) -> Result<(), InvocationError>;
}

/// An advice object, described by the contracts it fulfils.
///
/// Every facet defaults to "not supported". Implementors override the facets
/// for the contracts they implement by returning `Some(self)`.
pub trait Advice: Send + Sync + 'static {
    /// A name used in logs and error messages.
    fn name(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }

    fn as_interceptor(self: Arc<Self>) -> Option<Arc<dyn MethodInterceptor>> {
        None
    }

    fn as_before(self: Arc<Self>) -> Option<Arc<dyn BeforeAdvice>> {
        None
    }

    fn as_after_returning(self: Arc<Self>) -> Option<Arc<dyn AfterReturningAdvice>> {
        None
    }

    fn as_throws(self: Arc<Self>) -> Option<Arc<ThrowsAdvice>> {
        None
    }
}

// ============================================================================
// Throws advice
// ============================================================================

/// Everything an after-throwing handler can see.
pub struct ThrowsContext<'a> {
    pub error: &'a Throwable,
    pub method: &'a Method,
    pub args: &'a [Value],
    pub target: &'a dyn Target,
}

/// What a throws handler decided to do with the error.
#[derive(Debug, Clone)]
pub enum ThrowsOutcome {
    /// Re-raise the original error unchanged.
    Rethrow,
    /// Swallow the error and return this value to the caller instead.
    Recover(Option<Value>),
}

type ThrowsHandler =
    Arc<dyn Fn(&ThrowsContext<'_>) -> Result<ThrowsOutcome, InvocationError> + Send + Sync>;

/// A table of after-throwing handlers keyed by error type.
///
/// When a call raises an error, the handler registered for the most specific
/// type in the error's type hierarchy runs. Handlers rethrow by default;
/// recovering is an explicit per-handler choice made with [`recover`](Self::recover).
///
/// ```rust,ignore
/// let advice = ThrowsAdvice::new("audit")
///     .on(&Type::error(), |ctx| {
///         tracing::warn!(error = %ctx.error, "call failed");
///         Ok(())
///     })
///     .recover(&not_found, |_| Ok(None));
/// ```
#[derive(Clone)]
pub struct ThrowsAdvice {
    name: String,
    handlers: HashMap<Type, ThrowsHandler>,
}

impl ThrowsAdvice {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handlers: HashMap::new(),
        }
    }

    /// Registers a handler for `error_type`; the error is rethrown afterwards.
    pub fn on<F>(mut self, error_type: &Type, handler: F) -> Self
    where
        F: Fn(&ThrowsContext<'_>) -> Result<(), InvocationError> + Send + Sync + 'static,
    {
        self.handlers.insert(
            error_type.clone(),
            Arc::new(move |ctx: &ThrowsContext<'_>| {
                handler(ctx).map(|()| ThrowsOutcome::Rethrow)
            }),
        );
        self
    }

    /// Registers a handler for `error_type` that swallows the error and
    /// returns the handler's value to the caller.
    pub fn recover<F>(mut self, error_type: &Type, handler: F) -> Self
    where
        F: Fn(&ThrowsContext<'_>) -> Result<Option<Value>, InvocationError>
            + Send
            + Sync
            + 'static,
    {
        self.handlers.insert(
            error_type.clone(),
            Arc::new(move |ctx: &ThrowsContext<'_>| {
                handler(ctx).map(ThrowsOutcome::Recover)
            }),
        );
        self
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// The registered error types, in no particular order.
    pub fn handled_types(&self) -> impl Iterator<Item = &Type> {
        self.handlers.keys()
    }

    /// Runs the most specific handler for `ctx.error`.
    ///
    /// Returns `None` when no handler applies.
    pub fn handle(&self, ctx: &ThrowsContext<'_>) -> Option<Result<ThrowsOutcome, InvocationError>> {
        ctx.error
            .error_type()
            .ancestors()
            .find_map(|ty| self.handlers.get(ty))
            .map(|handler| handler(ctx))
    }
}

impl Advice for ThrowsAdvice {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn as_throws(self: Arc<Self>) -> Option<Arc<ThrowsAdvice>> {
        Some(self)
    }
}

impl fmt::Debug for ThrowsAdvice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThrowsAdvice")
            .field("name", &self.name)
            .field("handled_types", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ============================================================================
// Closure-backed advice
// ============================================================================

struct AroundFn<F>(F);

impl<F> MethodInterceptor for AroundFn<F>
where
    F: Fn(&mut MethodInvocation) -> InvocationResult + Send + Sync,
{
    fn invoke(&self, invocation: &mut MethodInvocation) -> InvocationResult {
        (self.0)(invocation)
    }
}

impl<F> Advice for AroundFn<F>
where
    F: Fn(&mut MethodInvocation) -> InvocationResult + Send + Sync + 'static,
{
    fn name(&self) -> String {
        "around".to_string()
    }

    fn as_interceptor(self: Arc<Self>) -> Option<Arc<dyn MethodInterceptor>> {
        Some(self)
    }
}

struct BeforeFn<F>(F);

impl<F> BeforeAdvice for BeforeFn<F>
where
    F: Fn(&Method, &[Value], &dyn Target) -> Result<(), InvocationError> + Send + Sync,
{
    fn before(
        &self,
        method: &Method,
        args: &[Value],
        target: &dyn Target,
    ) -> Result<(), InvocationError> {
        (self.0)(method, args, target)
    }
}

impl<F> Advice for BeforeFn<F>
where
    F: Fn(&Method, &[Value], &dyn Target) -> Result<(), InvocationError> + Send + Sync + 'static,
{
    fn name(&self) -> String {
        "before".to_string()
    }

    fn as_before(self: Arc<Self>) -> Option<Arc<dyn BeforeAdvice>> {
        Some(self)
    }
}

struct AfterReturningFn<F>(F);

impl<F> AfterReturningAdvice for AfterReturningFn<F>
where
    F: Fn(Option<&Value>, &Method, &[Value], &dyn Target) -> Result<(), InvocationError>
        + Send
        + Sync,
{
    fn after_returning(
        &self,
        return_value: Option<&Value>,
        method: &Method,
        args: &[Value],
        target: &dyn Target,
    ) -> Result<(), InvocationError> {
        (self.0)(return_value, method, args, target)
    }
}

impl<F> Advice for AfterReturningFn<F>
where
    F: Fn(Option<&Value>, &Method, &[Value], &dyn Target) -> Result<(), InvocationError>
        + Send
        + Sync
        + 'static,
{
    fn name(&self) -> String {
        "after-returning".to_string()
    }

    fn as_after_returning(self: Arc<Self>) -> Option<Arc<dyn AfterReturningAdvice>> {
        Some(self)
    }
}

/// Creates around advice from a closure.
pub fn around<F>(f: F) -> BoxedAdvice
where
    F: Fn(&mut MethodInvocation) -> InvocationResult + Send + Sync + 'static,
{
    Arc::new(AroundFn(f))
}

/// Creates before advice from a closure.
pub fn before<F>(f: F) -> BoxedAdvice
where
    F: Fn(&Method, &[Value], &dyn Target) -> Result<(), InvocationError> + Send + Sync + 'static,
{
    Arc::new(BeforeFn(f))
}

/// Creates after-returning advice from a closure.
pub fn after_returning<F>(f: F) -> BoxedAdvice
where
    F: Fn(Option<&Value>, &Method, &[Value], &dyn Target) -> Result<(), InvocationError>
        + Send
        + Sync
        + 'static,
{
    Arc::new(AfterReturningFn(f))
}
