//! Normalization of advice contracts into interceptors.
//!
//! The [`AdapterRegistry`] holds an ordered table of [`AdvisorAdapter`]s.
//! Each adapter recognizes one advice contract and wraps it into a
//! [`MethodInterceptor`]. Advice that already is an interceptor is used as is
//! and always comes first; the built-in adapters follow in the order before,
//! after-returning, throws. Custom adapters are appended after them.

use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::error::{AopConfigError, AopResult, InvocationResult};
use crate::framework::advice::{
    Advice, AfterReturningAdvice, BeforeAdvice, BoxedAdvice, MethodInterceptor, ThrowsAdvice,
    ThrowsContext, ThrowsOutcome,
};
use crate::framework::invocation::MethodInvocation;

/// Recognizes one advice contract and wraps it into an interceptor.
pub trait AdvisorAdapter: Send + Sync {
    /// Returns whether `advice` fulfils the contract this adapter handles.
    fn supports(&self, advice: &BoxedAdvice) -> bool;

    /// Wraps `advice` into an interceptor. Only called when [`supports`](Self::supports) holds.
    fn interceptor(&self, advice: &BoxedAdvice) -> AopResult<Arc<dyn MethodInterceptor>>;
}

// ============================================================================
// Built-in interceptors
// ============================================================================

/// Runs before advice, then proceeds.
pub struct BeforeAdviceInterceptor {
    advice: Arc<dyn BeforeAdvice>,
}

impl BeforeAdviceInterceptor {
    pub fn new(advice: Arc<dyn BeforeAdvice>) -> Self {
        Self { advice }
    }
}

impl MethodInterceptor for BeforeAdviceInterceptor {
    fn invoke(&self, invocation: &mut MethodInvocation) -> InvocationResult {
        self.advice.before(
            invocation.method(),
            invocation.arguments(),
            invocation.target().as_ref(),
        )?;
        invocation.proceed()
    }
}

/// Proceeds, then runs after-returning advice with the result.
pub struct AfterReturningAdviceInterceptor {
    advice: Arc<dyn AfterReturningAdvice>,
}

impl AfterReturningAdviceInterceptor {
    pub fn new(advice: Arc<dyn AfterReturningAdvice>) -> Self {
        Self { advice }
    }
}

impl MethodInterceptor for AfterReturningAdviceInterceptor {
    fn invoke(&self, invocation: &mut MethodInvocation) -> InvocationResult {
        let result = invocation.proceed()?;
        self.advice.after_returning(
            result.as_ref(),
            invocation.method(),
            invocation.arguments(),
            invocation.target().as_ref(),
        )?;
        Ok(result)
    }
}

/// Proceeds and hands raised errors to the most specific throws handler.
pub struct ThrowsAdviceInterceptor {
    advice: Arc<ThrowsAdvice>,
}

impl ThrowsAdviceInterceptor {
    /// Fails when the advice registers no handler or a handler for a non-error type.
    pub fn new(advice: Arc<ThrowsAdvice>) -> AopResult<Self> {
        if advice.handler_count() == 0 {
            return Err(AopConfigError::Invalid(format!(
                "throws advice '{}' registers no handlers",
                advice.name()
            )));
        }
        if let Some(ty) = advice.handled_types().find(|ty| !ty.is_error()) {
            return Err(AopConfigError::Invalid(format!(
                "throws advice '{}' registers a handler for non-error type '{ty}'",
                advice.name()
            )));
        }
        Ok(Self { advice })
    }
}

impl MethodInterceptor for ThrowsAdviceInterceptor {
    fn invoke(&self, invocation: &mut MethodInvocation) -> InvocationResult {
        let error = match invocation.proceed() {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        let Some(thrown) = error.as_thrown() else {
            return Err(error);
        };

        let ctx = ThrowsContext {
            error: thrown,
            method: invocation.method(),
            args: invocation.arguments(),
            target: invocation.target().as_ref(),
        };
        match self.advice.handle(&ctx) {
            None => {
                trace!(error = %thrown, "No throws handler matched");
                Err(error)
            }
            Some(Ok(ThrowsOutcome::Rethrow)) => Err(error),
            Some(Ok(ThrowsOutcome::Recover(value))) => {
                debug!(error = %thrown, "Throws handler recovered from error");
                Ok(value)
            }
            Some(Err(handler_error)) => Err(handler_error),
        }
    }
}

// ============================================================================
// Built-in adapters
// ============================================================================

struct BeforeAdviceAdapter;

impl AdvisorAdapter for BeforeAdviceAdapter {
    fn supports(&self, advice: &BoxedAdvice) -> bool {
        Arc::clone(advice).as_before().is_some()
    }

    fn interceptor(&self, advice: &BoxedAdvice) -> AopResult<Arc<dyn MethodInterceptor>> {
        let before = Arc::clone(advice)
            .as_before()
            .ok_or_else(|| AopConfigError::UnknownAdviceType(advice.name()))?;
        Ok(Arc::new(BeforeAdviceInterceptor::new(before)))
    }
}

struct AfterReturningAdviceAdapter;

impl AdvisorAdapter for AfterReturningAdviceAdapter {
    fn supports(&self, advice: &BoxedAdvice) -> bool {
        Arc::clone(advice).as_after_returning().is_some()
    }

    fn interceptor(&self, advice: &BoxedAdvice) -> AopResult<Arc<dyn MethodInterceptor>> {
        let after = Arc::clone(advice)
            .as_after_returning()
            .ok_or_else(|| AopConfigError::UnknownAdviceType(advice.name()))?;
        Ok(Arc::new(AfterReturningAdviceInterceptor::new(after)))
    }
}

struct ThrowsAdviceAdapter;

impl AdvisorAdapter for ThrowsAdviceAdapter {
    fn supports(&self, advice: &BoxedAdvice) -> bool {
        Arc::clone(advice).as_throws().is_some()
    }

    fn interceptor(&self, advice: &BoxedAdvice) -> AopResult<Arc<dyn MethodInterceptor>> {
        let throws = Arc::clone(advice)
            .as_throws()
            .ok_or_else(|| AopConfigError::UnknownAdviceType(advice.name()))?;
        Ok(Arc::new(ThrowsAdviceInterceptor::new(throws)?))
    }
}

// ============================================================================
// Registry
// ============================================================================

/// The ordered table of advice adapters.
pub struct AdapterRegistry {
    adapters: RwLock<Vec<Arc<dyn AdvisorAdapter>>>,
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AdapterRegistry {
    /// Creates a registry with the built-in adapters.
    pub fn new() -> Self {
        let adapters: Vec<Arc<dyn AdvisorAdapter>> = vec![
            Arc::new(BeforeAdviceAdapter),
            Arc::new(AfterReturningAdviceAdapter),
            Arc::new(ThrowsAdviceAdapter),
        ];
        Self {
            adapters: RwLock::new(adapters),
        }
    }

    /// The process-wide registry used by default chain factories.
    pub fn global() -> Arc<AdapterRegistry> {
        static GLOBAL: OnceLock<Arc<AdapterRegistry>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(AdapterRegistry::new())))
    }

    /// Appends a custom adapter after the existing ones.
    pub fn register(&self, adapter: Arc<dyn AdvisorAdapter>) {
        let mut adapters = self.adapters.write();
        adapters.push(adapter);
        debug!(adapter_count = adapters.len(), "Registered advice adapter");
    }

    pub fn adapter_count(&self) -> usize {
        self.adapters.read().len()
    }

    /// Wraps an interceptor as-is or adapts it through every supporting adapter.
    pub fn wrap(&self, advice: &BoxedAdvice) -> AopResult<Arc<dyn MethodInterceptor>> {
        if let Some(interceptor) = Arc::clone(advice).as_interceptor() {
            return Ok(interceptor);
        }
        let adapters = self.adapters.read();
        match adapters.iter().find(|adapter| adapter.supports(advice)) {
            Some(adapter) => adapter.interceptor(advice),
            None => Err(AopConfigError::UnknownAdviceType(advice.name())),
        }
    }

    /// Normalizes `advice` into one interceptor per contract it fulfils.
    ///
    /// Fails when no contract is recognized.
    pub fn interceptors(&self, advice: &BoxedAdvice) -> AopResult<Vec<Arc<dyn MethodInterceptor>>> {
        let mut interceptors = Vec::new();
        if let Some(interceptor) = Arc::clone(advice).as_interceptor() {
            interceptors.push(interceptor);
        }
        for adapter in self.adapters.read().iter() {
            if adapter.supports(advice) {
                interceptors.push(adapter.interceptor(advice)?);
            }
        }
        if interceptors.is_empty() {
            return Err(AopConfigError::UnknownAdviceType(advice.name()));
        }
        trace!(
            advice = %advice.name(),
            interceptor_count = interceptors.len(),
            "Normalized advice"
        );
        Ok(interceptors)
    }
}
