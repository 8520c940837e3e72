//! Call-scoped exposure of the current invocation.
//!
//! Some advice needs the join point of the call it runs in without being
//! handed the invocation, for example before advice built from declarative
//! metadata. [`ExposeInvocationInterceptor`] publishes the join point of each
//! call for the duration of the rest of the chain; [`current_join_point`]
//! reads it back.
//!
//! Exposure is per thread and nests: a re-entrant proxied call on the same
//! thread sees its own join point, and the outer one is restored when the
//! inner call returns, errors or unwinds.
//!
//! The exposing interceptor must be the first one in the chain; use
//! [`expose_invocation_advisor`] to register it.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock};

use tracing::trace;

use crate::error::{InvocationError, InvocationResult};
use crate::framework::advice::{Advice, MethodInterceptor};
use crate::framework::advisor::{BoxedAdvisor, DefaultPointcutAdvisor};
use crate::framework::invocation::MethodInvocation;
use crate::framework::joinpoint::JoinPoint;

thread_local! {
    static CURRENT: RefCell<Vec<JoinPoint>> = const { RefCell::new(Vec::new()) };
}

/// Keeps a join point exposed until dropped.
///
/// Scopes must be dropped in reverse order of creation, which holds
/// naturally for guards bound to a local.
#[must_use = "the join point is only exposed while the scope is alive"]
pub struct ExposedScope {
    // Exposure is per thread; the guard must not move to another one.
    _not_send: PhantomData<*const ()>,
}

impl Drop for ExposedScope {
    fn drop(&mut self) {
        CURRENT.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Exposes `join_point` as the current one until the returned scope drops.
pub fn expose(join_point: JoinPoint) -> ExposedScope {
    CURRENT.with(|stack| stack.borrow_mut().push(join_point));
    ExposedScope {
        _not_send: PhantomData,
    }
}

/// Returns the join point of the innermost exposed call on this thread.
pub fn try_current_join_point() -> Option<JoinPoint> {
    CURRENT.with(|stack| stack.borrow().last().cloned())
}

/// Returns the join point of the innermost exposed call on this thread.
///
/// Fails when no call is exposed, which means the exposing interceptor is
/// missing, is not first in the chain, or the advice runs on another thread.
pub fn current_join_point() -> Result<JoinPoint, InvocationError> {
    try_current_join_point().ok_or_else(|| {
        InvocationError::NoCurrentInvocation(
            "no join point is exposed on this thread. Check that the invocation-exposing \
             advisor is the first in the chain and that advice runs on the calling thread"
                .to_string(),
        )
    })
}

/// Number of nested exposed calls on this thread.
pub fn exposure_depth() -> usize {
    CURRENT.with(|stack| stack.borrow().len())
}

// ============================================================================
// Exposing interceptor
// ============================================================================

/// Publishes the join point of every call it intercepts.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExposeInvocationInterceptor;

impl MethodInterceptor for ExposeInvocationInterceptor {
    fn invoke(&self, invocation: &mut MethodInvocation) -> InvocationResult {
        let _scope = expose(invocation.join_point());
        trace!(
            method = %invocation.method(),
            depth = exposure_depth(),
            "Exposed invocation"
        );
        invocation.proceed()
    }
}

impl Advice for ExposeInvocationInterceptor {
    fn name(&self) -> String {
        "expose-invocation".to_string()
    }

    fn as_interceptor(self: Arc<Self>) -> Option<Arc<dyn MethodInterceptor>> {
        Some(self)
    }
}

/// The shared advisor that runs [`ExposeInvocationInterceptor`] on every call.
pub fn expose_invocation_advisor() -> BoxedAdvisor {
    static ADVISOR: OnceLock<BoxedAdvisor> = OnceLock::new();
    ADVISOR
        .get_or_init(|| Arc::new(DefaultPointcutAdvisor::new(Arc::new(ExposeInvocationInterceptor))))
        .clone()
}

/// Returns whether `advisor` is the shared exposing advisor.
pub fn is_expose_invocation_advisor(advisor: &BoxedAdvisor) -> bool {
    Arc::ptr_eq(advisor, &expose_invocation_advisor())
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::thread;

    use super::*;
    use crate::error::Throwable;
    use crate::foundation::{Method, Target, Type, Value};
    use crate::framework::invocation::InterceptorChain;

    struct Nested;

    impl Target for Nested {
        fn target_type(&self) -> Type {
            Type::new("Nested")
        }

        fn invoke(&self, method: &Method, _args: &[Value]) -> InvocationResult {
            let current = current_join_point()?;
            assert_eq!(current.signature(), method);
            if method.name() == "fail" {
                return Err(Throwable::new(Type::error(), "failed").into());
            }
            Ok(Some(Value::integer(exposure_depth() as i64)))
        }
    }

    fn exposing_chain() -> InterceptorChain {
        let interceptor: Arc<dyn MethodInterceptor> = Arc::new(ExposeInvocationInterceptor);
        Arc::from(vec![interceptor])
    }

    #[test]
    fn test_missing_exposure_is_an_error() {
        let err = current_join_point().unwrap_err();
        assert!(matches!(err, InvocationError::NoCurrentInvocation(_)));
        assert!(err.to_string().contains("first in the chain"));
    }

    #[test]
    fn test_exposed_during_call_and_cleared_after() {
        let method = Method::new(&Type::new("Nested"), "ok");
        let mut inv = MethodInvocation::new(Arc::new(Nested), method, vec![], exposing_chain());
        let depth = inv.proceed().unwrap().and_then(|v| v.as_integer());
        assert_eq!(depth, Some(1));
        assert_eq!(exposure_depth(), 0);
    }

    #[test]
    fn test_restored_after_error() {
        let method = Method::new(&Type::new("Nested"), "fail");
        let mut inv = MethodInvocation::new(Arc::new(Nested), method, vec![], exposing_chain());
        assert!(inv.proceed().is_err());
        assert!(try_current_join_point().is_none());
    }

    #[test]
    fn test_nested_exposure_restores_outer() {
        let outer_method = Method::new(&Type::new("Nested"), "outer");
        let outer = MethodInvocation::new(Arc::new(Nested), outer_method.clone(), vec![], exposing_chain());
        let _outer_scope = expose(JoinPoint::new(&outer));

        let inner_method = Method::new(&Type::new("Nested"), "inner");
        let mut inner = MethodInvocation::new(Arc::new(Nested), inner_method, vec![], exposing_chain());
        assert_eq!(inner.proceed().unwrap().and_then(|v| v.as_integer()), Some(2));

        let restored = current_join_point().unwrap();
        assert_eq!(restored.signature(), &outer_method);
    }

    #[test]
    fn test_exposure_stays_on_its_thread() {
        let outer_method = Method::new(&Type::new("Nested"), "outer");
        let outer = MethodInvocation::new(Arc::new(Nested), outer_method.clone(), vec![], exposing_chain());
        let _outer_scope = expose(JoinPoint::new(&outer));
        let barrier = Barrier::new(4);

        let depths: Vec<Option<i64>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|i| {
                    let barrier = &barrier;
                    scope.spawn(move || {
                        assert!(try_current_join_point().is_none());
                        barrier.wait();
                        // The target checks it sees its own call, not a sibling's.
                        let method = Method::new(&Type::new("Nested"), format!("call_{i}"));
                        let mut inv = MethodInvocation::new(Arc::new(Nested), method, vec![], exposing_chain());
                        let depth = inv.proceed().unwrap().and_then(|v| v.as_integer());
                        assert_eq!(exposure_depth(), 0);
                        depth
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .collect()
        });

        assert_eq!(depths, vec![Some(1); 4]);
        assert_eq!(current_join_point().unwrap().signature(), &outer_method);
        assert_eq!(exposure_depth(), 1);
    }

    #[test]
    fn test_shared_advisor() {
        assert!(is_expose_invocation_advisor(&expose_invocation_advisor()));
    }
}
