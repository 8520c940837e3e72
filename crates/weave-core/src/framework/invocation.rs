//! The per-call execution record that drives an interceptor chain.
//!
//! A [`MethodInvocation`] is created by the proxy for every intercepted call.
//! Each interceptor receives it mutably and calls [`proceed`](MethodInvocation::proceed)
//! to hand control to the next interceptor; after the last interceptor the
//! real target method runs.
//!
//! ```text
//! proceed() ─▶ interceptor[0] ─▶ proceed() ─▶ interceptor[1] ─▶ proceed() ─▶ target
//!                    ▲                               ▲                          │
//!                    └────────── result ◀────────────┴──────── result ◀─────────┘
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::error::InvocationResult;
use crate::foundation::{BoxedTarget, Method, Type, Value};
use crate::framework::advice::MethodInterceptor;
use crate::framework::joinpoint::JoinPoint;
use crate::proxy::Proxy;

/// An ordered, shareable interceptor chain.
pub type InterceptorChain = Arc<[Arc<dyn MethodInterceptor>]>;

/// User attribute under which the computed [`JoinPoint`] is cached.
pub const JOIN_POINT_ATTRIBUTE: &str = "weave.join_point";

/// The mutable execution context of one intercepted call.
///
/// An invocation belongs to the call that created it. Interceptors that need
/// to run the rest of the chain more than once work on an
/// [`invocable_clone`](Self::invocable_clone), which shares the chain and
/// target but owns its own cursor and arguments.
#[derive(Clone)]
pub struct MethodInvocation {
    proxy: Option<Proxy>,
    target: BoxedTarget,
    target_type: Type,
    method: Method,
    arguments: Arc<Vec<Value>>,
    chain: InterceptorChain,
    /// Index of the interceptor currently running; `None` before the first.
    cursor: Option<usize>,
    attributes: HashMap<String, Value>,
}

impl MethodInvocation {
    /// Creates an invocation positioned before the first interceptor.
    pub fn new(target: BoxedTarget, method: Method, arguments: Vec<Value>, chain: InterceptorChain) -> Self {
        let target_type = target.target_type();
        Self {
            proxy: None,
            target,
            target_type,
            method,
            arguments: Arc::new(arguments),
            chain,
            cursor: None,
            attributes: HashMap::new(),
        }
    }

    /// Associates the proxy the call arrived through.
    pub fn with_proxy(mut self, proxy: Proxy) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Continues the chain.
    ///
    /// Runs the next interceptor, or the target method once every interceptor
    /// has been entered. Errors from the target propagate unchanged.
    pub fn proceed(&mut self) -> InvocationResult {
        let next = self.cursor.map_or(0, |cursor| cursor + 1);
        let Some(interceptor) = self.chain.get(next).cloned() else {
            trace!(method = %self.method, "Invoking join point");
            return self.target.invoke(&self.method, &self.arguments);
        };

        self.cursor = Some(next);
        trace!(method = %self.method, position = next, "Invoking interceptor");
        interceptor.invoke(self)
    }

    /// Returns a copy that can proceed independently from the current position.
    ///
    /// The copy shares the chain and target. Its arguments are copied on the
    /// first write, so changes made through either copy stay local.
    pub fn invocable_clone(&self) -> Self {
        self.clone()
    }

    /// Like [`invocable_clone`](Self::invocable_clone), with replaced arguments.
    pub fn invocable_clone_with(&self, arguments: Vec<Value>) -> Self {
        let mut clone = self.clone();
        clone.set_arguments(arguments);
        clone
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    /// Replaces the arguments seen by later interceptors and the target.
    pub fn set_arguments(&mut self, arguments: Vec<Value>) {
        self.arguments = Arc::new(arguments);
        self.attributes.remove(JOIN_POINT_ATTRIBUTE);
    }

    /// Mutable access to the arguments, copying them first if shared.
    pub fn arguments_mut(&mut self) -> &mut Vec<Value> {
        self.attributes.remove(JOIN_POINT_ATTRIBUTE);
        Arc::make_mut(&mut self.arguments)
    }

    pub fn target(&self) -> &BoxedTarget {
        &self.target
    }

    /// The runtime type of the target.
    pub fn target_type(&self) -> &Type {
        &self.target_type
    }

    pub fn proxy(&self) -> Option<&Proxy> {
        self.proxy.as_ref()
    }

    pub fn chain_len(&self) -> usize {
        self.chain.len()
    }

    /// Index of the interceptor currently running, if any has been entered.
    pub fn position(&self) -> Option<usize> {
        self.cursor
    }

    /// Stores a user attribute; `None` removes it.
    pub fn set_user_attribute(&mut self, key: impl Into<String>, value: Option<Value>) {
        let key = key.into();
        match value {
            Some(value) => {
                self.attributes.insert(key, value);
            }
            None => {
                self.attributes.remove(&key);
            }
        }
    }

    pub fn user_attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Returns the join point view of this call, computing and caching it on
    /// first use.
    pub fn join_point(&mut self) -> JoinPoint {
        if let Some(cached) = self
            .attributes
            .get(JOIN_POINT_ATTRIBUTE)
            .and_then(|value| value.downcast_ref::<JoinPoint>())
        {
            return cached.clone();
        }

        let join_point = JoinPoint::new(self);
        self.attributes.insert(
            JOIN_POINT_ATTRIBUTE.to_string(),
            Value::new(Type::join_point(), join_point.clone()),
        );
        join_point
    }

    pub(crate) fn shared_arguments(&self) -> Arc<Vec<Value>> {
        Arc::clone(&self.arguments)
    }
}

impl fmt::Debug for MethodInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodInvocation")
            .field("method", &self.method)
            .field("target_type", &self.target_type)
            .field("arguments", &self.arguments)
            .field("chain_len", &self.chain.len())
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use super::*;
    use crate::foundation::Target;

    struct Counter {
        calls: AtomicUsize,
        seen: Mutex<Vec<Vec<i64>>>,
    }

    impl Counter {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    impl Target for Counter {
        fn target_type(&self) -> Type {
            Type::new("Counter")
        }

        fn invoke(&self, _method: &Method, args: &[Value]) -> InvocationResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen
                .lock()
                .push(args.iter().filter_map(Value::as_integer).collect());
            Ok(Some(Value::integer(args.len() as i64)))
        }
    }

    fn method() -> Method {
        Method::new(&Type::new("Counter"), "count")
    }

    fn chain(interceptors: Vec<Arc<dyn MethodInterceptor>>) -> InterceptorChain {
        interceptors.into()
    }

    #[test]
    fn test_empty_chain_invokes_target_once() {
        let target = Counter::new();
        let mut inv = MethodInvocation::new(target.clone(), method(), vec![], chain(vec![]));
        inv.proceed().unwrap();
        assert_eq!(target.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_short_circuit_skips_target() {
        let target = Counter::new();
        let blocker: Arc<dyn MethodInterceptor> =
            Arc::new(|_: &mut MethodInvocation| -> InvocationResult { Ok(Some(Value::string("cached"))) });
        let mut inv = MethodInvocation::new(target.clone(), method(), vec![], chain(vec![blocker]));

        let result = inv.proceed().unwrap();
        assert_eq!(result.unwrap().as_str(), Some("cached"));
        assert_eq!(target.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_arguments_replaced_mid_chain_reach_target() {
        let target = Counter::new();
        let rewrite: Arc<dyn MethodInterceptor> = Arc::new(|inv: &mut MethodInvocation| {
            inv.set_arguments(vec![Value::integer(7), Value::integer(8)]);
            inv.proceed()
        });
        let mut inv = MethodInvocation::new(
            target.clone(),
            method(),
            vec![Value::integer(1)],
            chain(vec![rewrite]),
        );

        inv.proceed().unwrap();
        assert_eq!(*target.seen.lock(), vec![vec![7, 8]]);
    }

    #[test]
    fn test_clone_reruns_remaining_chain() {
        let target = Counter::new();
        let retry: Arc<dyn MethodInterceptor> = Arc::new(|inv: &mut MethodInvocation| {
            inv.invocable_clone_with(vec![Value::integer(1)]).proceed()?;
            inv.invocable_clone().proceed()
        });
        let mut inv = MethodInvocation::new(
            target.clone(),
            method(),
            vec![Value::integer(5)],
            chain(vec![retry]),
        );

        inv.proceed().unwrap();
        assert_eq!(target.calls.load(Ordering::SeqCst), 2);
        assert_eq!(*target.seen.lock(), vec![vec![1], vec![5]]);
        assert_eq!(inv.arguments()[0].as_integer(), Some(5));
    }

    #[test]
    fn test_user_attributes() {
        let mut inv = MethodInvocation::new(Counter::new(), method(), vec![], chain(vec![]));
        inv.set_user_attribute("k", Some(Value::boolean(true)));
        assert_eq!(inv.user_attribute("k").and_then(Value::as_boolean), Some(true));
        inv.set_user_attribute("k", None);
        assert!(inv.user_attribute("k").is_none());
    }

    #[test]
    fn test_join_point_cache_invalidated_by_new_arguments() {
        let mut inv = MethodInvocation::new(
            Counter::new(),
            method(),
            vec![Value::integer(1)],
            chain(vec![]),
        );
        let first = inv.join_point();
        assert!(first.ptr_eq(&inv.join_point()));

        inv.set_arguments(vec![Value::integer(2)]);
        let second = inv.join_point();
        assert!(!first.ptr_eq(&second));
        assert_eq!(second.args()[0].as_integer(), Some(2));
    }
}
