//! Join point views handed to advice code.
//!
//! - [`JoinPoint`]: a snapshot of one intercepted call
//! - [`StaticPart`]: the parts of a join point that do not change per call
//! - [`ProceedingJoinPoint`]: a join point that can continue the chain, given
//!   to around advice

use std::fmt;
use std::sync::Arc;

use crate::error::{AopConfigError, InvocationResult};
use crate::foundation::{BoxedTarget, Method, Type, Value};
use crate::framework::invocation::MethodInvocation;
use crate::proxy::Proxy;

/// The kind of every join point produced by method interception.
pub const METHOD_EXECUTION: &str = "method-execution";

struct JoinPointInner {
    method: Method,
    target: BoxedTarget,
    target_type: Type,
    proxy: Option<Proxy>,
    args: Arc<Vec<Value>>,
}

/// A read-only snapshot of an intercepted call.
///
/// The snapshot records the arguments as they were when it was taken.
#[derive(Clone)]
pub struct JoinPoint {
    inner: Arc<JoinPointInner>,
}

impl JoinPoint {
    /// Takes a snapshot of `invocation`.
    pub fn new(invocation: &MethodInvocation) -> Self {
        Self {
            inner: Arc::new(JoinPointInner {
                method: invocation.method().clone(),
                target: Arc::clone(invocation.target()),
                target_type: invocation.target_type().clone(),
                proxy: invocation.proxy().cloned(),
                args: invocation.shared_arguments(),
            }),
        }
    }

    pub fn kind(&self) -> &'static str {
        METHOD_EXECUTION
    }

    /// The intercepted method.
    pub fn signature(&self) -> &Method {
        &self.inner.method
    }

    pub fn args(&self) -> &[Value] {
        &self.inner.args
    }

    pub fn target(&self) -> &BoxedTarget {
        &self.inner.target
    }

    pub fn target_type(&self) -> &Type {
        &self.inner.target_type
    }

    /// The proxy the call arrived through, if it came through one.
    pub fn this(&self) -> Option<&Proxy> {
        self.inner.proxy.as_ref()
    }

    pub fn static_part(&self) -> StaticPart {
        StaticPart {
            method: self.inner.method.clone(),
        }
    }

    /// Returns this join point with `args` as its arguments.
    ///
    /// The snapshot itself is returned when `args` are the arguments it
    /// already holds; otherwise a new snapshot shares everything but the
    /// arguments.
    pub fn with_args(&self, args: &[Value]) -> JoinPoint {
        let unchanged = self.inner.args.len() == args.len()
            && self.inner.args.iter().zip(args).all(|(held, live)| held.ptr_eq(live));
        if unchanged {
            return self.clone();
        }
        Self {
            inner: Arc::new(JoinPointInner {
                method: self.inner.method.clone(),
                target: Arc::clone(&self.inner.target),
                target_type: self.inner.target_type.clone(),
                proxy: self.inner.proxy.clone(),
                args: Arc::new(args.to_vec()),
            }),
        }
    }

    /// Returns whether both handles are the same snapshot.
    pub fn ptr_eq(&self, other: &JoinPoint) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// `execution(Lecturer.teach(..))`
    pub fn to_short_string(&self) -> String {
        let method = &self.inner.method;
        format!("execution({}.{}(..))", method.declaring_type(), method.name())
    }

    /// `execution(string Lecturer.teach(string))`
    pub fn to_long_string(&self) -> String {
        format!("execution({})", self.inner.method)
    }
}

impl fmt::Display for JoinPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_short_string())
    }
}

impl fmt::Debug for JoinPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinPoint")
            .field("method", &self.inner.method)
            .field("target_type", &self.inner.target_type)
            .field("args", &self.inner.args)
            .finish()
    }
}

/// The per-method part of a join point.
#[derive(Debug, Clone)]
pub struct StaticPart {
    method: Method,
}

impl StaticPart {
    pub fn kind(&self) -> &'static str {
        METHOD_EXECUTION
    }

    pub fn signature(&self) -> &Method {
        &self.method
    }
}

impl fmt::Display for StaticPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "execution({})", self.method)
    }
}

// ============================================================================
// ProceedingJoinPoint
// ============================================================================

/// A join point that can continue the interceptor chain.
///
/// Each call to [`proceed`](Self::proceed) runs an independent copy of the
/// remaining chain, so around advice may proceed several times (retries) or
/// not at all.
#[derive(Clone)]
pub struct ProceedingJoinPoint {
    join_point: JoinPoint,
    invocation: MethodInvocation,
}

impl ProceedingJoinPoint {
    pub fn new(invocation: &mut MethodInvocation) -> Self {
        Self {
            join_point: invocation.join_point(),
            invocation: invocation.invocable_clone(),
        }
    }

    pub fn join_point(&self) -> &JoinPoint {
        &self.join_point
    }

    pub fn args(&self) -> &[Value] {
        self.invocation.arguments()
    }

    pub fn signature(&self) -> &Method {
        self.invocation.method()
    }

    /// Runs the rest of the chain with the current arguments.
    pub fn proceed(&self) -> InvocationResult {
        self.invocation.invocable_clone().proceed()
    }

    /// Runs the rest of the chain with replaced arguments.
    ///
    /// The argument count must match the intercepted method. Later calls to
    /// [`proceed`](Self::proceed) keep using the replaced arguments.
    pub fn proceed_with(&mut self, args: Vec<Value>) -> InvocationResult {
        let expected = self.invocation.arguments().len();
        if args.len() != expected {
            return Err(AopConfigError::Invalid(format!(
                "expecting {expected} arguments to proceed, but was passed {} arguments",
                args.len()
            ))
            .into());
        }
        self.invocation.set_arguments(args);
        self.proceed()
    }
}

impl fmt::Debug for ProceedingJoinPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProceedingJoinPoint")
            .field("join_point", &self.join_point)
            .finish_non_exhaustive()
    }
}
