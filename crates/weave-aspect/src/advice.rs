//! Advice backed by aspect methods.
//!
//! One [`AspectAdvice`] runs one advice method of an aspect. It exposes the
//! core contract matching its [`AdviceKind`]:
//!
//! | kind | contract | reads the join point from |
//! |---|---|---|
//! | around | interceptor | the invocation |
//! | before | [`BeforeAdvice`] | the exposed invocation context, with live arguments |
//! | after | interceptor | the invocation |
//! | after returning | [`AfterReturningAdvice`] | the exposed invocation context, with live arguments |
//! | after throwing | interceptor | the invocation |
//!
//! Before and after-returning advice therefore need the invocation-exposing
//! advisor at the head of the chain. The exposed join point is taken at the
//! head, so it is rebased onto the arguments the adapter hands over, which
//! include replacements made by earlier interceptors.
//!
//! Every kind consults the runtime match of its expression first. A call that
//! does not match proceeds as if the advice were absent.

use std::fmt;
use std::sync::Arc;

use tracing::trace;
use weave_core::{
    Advice, AfterReturningAdvice, BeforeAdvice, InvocationError, InvocationResult, JoinPoint,
    Method, MethodInterceptor, MethodInvocation, ProceedingJoinPoint, Target, Throwable, Value,
    current_join_point,
};

use crate::binding::{BindingPlan, CallOutcome};
use crate::descriptor::AdviceKind;
use crate::expression::{ExpressionPointcut, JoinPointMatch};
use crate::instance::AspectInstanceFactory;
use crate::metadata::AdviceMethod;

/// Runs one aspect advice method.
pub struct AspectAdvice {
    kind: AdviceKind,
    method: AdviceMethod,
    plan: BindingPlan,
    pointcut: Arc<ExpressionPointcut>,
    instances: Arc<dyn AspectInstanceFactory>,
}

impl AspectAdvice {
    pub fn new(
        kind: AdviceKind,
        method: AdviceMethod,
        plan: BindingPlan,
        pointcut: Arc<ExpressionPointcut>,
        instances: Arc<dyn AspectInstanceFactory>,
    ) -> Self {
        Self {
            kind,
            method,
            plan,
            pointcut,
            instances,
        }
    }

    pub fn kind(&self) -> AdviceKind {
        self.kind
    }

    pub fn method(&self) -> &AdviceMethod {
        &self.method
    }

    pub fn plan(&self) -> &BindingPlan {
        &self.plan
    }

    pub fn pointcut(&self) -> &Arc<ExpressionPointcut> {
        &self.pointcut
    }

    pub fn aspect_name(&self) -> &str {
        self.instances.metadata().name()
    }

    /// Whether a return value (or void return) is acceptable to the
    /// returning parameter.
    pub fn matches_return_value(&self, value: Option<&Value>, method: &Method) -> bool {
        let expected = self.plan.returning_type();
        match value {
            Some(value) => expected.is_assignable_from(value.value_type()),
            None if expected.is_object() && method.return_type().is_void() => true,
            None => expected.is_assignable_from(method.return_type()),
        }
    }

    fn invoke_advice(
        &self,
        join_point: &JoinPoint,
        proceeding: Option<ProceedingJoinPoint>,
        jp_match: &JoinPointMatch,
        outcome: CallOutcome<'_>,
    ) -> InvocationResult {
        let args = self.plan.bind(join_point, proceeding, Some(jp_match), outcome)?;
        let aspect = self.instances.aspect_instance();
        trace!(
            aspect = self.aspect_name(),
            advice = %self.method,
            kind = %self.kind,
            join_point = %join_point,
            "Invoking aspect advice"
        );
        self.method.invoke(&aspect, args)
    }

    fn around(&self, invocation: &mut MethodInvocation) -> InvocationResult {
        let join_point = invocation.join_point();
        let Some(jp_match) = self.pointcut.runtime_match(&join_point) else {
            return invocation.proceed();
        };
        let proceeding = ProceedingJoinPoint::new(invocation);
        self.invoke_advice(&join_point, Some(proceeding), &jp_match, CallOutcome::Pending)
    }

    fn after(&self, invocation: &mut MethodInvocation) -> InvocationResult {
        let join_point = invocation.join_point();
        let result = invocation.proceed();
        if let Some(jp_match) = self.pointcut.runtime_match(&join_point) {
            self.invoke_advice(&join_point, None, &jp_match, CallOutcome::Pending)?;
        }
        result
    }

    fn after_throwing(&self, invocation: &mut MethodInvocation) -> InvocationResult {
        let join_point = invocation.join_point();
        match invocation.proceed() {
            Err(InvocationError::Thrown(error)) => {
                self.handle_thrown(&join_point, &error)?;
                Err(error.into())
            }
            other => other,
        }
    }

    fn handle_thrown(&self, join_point: &JoinPoint, error: &Throwable) -> InvocationResult {
        if !error.is_instance_of(self.plan.throwing_type()) {
            return Ok(None);
        }
        match self.pointcut.runtime_match(join_point) {
            Some(jp_match) => {
                self.invoke_advice(join_point, None, &jp_match, CallOutcome::Thrown(error))
            }
            None => Ok(None),
        }
    }
}

impl MethodInterceptor for AspectAdvice {
    fn invoke(&self, invocation: &mut MethodInvocation) -> InvocationResult {
        match self.kind {
            AdviceKind::Around => self.around(invocation),
            AdviceKind::After => self.after(invocation),
            AdviceKind::AfterThrowing => self.after_throwing(invocation),
            AdviceKind::Before | AdviceKind::AfterReturning => invocation.proceed(),
        }
    }
}

impl BeforeAdvice for AspectAdvice {
    fn before(
        &self,
        _method: &Method,
        args: &[Value],
        _target: &dyn Target,
    ) -> Result<(), InvocationError> {
        let join_point = current_join_point()?.with_args(args);
        if let Some(jp_match) = self.pointcut.runtime_match(&join_point) {
            self.invoke_advice(&join_point, None, &jp_match, CallOutcome::Pending)?;
        }
        Ok(())
    }
}

impl AfterReturningAdvice for AspectAdvice {
    fn after_returning(
        &self,
        return_value: Option<&Value>,
        method: &Method,
        args: &[Value],
        _target: &dyn Target,
    ) -> Result<(), InvocationError> {
        if !self.matches_return_value(return_value, method) {
            return Ok(());
        }
        let join_point = current_join_point()?.with_args(args);
        if let Some(jp_match) = self.pointcut.runtime_match(&join_point) {
            self.invoke_advice(
                &join_point,
                None,
                &jp_match,
                CallOutcome::Returned(return_value),
            )?;
        }
        Ok(())
    }
}

impl Advice for AspectAdvice {
    fn name(&self) -> String {
        format!("{}.{}", self.aspect_name(), self.method.name())
    }

    fn as_interceptor(self: Arc<Self>) -> Option<Arc<dyn MethodInterceptor>> {
        match self.kind {
            AdviceKind::Around | AdviceKind::After | AdviceKind::AfterThrowing => Some(self),
            AdviceKind::Before | AdviceKind::AfterReturning => None,
        }
    }

    fn as_before(self: Arc<Self>) -> Option<Arc<dyn BeforeAdvice>> {
        match self.kind {
            AdviceKind::Before => Some(self),
            _ => None,
        }
    }

    fn as_after_returning(self: Arc<Self>) -> Option<Arc<dyn AfterReturningAdvice>> {
        match self.kind {
            AdviceKind::AfterReturning => Some(self),
            _ => None,
        }
    }
}

impl fmt::Debug for AspectAdvice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AspectAdvice")
            .field("kind", &self.kind)
            .field("aspect", &self.aspect_name())
            .field("method", &self.method.name())
            .field("expression", &self.pointcut.expression())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use weave_core::Type;

    use super::*;
    use crate::descriptor::AdviceDescriptor;
    use crate::instance::SingletonAspectInstanceFactory;
    use crate::metadata::AspectMetadata;
    use crate::testing::GlobParser;

    fn advice(method: AdviceMethod, log: Arc<Mutex<Vec<String>>>) -> Arc<AspectAdvice> {
        let descriptor = method.descriptor().cloned().unwrap();
        let plan = BindingPlan::compute(&method, &descriptor, &descriptor.expression).unwrap();
        let pointcut = Arc::new(
            ExpressionPointcut::new(
                &GlobParser,
                descriptor.expression.clone(),
                plan.pointcut_parameters().to_vec(),
            )
            .unwrap(),
        );
        let metadata = AspectMetadata::new("Recorder", Type::new("Recorder"));
        let instances = Arc::new(SingletonAspectInstanceFactory::new(
            Value::new(Type::new("Recorder"), log),
            metadata,
        ));
        Arc::new(AspectAdvice::new(
            descriptor.kind,
            method,
            plan,
            pointcut,
            instances,
        ))
    }

    #[test]
    fn test_facets_follow_kind() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let around = advice(
            AdviceMethod::new("wrap", |_, _| Ok(None))
                .param(Type::proceeding_join_point())
                .around("within(Lecturer)"),
            log.clone(),
        );
        let before = advice(
            AdviceMethod::new("greet", |_, _| Ok(None)).before("within(Lecturer)"),
            log,
        );

        assert!(around.clone().as_interceptor().is_some());
        assert!(around.clone().as_before().is_none());
        assert!(before.clone().as_interceptor().is_none());
        assert!(before.clone().as_before().is_some());
        assert_eq!(before.name(), "Recorder.greet");
        assert!(before.pointcut().could_match(&Type::new("Lecturer")));
    }

    #[test]
    fn test_matches_return_value() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let lecturer = Type::new("Lecturer");
        let string_result = advice(
            AdviceMethod::new("on_string", |_, _| Ok(None))
                .param(Type::string())
                .with_descriptor(
                    AdviceDescriptor::after_returning("within(Lecturer)").returning("result"),
                ),
            log.clone(),
        );
        let any_result = advice(
            AdviceMethod::new("on_any", |_, _| Ok(None))
                .param(Type::object())
                .with_descriptor(
                    AdviceDescriptor::after_returning("within(Lecturer)").returning("result"),
                ),
            log,
        );
        let text = Method::new(&lecturer, "text").returns(Type::string());
        let count = Method::new(&lecturer, "count").returns(Type::integer());
        let nothing = Method::new(&lecturer, "nothing");

        assert!(string_result.matches_return_value(Some(&Value::string("a")), &text));
        assert!(!string_result.matches_return_value(Some(&Value::integer(1)), &count));
        assert!(!string_result.matches_return_value(None, &nothing));
        assert!(any_result.matches_return_value(None, &nothing));
        assert!(any_result.matches_return_value(None, &text));
    }
}
