//! Aspect metadata: the declarative description of an aspect type.
//!
//! Without reflection, an aspect is described explicitly: its type, how it is
//! instantiated, its named pointcuts and its methods. Methods carrying an
//! [`AdviceDescriptor`] become advice; the others are ignored by the advisor
//! factory.
//!
//! # Example
//!
//! ```rust,ignore
//! use weave_aspect::{AspectMetadata, AdviceMethod};
//!
//! let metadata = AspectMetadata::new("audit", Type::new("AuditAspect"))
//!     .pointcut("teaching", "execution(Lecturer.*)")
//!     .method(
//!         AdviceMethod::new("log_entry", |_aspect, args| {
//!             let jp = args.join_point(0).expect("bound");
//!             tracing::info!(%jp, "entering");
//!             Ok(None)
//!         })
//!         .param(Type::join_point())
//!         .before("teaching()"),
//!     );
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use weave_core::{
    AopConfigError, AopResult, InvocationResult, JoinPoint, ProceedingJoinPoint, Throwable, Type,
    Value,
};
use weave_core::framework::StaticPart;

use crate::binding::{is_identifier_part, is_identifier_start, is_variable_name};
use crate::descriptor::{AdviceDescriptor, AdviceKind};

// ============================================================================
// Advice arguments
// ============================================================================

/// One bound argument of an advice method call.
#[derive(Debug, Clone)]
pub enum AdviceArg {
    JoinPoint(JoinPoint),
    ProceedingJoinPoint(ProceedingJoinPoint),
    StaticPart(StaticPart),
    /// A captured variable or the return value; `None` for a void return.
    Value(Option<Value>),
    Error(Throwable),
}

/// The bound arguments of an advice method call, in parameter order.
#[derive(Debug, Clone, Default)]
pub struct AdviceArgs(Vec<AdviceArg>);

impl AdviceArgs {
    pub fn new(args: Vec<AdviceArg>) -> Self {
        Self(args)
    }

    pub fn join_point(&self, index: usize) -> Option<&JoinPoint> {
        match self.0.get(index)? {
            AdviceArg::JoinPoint(jp) => Some(jp),
            AdviceArg::ProceedingJoinPoint(pjp) => Some(pjp.join_point()),
            _ => None,
        }
    }

    pub fn proceeding_join_point(&mut self, index: usize) -> Option<&mut ProceedingJoinPoint> {
        match self.0.get_mut(index)? {
            AdviceArg::ProceedingJoinPoint(pjp) => Some(pjp),
            _ => None,
        }
    }

    pub fn static_part(&self, index: usize) -> Option<&StaticPart> {
        match self.0.get(index)? {
            AdviceArg::StaticPart(part) => Some(part),
            _ => None,
        }
    }

    /// The value at `index`; `None` for void returns and non-value slots.
    pub fn value(&self, index: usize) -> Option<&Value> {
        match self.0.get(index)? {
            AdviceArg::Value(value) => value.as_ref(),
            _ => None,
        }
    }

    pub fn error(&self, index: usize) -> Option<&Throwable> {
        match self.0.get(index)? {
            AdviceArg::Error(error) => Some(error),
            _ => None,
        }
    }

    pub fn into_vec(self) -> Vec<AdviceArg> {
        self.0
    }
}

impl Deref for AdviceArgs {
    type Target = [AdviceArg];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// The body of an advice method, called with the aspect instance and the
/// bound arguments.
pub type AdviceBody = Arc<dyn Fn(&Value, AdviceArgs) -> InvocationResult + Send + Sync>;

// ============================================================================
// Advice methods
// ============================================================================

/// A method declared on an aspect.
#[derive(Clone)]
pub struct AdviceMethod {
    name: String,
    descriptor: Option<AdviceDescriptor>,
    parameter_types: Vec<Type>,
    body: AdviceBody,
}

impl AdviceMethod {
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&Value, AdviceArgs) -> InvocationResult + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            descriptor: None,
            parameter_types: Vec::new(),
            body: Arc::new(body),
        }
    }

    /// Appends a parameter type.
    pub fn param(mut self, ty: Type) -> Self {
        self.parameter_types.push(ty);
        self
    }

    pub fn params(mut self, types: impl IntoIterator<Item = Type>) -> Self {
        self.parameter_types.extend(types);
        self
    }

    /// Marks this method as advice.
    pub fn with_descriptor(mut self, descriptor: AdviceDescriptor) -> Self {
        self.descriptor = Some(descriptor);
        self
    }

    pub fn around(self, expression: impl Into<String>) -> Self {
        self.with_descriptor(AdviceDescriptor::around(expression))
    }

    pub fn before(self, expression: impl Into<String>) -> Self {
        self.with_descriptor(AdviceDescriptor::before(expression))
    }

    pub fn after(self, expression: impl Into<String>) -> Self {
        self.with_descriptor(AdviceDescriptor::after(expression))
    }

    pub fn after_returning(self, expression: impl Into<String>) -> Self {
        self.with_descriptor(AdviceDescriptor::after_returning(expression))
    }

    pub fn after_throwing(self, expression: impl Into<String>) -> Self {
        self.with_descriptor(AdviceDescriptor::after_throwing(expression))
    }

    /// Sets explicit parameter names. Has no effect on plain methods.
    pub fn arg_names(mut self, names: impl Into<String>) -> Self {
        if let Some(descriptor) = self.descriptor.take() {
            self.descriptor = Some(descriptor.arg_names(names));
        }
        self
    }

    pub fn returning(mut self, name: impl Into<String>) -> Self {
        if let Some(descriptor) = self.descriptor.take() {
            self.descriptor = Some(descriptor.returning(name));
        }
        self
    }

    pub fn throwing(mut self, name: impl Into<String>) -> Self {
        if let Some(descriptor) = self.descriptor.take() {
            self.descriptor = Some(descriptor.throwing(name));
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn descriptor(&self) -> Option<&AdviceDescriptor> {
        self.descriptor.as_ref()
    }

    pub fn kind(&self) -> Option<AdviceKind> {
        self.descriptor.as_ref().map(|d| d.kind)
    }

    pub fn parameter_types(&self) -> &[Type] {
        &self.parameter_types
    }

    pub fn parameter_count(&self) -> usize {
        self.parameter_types.len()
    }

    /// Calls the body on `aspect` with already bound arguments.
    pub fn invoke(&self, aspect: &Value, args: AdviceArgs) -> InvocationResult {
        (self.body)(aspect, args)
    }
}

impl fmt::Display for AdviceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, ty) in self.parameter_types.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{ty}")?;
        }
        f.write_str(")")
    }
}

impl fmt::Debug for AdviceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdviceMethod")
            .field("signature", &self.to_string())
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Aspect metadata
// ============================================================================

/// How aspect instances relate to advised objects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum InstantiationModel {
    /// One instance for everything, created eagerly.
    #[default]
    Singleton,
    PerTarget,
    PerThis,
    PerTypeWithin,
}

impl InstantiationModel {
    /// Every model except singleton defers advice creation to first use.
    pub fn is_lazy(self) -> bool {
        !matches!(self, Self::Singleton)
    }
}

/// The declarative description of an aspect.
#[derive(Debug, Clone)]
pub struct AspectMetadata {
    name: String,
    aspect_type: Type,
    instantiation: InstantiationModel,
    pointcuts: BTreeMap<String, String>,
    methods: Vec<AdviceMethod>,
}

impl AspectMetadata {
    pub fn new(name: impl Into<String>, aspect_type: Type) -> Self {
        Self {
            name: name.into(),
            aspect_type,
            instantiation: InstantiationModel::Singleton,
            pointcuts: BTreeMap::new(),
            methods: Vec::new(),
        }
    }

    pub fn instantiation(mut self, model: InstantiationModel) -> Self {
        self.instantiation = model;
        self
    }

    /// Declares a named pointcut, referenced from expressions as `name()`.
    pub fn pointcut(mut self, name: impl Into<String>, expression: impl Into<String>) -> Self {
        self.pointcuts.insert(name.into(), expression.into());
        self
    }

    /// Declares a method.
    pub fn method(mut self, method: AdviceMethod) -> Self {
        self.methods.push(method);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn aspect_type(&self) -> &Type {
        &self.aspect_type
    }

    pub fn instantiation_model(&self) -> InstantiationModel {
        self.instantiation
    }

    pub fn is_lazily_instantiated(&self) -> bool {
        self.instantiation.is_lazy()
    }

    pub fn pointcuts(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pointcuts.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn methods(&self) -> &[AdviceMethod] {
        &self.methods
    }

    /// Looks up a method by name for reconfiguration.
    pub fn method_mut(&mut self, name: &str) -> Option<&mut AdviceMethod> {
        self.methods.iter_mut().find(|m| m.name == name)
    }

    /// Replaces the descriptor of the method called `name`.
    pub fn set_descriptor(&mut self, name: &str, descriptor: AdviceDescriptor) -> AopResult<()> {
        let method = self.method_mut(name).ok_or_else(|| {
            AopConfigError::Invalid(format!("aspect has no method named '{name}'"))
        })?;
        method.descriptor = Some(descriptor);
        Ok(())
    }

    /// Expands every `name()` reference to a named pointcut in `expression`.
    pub fn resolve_expression(&self, expression: &str) -> AopResult<String> {
        let mut visiting = Vec::new();
        self.expand(expression, &mut visiting)
    }

    fn expand(&self, expression: &str, visiting: &mut Vec<String>) -> AopResult<String> {
        let mut out = String::with_capacity(expression.len());
        let mut rest = expression;

        while let Some(start) = rest.find(is_identifier_start) {
            let (before, tail) = rest.split_at(start);
            out.push_str(before);

            let len = tail.find(|c: char| !is_identifier_part(c)).unwrap_or(tail.len());
            let (ident, after) = tail.split_at(len);
            let bounded = before
                .chars()
                .next_back()
                .is_none_or(|c| !matches!(c, '.' | '@' | '*') && !is_identifier_part(c));

            match self.pointcuts.get(ident) {
                Some(body) if bounded && after.starts_with("()") => {
                    if visiting.iter().any(|name| name == ident) {
                        return Err(AopConfigError::invalid_expression(
                            expression,
                            format!("circular pointcut reference through '{ident}'"),
                        ));
                    }
                    visiting.push(ident.to_string());
                    let expanded = self.expand(body, visiting)?;
                    visiting.pop();

                    out.push('(');
                    out.push_str(&expanded);
                    out.push(')');
                    rest = &after[2..];
                }
                _ => {
                    out.push_str(ident);
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        Ok(out)
    }

    /// Checks the aspect as a whole.
    pub fn validate(&self) -> AopResult<()> {
        if self.name.trim().is_empty() {
            return Err(AopConfigError::Invalid(format!(
                "aspect of type '{}' has a blank name",
                self.aspect_type
            )));
        }
        for (name, expression) in &self.pointcuts {
            if !is_variable_name(name) {
                return Err(AopConfigError::Invalid(format!(
                    "pointcut name '{name}' is not an identifier"
                )));
            }
            self.resolve_expression(expression)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> AspectMetadata {
        AspectMetadata::new("audit", Type::new("AuditAspect"))
            .pointcut("teaching", "execution(Lecturer.teach*)")
            .pointcut("resting", "execution(Lecturer.rest)")
            .pointcut("either", "teaching() || resting()")
    }

    #[test]
    fn test_resolve_named_reference() {
        let resolved = metadata().resolve_expression("teaching() && args(topic)").unwrap();
        assert_eq!(resolved, "(execution(Lecturer.teach*)) && args(topic)");
    }

    #[test]
    fn test_resolve_nested_reference() {
        let resolved = metadata().resolve_expression("either()").unwrap();
        assert_eq!(
            resolved,
            "((execution(Lecturer.teach*)) || (execution(Lecturer.rest)))"
        );
    }

    #[test]
    fn test_method_patterns_are_not_references() {
        let md = metadata();
        assert_eq!(
            md.resolve_expression("execution(Other.teaching())").unwrap(),
            "execution(Other.teaching())"
        );
        assert_eq!(md.resolve_expression("within(Lecturer)").unwrap(), "within(Lecturer)");
    }

    #[test]
    fn test_circular_reference_fails() {
        let md = AspectMetadata::new("loop", Type::new("Loop"))
            .pointcut("a", "b()")
            .pointcut("b", "a()");
        let err = md.resolve_expression("a()").unwrap_err();
        assert!(matches!(err, AopConfigError::InvalidExpression { .. }));
        assert!(md.validate().is_err());
    }

    #[test]
    fn test_set_descriptor() {
        let mut md = metadata().method(AdviceMethod::new("log", |_, _| Ok(None)));
        assert!(md.methods()[0].descriptor().is_none());

        md.set_descriptor("log", AdviceDescriptor::before("teaching()")).unwrap();
        assert_eq!(md.methods()[0].kind(), Some(AdviceKind::Before));
        assert!(md.set_descriptor("missing", AdviceDescriptor::before("x")).is_err());
    }

    #[test]
    fn test_instantiation_model() {
        assert!(!metadata().is_lazily_instantiated());
        assert!(metadata().instantiation(InstantiationModel::PerTarget).is_lazily_instantiated());
    }
}
