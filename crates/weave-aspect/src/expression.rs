//! Expression pointcuts over an external matcher.
//!
//! Weave never parses match expressions itself. A [`PointcutParser`] turns an
//! expression plus the declared capture parameters into a compiled
//! [`PointcutExpression`], which answers three questions:
//!
//! - could any method of this type match?
//! - does this method match statically ([`ShadowMatch`])?
//! - does this particular call match, and what did it capture
//!   ([`JoinPointMatch`])?
//!
//! [`ExpressionPointcut`] wraps a compiled expression, memoizes the static
//! answers per (method, target type) and plugs into the core as both a
//! [`TypeFilter`] and a [`MethodFilter`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;
use weave_core::{
    AopResult, JoinPoint, Method, MethodFilter, MethodKey, Pointcut, Type, TypeFilter, Value,
};

/// A named variable an expression may capture, with its expected type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointcutParameter {
    pub name: String,
    pub ty: Type,
}

impl PointcutParameter {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// The static answer of a matcher for one method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShadowMatch {
    /// Every call matches.
    Always,
    /// No call matches.
    Never,
    /// Whether a call matches is only known at call time.
    Maybe,
}

/// The captured variables of a matching call, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct JoinPointMatch {
    bindings: Vec<(String, Value)>,
}

impl JoinPointMatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a captured variable.
    pub fn bind(mut self, name: impl Into<String>, value: Value) -> Self {
        self.bindings.push((name.into(), value));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value)
    }

    pub fn bindings(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.bindings.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// A compiled match expression.
pub trait PointcutExpression: Send + Sync {
    /// Whether any method of `ty` could match.
    fn could_match(&self, ty: &Type) -> bool;

    /// The static match of `method` called on a target of `target_type`.
    fn match_method(&self, method: &Method, target_type: &Type) -> ShadowMatch;

    /// Matches one call; `None` when it does not match.
    fn match_join_point(&self, join_point: &JoinPoint) -> Option<JoinPointMatch>;
}

/// Compiles match expressions.
pub trait PointcutParser: Send + Sync {
    /// Compiles `expression`. `parameters` lists the variables the expression
    /// is expected to capture, in advice parameter order.
    fn parse(
        &self,
        expression: &str,
        parameters: &[PointcutParameter],
    ) -> AopResult<Arc<dyn PointcutExpression>>;
}

/// Rewrites the word operators `and`, `or` and `not` to `&&`, `||` and `!`.
pub fn replace_boolean_operators(expression: &str) -> String {
    expression
        .replace(" and ", " && ")
        .replace(" or ", " || ")
        .replace(" not ", " ! ")
}

// ============================================================================
// ExpressionPointcut
// ============================================================================

type ShadowKey = (MethodKey, Type);

/// A pointcut backed by a compiled match expression.
pub struct ExpressionPointcut {
    expression: String,
    parameters: Vec<PointcutParameter>,
    compiled: Arc<dyn PointcutExpression>,
    shadow_cache: RwLock<HashMap<ShadowKey, ShadowMatch>>,
}

impl ExpressionPointcut {
    /// Compiles `expression` with `parser`.
    pub fn new(
        parser: &dyn PointcutParser,
        expression: impl Into<String>,
        parameters: Vec<PointcutParameter>,
    ) -> AopResult<Self> {
        let expression = expression.into();
        let compiled = parser.parse(&replace_boolean_operators(&expression), &parameters)?;
        Ok(Self {
            expression,
            parameters,
            compiled,
            shadow_cache: RwLock::new(HashMap::new()),
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn parameters(&self) -> &[PointcutParameter] {
        &self.parameters
    }

    pub fn could_match(&self, ty: &Type) -> bool {
        self.compiled.could_match(ty)
    }

    /// The static match for `method`, memoized per runtime target type.
    pub fn shadow_match(&self, method: &Method, target_type: &Type) -> ShadowMatch {
        let key = (method.key(), target_type.clone());
        if let Some(shadow) = self.shadow_cache.read().get(&key) {
            return *shadow;
        }
        let shadow = self.compiled.match_method(method, target_type);
        trace!(
            expression = %self.expression,
            method = %method,
            ?shadow,
            "Computed shadow match"
        );
        *self.shadow_cache.write().entry(key).or_insert(shadow)
    }

    /// Matches one call.
    ///
    /// Expressions that match statically and capture nothing skip the
    /// call-time check.
    pub fn runtime_match(&self, join_point: &JoinPoint) -> Option<JoinPointMatch> {
        let shadow = self.shadow_match(join_point.signature(), join_point.target_type());
        match shadow {
            ShadowMatch::Never => None,
            ShadowMatch::Always if self.parameters.is_empty() => Some(JoinPointMatch::new()),
            _ => self.compiled.match_join_point(join_point),
        }
    }

    /// A core pointcut evaluating this expression.
    pub fn to_pointcut(self: &Arc<Self>) -> Pointcut {
        Pointcut::from_parts(self.clone(), self.clone())
    }
}

impl TypeFilter for ExpressionPointcut {
    fn matches(&self, ty: &Type) -> bool {
        self.could_match(ty)
    }
}

impl MethodFilter for ExpressionPointcut {
    fn matches(&self, method: &Method, target_type: &Type) -> bool {
        self.shadow_match(method, target_type) != ShadowMatch::Never
    }
}

impl fmt::Debug for ExpressionPointcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpressionPointcut")
            .field("expression", &self.expression)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}
