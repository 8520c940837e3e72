//! Pointcuts decide which methods of which types are intercepted.
//!
//! A [`Pointcut`] composes two independent filters with AND semantics:
//!
//! - a [`TypeFilter`] evaluated against the runtime target type
//! - a [`MethodFilter`] evaluated against the called method and the runtime
//!   target type
//!
//! Plain closures implement both filter traits:
//!
//! ```rust,ignore
//! use weave_core::{Pointcut, NameMatchMethodFilter, TypeHierarchyFilter};
//!
//! let pointcut = Pointcut::new(
//!     TypeHierarchyFilter::new(lecturer_type),
//!     NameMatchMethodFilter::new(["teach*", "grade"]),
//! );
//!
//! let by_closure = Pointcut::for_methods(|method: &Method, _: &Type| method.name() == "teach");
//! ```

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::foundation::{Method, Type};

/// Decides whether a runtime target type is subject to a rule.
pub trait TypeFilter: Send + Sync {
    fn matches(&self, ty: &Type) -> bool;
}

/// Decides whether a method called on a given runtime type is subject to a rule.
pub trait MethodFilter: Send + Sync {
    fn matches(&self, method: &Method, target_type: &Type) -> bool;
}

impl<F> TypeFilter for F
where
    F: Fn(&Type) -> bool + Send + Sync,
{
    fn matches(&self, ty: &Type) -> bool {
        self(ty)
    }
}

impl<F> MethodFilter for F
where
    F: Fn(&Method, &Type) -> bool + Send + Sync,
{
    fn matches(&self, method: &Method, target_type: &Type) -> bool {
        self(method, target_type)
    }
}

/// Accepts every type and every method.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchAll;

impl TypeFilter for MatchAll {
    fn matches(&self, _ty: &Type) -> bool {
        true
    }
}

impl MethodFilter for MatchAll {
    fn matches(&self, _method: &Method, _target_type: &Type) -> bool {
        true
    }
}

// ============================================================================
// Built-in filters
// ============================================================================

/// Accepts types assignable to a root type.
#[derive(Debug, Clone)]
pub struct TypeHierarchyFilter {
    root: Type,
}

impl TypeHierarchyFilter {
    pub fn new(root: Type) -> Self {
        Self { root }
    }
}

impl TypeFilter for TypeHierarchyFilter {
    fn matches(&self, ty: &Type) -> bool {
        self.root.is_assignable_from(ty)
    }
}

/// Accepts methods whose name matches one of a set of simple patterns.
///
/// Patterns support `*` wildcards (`teach*`, `*Name`, `*et*`).
#[derive(Debug, Clone, Default)]
pub struct NameMatchMethodFilter {
    patterns: Vec<String>,
}

impl NameMatchMethodFilter {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }

    /// Adds another name pattern.
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.patterns.push(pattern.into());
        self
    }
}

impl MethodFilter for NameMatchMethodFilter {
    fn matches(&self, method: &Method, _target_type: &Type) -> bool {
        self.patterns
            .iter()
            .any(|pattern| simple_match(pattern, method.name()))
    }
}

/// Matches `text` against a pattern where `*` stands for any run of characters.
pub fn simple_match(pattern: &str, text: &str) -> bool {
    let Some(first) = pattern.find('*') else {
        return pattern == text;
    };
    if pattern.len() == 1 {
        return true;
    }
    let (prefix, rest) = pattern.split_at(first);
    let Some(remaining) = text.strip_prefix(prefix) else {
        return false;
    };
    let rest = &rest[1..];
    if rest.is_empty() {
        return true;
    }
    match rest.find('*') {
        None => remaining.ends_with(rest),
        Some(next) => {
            let literal = &rest[..next];
            remaining.match_indices(literal).any(|(idx, _)| {
                simple_match(&rest[next..], &remaining[idx + literal.len()..])
            })
        }
    }
}

// ============================================================================
// Pointcut
// ============================================================================

/// A type filter paired with a method filter.
///
/// Pointcuts are immutable once built and cheap to clone.
#[derive(Clone)]
pub struct Pointcut {
    type_filter: Arc<dyn TypeFilter>,
    method_filter: Arc<dyn MethodFilter>,
}

impl Pointcut {
    /// Creates a pointcut from a type filter and a method filter.
    pub fn new<T, M>(type_filter: T, method_filter: M) -> Self
    where
        T: TypeFilter + 'static,
        M: MethodFilter + 'static,
    {
        Self::from_parts(Arc::new(type_filter), Arc::new(method_filter))
    }

    /// Creates a pointcut from already shared filters.
    pub fn from_parts(type_filter: Arc<dyn TypeFilter>, method_filter: Arc<dyn MethodFilter>) -> Self {
        Self {
            type_filter,
            method_filter,
        }
    }

    /// The shared pointcut that matches every method of every type.
    pub fn always() -> Self {
        static ALWAYS: OnceLock<Pointcut> = OnceLock::new();
        ALWAYS
            .get_or_init(|| Pointcut::new(MatchAll, MatchAll))
            .clone()
    }

    /// Matches every method of the types accepted by `filter`.
    pub fn for_type<T: TypeFilter + 'static>(filter: T) -> Self {
        Self::new(filter, MatchAll)
    }

    /// Matches the methods accepted by `filter` on any type.
    pub fn for_methods<M: MethodFilter + 'static>(filter: M) -> Self {
        Self::new(MatchAll, filter)
    }

    pub fn type_filter(&self) -> &dyn TypeFilter {
        self.type_filter.as_ref()
    }

    pub fn method_filter(&self) -> &dyn MethodFilter {
        self.method_filter.as_ref()
    }

    /// Evaluates the type filter only.
    pub fn matches_type(&self, ty: &Type) -> bool {
        self.type_filter.matches(ty)
    }

    /// Evaluates both filters; both must accept.
    pub fn matches(&self, method: &Method, target_type: &Type) -> bool {
        self.type_filter.matches(target_type) && self.method_filter.matches(method, target_type)
    }
}

impl fmt::Debug for Pointcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pointcut").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_match() {
        assert!(simple_match("*", "anything"));
        assert!(simple_match("teach", "teach"));
        assert!(!simple_match("teach", "lecturer"));
        assert!(simple_match("teach*", "teachClass"));
        assert!(simple_match("*Name", "getName"));
        assert!(simple_match("*et*", "getName"));
        assert!(simple_match("g*N*e", "getName"));
        assert!(!simple_match("set*", "getName"));
    }

    #[test]
    fn test_pointcut_requires_both_filters() {
        let lecturer = Type::new("Lecturer");
        let student = Type::new("Student");
        let teach = Method::new(&lecturer, "teach");
        let rest = Method::new(&lecturer, "rest");

        let pointcut = Pointcut::new(
            TypeHierarchyFilter::new(lecturer.clone()),
            NameMatchMethodFilter::new(["teach*"]),
        );

        assert!(pointcut.matches(&teach, &lecturer));
        assert!(!pointcut.matches(&rest, &lecturer));
        assert!(!pointcut.matches(&teach, &student));
    }

    #[test]
    fn test_always_matches() {
        let ty = Type::new("Anything");
        assert!(Pointcut::always().matches(&Method::new(&ty, "x"), &ty));
    }

    #[test]
    fn test_closure_filters() {
        let ty = Type::new("Lecturer");
        let pointcut = Pointcut::for_methods(|m: &Method, _: &Type| m.parameter_count() == 0);
        assert!(pointcut.matches(&Method::new(&ty, "teach"), &ty));
        assert!(!pointcut.matches(&Method::new(&ty, "grade").param(Type::integer()), &ty));
    }
}
