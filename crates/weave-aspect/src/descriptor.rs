//! Plain-data advice descriptors.
//!
//! A descriptor marks an aspect method as advice: which kind, which calls it
//! applies to and how its parameters are named. Descriptors are usually built
//! in code but also deserialize from configuration.

use std::fmt;

use serde::{Deserialize, Serialize};
use weave_core::{AopConfigError, AopResult};

use crate::binding::is_variable_name;

/// The kind of an advice method.
///
/// The declaration order is the precedence of advice within one aspect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdviceKind {
    Around,
    Before,
    After,
    AfterReturning,
    AfterThrowing,
}

impl AdviceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Around => "around",
            Self::Before => "before",
            Self::After => "after",
            Self::AfterReturning => "after_returning",
            Self::AfterThrowing => "after_throwing",
        }
    }

    /// Only around advice may take a proceeding join point.
    pub fn supports_proceeding_join_point(self) -> bool {
        matches!(self, Self::Around)
    }
}

impl fmt::Display for AdviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Describes one advice method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdviceDescriptor {
    pub kind: AdviceKind,

    /// The match expression, possibly referencing named pointcuts.
    #[serde(alias = "pointcut", alias = "value")]
    pub expression: String,

    /// Comma-separated parameter names, in parameter order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arg_names: Option<String>,

    /// Name of the parameter receiving the return value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returning: Option<String>,

    /// Name of the parameter receiving the thrown error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throwing: Option<String>,
}

impl AdviceDescriptor {
    pub fn new(kind: AdviceKind, expression: impl Into<String>) -> Self {
        Self {
            kind,
            expression: expression.into(),
            arg_names: None,
            returning: None,
            throwing: None,
        }
    }

    pub fn around(expression: impl Into<String>) -> Self {
        Self::new(AdviceKind::Around, expression)
    }

    pub fn before(expression: impl Into<String>) -> Self {
        Self::new(AdviceKind::Before, expression)
    }

    pub fn after(expression: impl Into<String>) -> Self {
        Self::new(AdviceKind::After, expression)
    }

    pub fn after_returning(expression: impl Into<String>) -> Self {
        Self::new(AdviceKind::AfterReturning, expression)
    }

    pub fn after_throwing(expression: impl Into<String>) -> Self {
        Self::new(AdviceKind::AfterThrowing, expression)
    }

    pub fn arg_names(mut self, names: impl Into<String>) -> Self {
        self.arg_names = Some(names.into());
        self
    }

    pub fn returning(mut self, name: impl Into<String>) -> Self {
        self.returning = Some(name.into());
        self
    }

    pub fn throwing(mut self, name: impl Into<String>) -> Self {
        self.throwing = Some(name.into());
        self
    }

    /// The explicit parameter names, if any were given.
    pub fn argument_names(&self) -> Option<Vec<String>> {
        let csv = self.arg_names.as_deref()?;
        let names: Vec<String> = csv
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        (!names.is_empty()).then_some(names)
    }

    pub fn returning_name(&self) -> Option<&str> {
        self.returning.as_deref().filter(|name| !name.trim().is_empty())
    }

    pub fn throwing_name(&self) -> Option<&str> {
        self.throwing.as_deref().filter(|name| !name.trim().is_empty())
    }

    /// Checks the descriptor on its own, without looking at the method.
    pub fn validate(&self) -> AopResult<()> {
        if self.expression.trim().is_empty() {
            return Err(AopConfigError::Invalid(format!(
                "{} advice has an empty match expression",
                self.kind
            )));
        }
        if let Some(name) = self.returning_name() {
            if self.kind != AdviceKind::AfterReturning {
                return Err(AopConfigError::unsupported(
                    "only after-returning advice can be used to bind a return value",
                ));
            }
            if !is_variable_name(name) {
                return Err(AopConfigError::binding(format!(
                    "returning name '{name}' is not a valid argument name"
                )));
            }
        }
        if let Some(name) = self.throwing_name() {
            if self.kind != AdviceKind::AfterThrowing {
                return Err(AopConfigError::unsupported(
                    "only after-throwing advice can be used to bind a thrown error",
                ));
            }
            if !is_variable_name(name) {
                return Err(AopConfigError::binding(format!(
                    "throwing name '{name}' is not a valid argument name"
                )));
            }
        }
        if let Some(names) = self.argument_names() {
            if let Some(bad) = names.iter().find(|name| !is_variable_name(name)) {
                return Err(AopConfigError::binding(format!(
                    "argument name '{bad}' is not a valid variable name"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_precedence() {
        let mut kinds = vec![
            AdviceKind::AfterThrowing,
            AdviceKind::Before,
            AdviceKind::AfterReturning,
            AdviceKind::Around,
            AdviceKind::After,
        ];
        kinds.sort();
        assert_eq!(
            kinds,
            vec![
                AdviceKind::Around,
                AdviceKind::Before,
                AdviceKind::After,
                AdviceKind::AfterReturning,
                AdviceKind::AfterThrowing,
            ]
        );
    }

    #[test]
    fn test_argument_names_csv() {
        let descriptor = AdviceDescriptor::before("within(Lecturer)").arg_names(" jp, name ,");
        assert_eq!(
            descriptor.argument_names(),
            Some(vec!["jp".to_string(), "name".to_string()])
        );
        assert_eq!(AdviceDescriptor::before("x").arg_names("  ").argument_names(), None);
    }

    #[test]
    fn test_returning_only_on_after_returning() {
        let err = AdviceDescriptor::before("within(Lecturer)")
            .returning("result")
            .validate()
            .unwrap_err();
        assert!(matches!(err, AopConfigError::Unsupported(_)));

        AdviceDescriptor::after_returning("within(Lecturer)")
            .returning("result")
            .validate()
            .unwrap();
    }

    #[test]
    fn test_throwing_must_be_variable_name() {
        let err = AdviceDescriptor::after_throwing("within(Lecturer)")
            .throwing("java.lang.Error")
            .validate()
            .unwrap_err();
        assert!(matches!(err, AopConfigError::Binding(_)));
    }

    #[test]
    fn test_blank_expression_rejected() {
        assert!(AdviceDescriptor::around("  ").validate().is_err());
    }

    #[test]
    fn test_deserialize_with_alias() {
        let descriptor: AdviceDescriptor = serde_json::from_str(
            r#"{"kind": "after_returning", "pointcut": "teaching()", "returning": "result"}"#,
        )
        .unwrap();
        assert_eq!(descriptor.kind, AdviceKind::AfterReturning);
        assert_eq!(descriptor.expression, "teaching()");
        assert_eq!(descriptor.returning_name(), Some("result"));
    }
}
