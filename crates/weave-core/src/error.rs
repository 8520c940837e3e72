//! Unified error types for the Weave core.
//!
//! Two families exist:
//!
//! - [`AopConfigError`]: the interception setup is inconsistent. These are
//!   raised while building chains or binding advice arguments and are never
//!   downgraded to a non-match.
//! - [`InvocationError`]: something went wrong while a proxied call was
//!   running. Errors raised by the target or by advice travel as
//!   [`InvocationError::Thrown`] and pass through every interceptor unchanged
//!   unless one of them explicitly recovers.

use std::fmt;

use thiserror::Error;

use crate::foundation::{Type, Value};

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors caused by an inconsistent interception setup.
#[derive(Debug, Clone, Error)]
pub enum AopConfigError {
    /// No adapter could turn an advice object into an interceptor.
    #[error("advice object '{0}' is neither a supported advice type nor an interceptor")]
    UnknownAdviceType(String),

    /// Advice parameters could not be bound unambiguously.
    #[error("ambiguous argument binding: {0}")]
    AmbiguousBinding(String),

    /// Advice parameters and bound values disagree.
    #[error("argument binding failed: {0}")]
    Binding(String),

    /// A combination of settings that cannot work together.
    #[error("unsupported advice configuration: {0}")]
    Unsupported(String),

    /// The external matcher rejected an expression.
    #[error("invalid pointcut expression '{expression}': {reason}")]
    InvalidExpression {
        /// The offending expression.
        expression: String,
        /// Reason reported by the matcher.
        reason: String,
    },

    /// Any other inconsistency.
    #[error("invalid aop configuration: {0}")]
    Invalid(String),
}

impl AopConfigError {
    /// Creates an ambiguous binding error.
    pub fn ambiguous(message: impl Into<String>) -> Self {
        Self::AmbiguousBinding(message.into())
    }

    /// Creates a binding error.
    pub fn binding(message: impl Into<String>) -> Self {
        Self::Binding(message.into())
    }

    /// Creates an unsupported configuration error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }

    /// Creates an invalid expression error.
    pub fn invalid_expression(expression: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidExpression {
            expression: expression.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for configuration operations.
pub type AopResult<T> = Result<T, AopConfigError>;

// =============================================================================
// Thrown Errors
// =============================================================================

/// An error raised by a target method or by advice code.
///
/// The error type decides which after-throwing handlers apply.
#[derive(Clone, Error)]
#[error("{ty}: {message}")]
pub struct Throwable {
    ty: Type,
    message: String,
    payload: Option<Value>,
}

impl Throwable {
    /// Creates a thrown error of type `ty`.
    ///
    /// `ty` should be [`Type::error`] or one of its subtypes.
    pub fn new(ty: Type, message: impl Into<String>) -> Self {
        debug_assert!(ty.is_error(), "thrown type `{ty}` is not an error type");
        Self {
            ty,
            message: message.into(),
            payload: None,
        }
    }

    /// Attaches a payload to this error.
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn error_type(&self) -> &Type {
        &self.ty
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    /// Returns whether this error is an instance of `ty`.
    pub fn is_instance_of(&self, ty: &Type) -> bool {
        ty.is_assignable_from(&self.ty)
    }
}

impl fmt::Debug for Throwable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Throwable")
            .field("type", &self.ty)
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Invocation Errors
// =============================================================================

/// Errors surfaced by a proxied call.
#[derive(Debug, Clone, Error)]
pub enum InvocationError {
    /// Raised by the target or by advice; propagates unchanged.
    #[error(transparent)]
    Thrown(#[from] Throwable),

    /// The interception setup turned out to be inconsistent at first use.
    #[error(transparent)]
    Config(#[from] AopConfigError),

    /// Advice asked for the current invocation while none was exposed.
    #[error("no method invocation in progress: {0}")]
    NoCurrentInvocation(String),

    /// The proxy does not expose the called method.
    #[error("method '{method}' is not exposed by this {shape} proxy")]
    NotProxied {
        /// The method that was requested.
        method: String,
        /// The proxy shape.
        shape: &'static str,
    },
}

impl InvocationError {
    /// Shorthand for throwing a new error of type `ty`.
    pub fn thrown(ty: Type, message: impl Into<String>) -> Self {
        Self::Thrown(Throwable::new(ty, message))
    }

    /// Returns the thrown error, if this is one.
    pub fn as_thrown(&self) -> Option<&Throwable> {
        match self {
            Self::Thrown(t) => Some(t),
            _ => None,
        }
    }
}

/// Outcome of a proxied call: the return value (`None` for void) or an error.
pub type InvocationResult = Result<Option<Value>, InvocationError>;
