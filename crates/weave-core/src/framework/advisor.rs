//! Advisors pair a pointcut with advice.

use std::fmt;
use std::sync::Arc;

use crate::error::AopResult;
use crate::framework::advice::BoxedAdvice;
use crate::framework::pointcut::Pointcut;

/// A shared advisor trait object.
pub type BoxedAdvisor = Arc<dyn Advisor>;

/// A rule: which calls to intercept and with what.
///
/// An advisor without a pointcut applies to every call. The pointcut is
/// always evaluated without materializing the advice, so advisors may create
/// their advice lazily on first use.
pub trait Advisor: Send + Sync {
    /// The pointcut guarding this advisor; `None` matches every call.
    fn pointcut(&self) -> Option<&Pointcut> {
        None
    }

    /// Returns the advice, creating it if needed.
    fn advice(&self) -> AopResult<BoxedAdvice>;

    /// A short description for logs.
    fn describe(&self) -> String {
        "advisor".to_string()
    }

    /// Whether the advice reads the join point from the exposed invocation
    /// context rather than from the invocation it is handed.
    fn needs_exposed_invocation(&self) -> bool {
        false
    }
}

/// An advisor holding ready-made advice and an optional pointcut.
#[derive(Clone)]
pub struct DefaultPointcutAdvisor {
    pointcut: Option<Pointcut>,
    advice: BoxedAdvice,
}

impl DefaultPointcutAdvisor {
    /// Creates an advisor that applies to every call.
    pub fn new(advice: BoxedAdvice) -> Self {
        Self {
            pointcut: None,
            advice,
        }
    }

    /// Creates an advisor guarded by `pointcut`.
    pub fn with_pointcut(pointcut: Pointcut, advice: BoxedAdvice) -> Self {
        Self {
            pointcut: Some(pointcut),
            advice,
        }
    }
}

impl Advisor for DefaultPointcutAdvisor {
    fn pointcut(&self) -> Option<&Pointcut> {
        self.pointcut.as_ref()
    }

    fn advice(&self) -> AopResult<BoxedAdvice> {
        Ok(Arc::clone(&self.advice))
    }

    fn describe(&self) -> String {
        format!("advisor[{}]", self.advice.name())
    }
}

impl fmt::Debug for DefaultPointcutAdvisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultPointcutAdvisor")
            .field("pointcut", &self.pointcut)
            .field("advice", &self.advice.name())
            .finish()
    }
}
