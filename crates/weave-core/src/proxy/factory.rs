//! The proxy front door.
//!
//! A [`Proxy`] is the callable surface placed in front of a target. Every call
//! fetches the (memoized) interceptor chain for the method and drives a fresh
//! [`MethodInvocation`] through it; calls with an empty chain go straight to
//! the target.
//!
//! The shape of the proxy is decided by a [`ProxyStrategy`]:
//!
//! - [`InterfaceProxy`]: only methods declared on the target's interfaces
//! - [`SubtypeProxy`]: every method of the target's type hierarchy
//!
//! [`ProxyFactory`] picks the subtype shape when forced to or when the target
//! exposes no interfaces, and the interface shape otherwise.
//!
//! # Example
//!
//! ```rust,ignore
//! use weave_core::{ProxyFactory, TargetSource, advice};
//!
//! let proxy = ProxyFactory::new(TargetSource::new(lecturer).interface(teaching))
//!     .advice(advice::before(|method, _, _| {
//!         tracing::info!(%method, "before");
//!         Ok(())
//!     }))
//!     .get_proxy();
//!
//! let answer = proxy.invoke(&teach, vec![Value::string("rust")])?;
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::{Level, debug, span};

use crate::error::{InvocationError, InvocationResult};
use crate::foundation::{Method, TargetSource, Value};
use crate::framework::advice::BoxedAdvice;
use crate::framework::advisor::BoxedAdvisor;
use crate::framework::chain::ChainFactory;
use crate::framework::invocation::MethodInvocation;
use crate::proxy::config::{AdvisedSupport, ProxySettings};

/// Decides which methods a proxy dispatches.
pub trait ProxyStrategy: Send + Sync {
    /// A short name of the shape, used in errors and logs.
    fn shape(&self) -> &'static str;

    /// Returns whether calls to `method` are accepted by the proxy.
    fn exposes(&self, source: &TargetSource, method: &Method) -> bool;
}

/// Dispatches only methods declared on one of the target's interfaces.
#[derive(Debug, Clone, Copy, Default)]
pub struct InterfaceProxy;

impl ProxyStrategy for InterfaceProxy {
    fn shape(&self) -> &'static str {
        "interface"
    }

    fn exposes(&self, source: &TargetSource, method: &Method) -> bool {
        source
            .interfaces()
            .iter()
            .any(|interface| method.declaring_type().is_assignable_from(interface))
    }
}

/// Dispatches every method declared in the target's type hierarchy.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubtypeProxy;

impl ProxyStrategy for SubtypeProxy {
    fn shape(&self) -> &'static str {
        "subtype"
    }

    fn exposes(&self, source: &TargetSource, method: &Method) -> bool {
        method
            .declaring_type()
            .is_assignable_from(&source.target_type())
            || source
                .interfaces()
                .iter()
                .any(|interface| method.declaring_type().is_assignable_from(interface))
    }
}

// ============================================================================
// Proxy
// ============================================================================

struct ProxyInner {
    config: Arc<AdvisedSupport>,
    strategy: Arc<dyn ProxyStrategy>,
}

/// A callable front door routing calls through the interceptor chain.
///
/// Proxies are cheap to clone; clones share configuration and cache.
#[derive(Clone)]
pub struct Proxy {
    inner: Arc<ProxyInner>,
}

impl Proxy {
    pub fn new(config: Arc<AdvisedSupport>, strategy: Arc<dyn ProxyStrategy>) -> Self {
        Self {
            inner: Arc::new(ProxyInner { config, strategy }),
        }
    }

    /// Calls `method` with `args` through the interceptor chain.
    pub fn invoke(&self, method: &Method, args: Vec<Value>) -> InvocationResult {
        let source = self.inner.config.target_source();
        if !self.inner.strategy.exposes(&source, method) {
            return Err(InvocationError::NotProxied {
                method: method.to_string(),
                shape: self.inner.strategy.shape(),
            });
        }

        let target_type = source.target_type();
        let span = span!(
            Level::TRACE,
            "proxy_invoke",
            method = %method,
            target_type = %target_type
        );
        let _enter = span.enter();

        let chain = self.inner.config.interceptors(method, &target_type)?;
        if chain.is_empty() {
            return source.target().invoke(method, &args);
        }

        MethodInvocation::new(Arc::clone(source.target()), method.clone(), args, chain)
            .with_proxy(self.clone())
            .proceed()
    }

    /// The configuration shared with the factory that built this proxy.
    pub fn config(&self) -> &Arc<AdvisedSupport> {
        &self.inner.config
    }

    pub fn shape(&self) -> &'static str {
        self.inner.strategy.shape()
    }

    /// Returns whether both handles refer to the same proxy.
    pub fn ptr_eq(&self, other: &Proxy) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("shape", &self.shape())
            .field("config", &self.inner.config)
            .finish()
    }
}

// ============================================================================
// ProxyFactory
// ============================================================================

/// Builds proxies from a target and an ordered set of advisors.
pub struct ProxyFactory {
    config: AdvisedSupport,
    strategy: Option<Arc<dyn ProxyStrategy>>,
}

impl ProxyFactory {
    pub fn new(target: TargetSource) -> Self {
        Self {
            config: AdvisedSupport::new(target),
            strategy: None,
        }
    }

    /// Forces a subtype-shaped proxy.
    pub fn proxy_target_type(mut self, enabled: bool) -> Self {
        let mut settings = self.config.settings();
        settings.proxy_target_type = enabled;
        self.config = self.config.with_settings(settings);
        self
    }

    pub fn settings(mut self, settings: ProxySettings) -> Self {
        self.config = self.config.with_settings(settings);
        self
    }

    /// Overrides the proxy shape selection.
    pub fn strategy(mut self, strategy: Arc<dyn ProxyStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn chain_factory(mut self, chain_factory: Arc<dyn ChainFactory>) -> Self {
        self.config = self.config.with_chain_factory(chain_factory);
        self
    }

    /// Appends an advisor; registration order is execution order.
    pub fn advisor(self, advisor: BoxedAdvisor) -> Self {
        self.config.add_advisor(advisor);
        self
    }

    /// Appends several advisors in order.
    pub fn advisors(self, advisors: impl IntoIterator<Item = BoxedAdvisor>) -> Self {
        for advisor in advisors {
            self.config.add_advisor(advisor);
        }
        self
    }

    /// Appends advice that applies to every method.
    pub fn advice(self, advice: BoxedAdvice) -> Self {
        self.config.add_advice(advice);
        self
    }

    /// Builds the proxy.
    pub fn get_proxy(self) -> Proxy {
        let strategy: Arc<dyn ProxyStrategy> = match self.strategy {
            Some(strategy) => strategy,
            None if self.config.settings().proxy_target_type
                || self.config.target_source().interfaces().is_empty() =>
            {
                Arc::new(SubtypeProxy)
            }
            None => Arc::new(InterfaceProxy),
        };
        debug!(
            shape = strategy.shape(),
            advisor_count = self.config.advisor_count(),
            "Created proxy"
        );
        Proxy::new(Arc::new(self.config), strategy)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use super::*;
    use crate::error::Throwable;
    use crate::foundation::{Target, Type};
    use crate::framework::advice;
    use crate::framework::context::{current_join_point, expose_invocation_advisor};

    struct Lecturer {
        calls: AtomicUsize,
    }

    fn lecturer_type() -> Type {
        Type::new("Lecturer")
    }

    fn teaching() -> Type {
        Type::new("Teaching")
    }

    fn teach() -> Method {
        Method::new(&teaching(), "teach")
            .param(Type::string())
            .returns(Type::string())
    }

    fn rest() -> Method {
        Method::new(&lecturer_type(), "rest")
    }

    impl Target for Lecturer {
        fn target_type(&self) -> Type {
            lecturer_type()
        }

        fn invoke(&self, method: &Method, args: &[Value]) -> InvocationResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match method.name() {
                "teach" => {
                    let topic = args.first().and_then(Value::as_str).unwrap_or_default();
                    Ok(Some(Value::string(format!("lesson on {topic}"))))
                }
                "rest" => Ok(None),
                _ => Err(Throwable::new(Type::error(), "unknown method").into()),
            }
        }
    }

    fn source(lecturer: Arc<Lecturer>) -> TargetSource {
        TargetSource::from_arc(lecturer).interface(teaching())
    }

    #[test]
    fn test_empty_chain_calls_target_directly() {
        let lecturer = Arc::new(Lecturer { calls: AtomicUsize::new(0) });
        let proxy = ProxyFactory::new(source(lecturer.clone())).get_proxy();

        let out = proxy.invoke(&teach(), vec![Value::string("rust")]).unwrap();
        assert_eq!(out.unwrap().as_str(), Some("lesson on rust"));
        assert_eq!(lecturer.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_shape_selection() {
        let lecturer = Arc::new(Lecturer { calls: AtomicUsize::new(0) });
        let interface = ProxyFactory::new(source(lecturer.clone())).get_proxy();
        assert_eq!(interface.shape(), "interface");
        assert!(matches!(
            interface.invoke(&rest(), vec![]),
            Err(InvocationError::NotProxied { .. })
        ));

        let subtype = ProxyFactory::new(source(lecturer.clone()))
            .proxy_target_type(true)
            .get_proxy();
        assert_eq!(subtype.shape(), "subtype");
        assert!(subtype.invoke(&rest(), vec![]).unwrap().is_none());

        let bare = ProxyFactory::new(TargetSource::from_arc(lecturer)).get_proxy();
        assert_eq!(bare.shape(), "subtype");
    }

    #[test]
    fn test_advice_sees_proxy_and_join_point() {
        let lecturer = Arc::new(Lecturer { calls: AtomicUsize::new(0) });
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);

        let proxy = ProxyFactory::new(source(lecturer))
            .advisor(expose_invocation_advisor())
            .advice(advice::before(move |method, args, _| {
                let jp = current_join_point()?;
                assert!(jp.this().is_some());
                seen_clone.lock().push(format!("{} {:?}", method.name(), args[0].as_str()));
                Ok(())
            }))
            .get_proxy();

        proxy.invoke(&teach(), vec![Value::string("aop")]).unwrap();
        assert_eq!(*seen.lock(), vec!["teach Some(\"aop\")".to_string()]);
    }

    #[test]
    fn test_advice_added_after_creation_applies() {
        let lecturer = Arc::new(Lecturer { calls: AtomicUsize::new(0) });
        let proxy = ProxyFactory::new(source(lecturer)).get_proxy();
        proxy.invoke(&teach(), vec![Value::string("a")]).unwrap();

        proxy.config().add_advice(advice::around(|_| Ok(Some(Value::string("intercepted")))));
        let out = proxy.invoke(&teach(), vec![Value::string("a")]).unwrap();
        assert_eq!(out.unwrap().as_str(), Some("intercepted"));
    }
}
