//! Tower integration for proxies.
//!
//! [`Proxy`] implements `tower::Service<MethodCall>`, so a proxied object can
//! be placed behind Tower middleware. Calls run synchronously; the returned
//! future is always ready.

use std::task::{Context, Poll};

use futures::future::{Ready, ready};
use tower::Service;

use crate::error::{InvocationError, InvocationResult};
use crate::foundation::{Method, Value};
use crate::proxy::factory::Proxy;

/// A single method call routed through a proxy.
#[derive(Debug, Clone)]
pub struct MethodCall {
    pub method: Method,
    pub args: Vec<Value>,
}

impl MethodCall {
    pub fn new(method: Method, args: Vec<Value>) -> Self {
        Self { method, args }
    }
}

/// Allows applying Tower middleware directly to a proxy.
///
/// # Example
///
/// ```rust,ignore
/// use tower::ServiceExt;
///
/// let answer = proxy.oneshot(MethodCall::new(teach, vec![Value::string("rust")])).await?;
/// ```
impl Service<MethodCall> for Proxy {
    type Response = Option<Value>;
    type Error = InvocationError;
    type Future = Ready<InvocationResult>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, call: MethodCall) -> Self::Future {
        ready(self.invoke(&call.method, call.args))
    }
}

#[cfg(test)]
mod tests {
    use tower::ServiceExt;

    use super::*;
    use crate::foundation::{Target, TargetSource, Type};
    use crate::framework::advice;
    use crate::proxy::factory::ProxyFactory;

    struct Doubler;

    impl Target for Doubler {
        fn target_type(&self) -> Type {
            Type::new("Doubler")
        }

        fn invoke(&self, _method: &Method, args: &[Value]) -> InvocationResult {
            let n = args.first().and_then(Value::as_integer).unwrap_or(0);
            Ok(Some(Value::integer(n * 2)))
        }
    }

    fn double() -> Method {
        Method::new(&Type::new("Doubler"), "double")
            .param(Type::integer())
            .returns(Type::integer())
    }

    #[test]
    fn test_proxy_as_service() {
        let proxy = ProxyFactory::new(TargetSource::new(Doubler))
            .advice(advice::around(|inv| {
                let n = inv.arguments()[0].as_integer().unwrap_or(0);
                inv.set_arguments(vec![Value::integer(n + 1)]);
                inv.proceed()
            }))
            .get_proxy();

        let out = tokio_test::block_on(proxy.oneshot(MethodCall::new(double(), vec![Value::integer(20)])))
            .unwrap();
        assert_eq!(out.and_then(|v| v.as_integer()), Some(42));
    }

    #[test]
    fn test_service_surfaces_errors() {
        let proxy = ProxyFactory::new(TargetSource::new(Doubler).interface(Type::new("Math")))
            .get_proxy();
        let result = tokio_test::block_on(proxy.oneshot(MethodCall::new(double(), vec![])));
        assert!(matches!(result, Err(InvocationError::NotProxied { shape: "interface", .. })));
    }
}
