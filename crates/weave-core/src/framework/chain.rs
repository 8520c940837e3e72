//! Interceptor chain construction.
//!
//! The chain for a call is built by walking the advisors in order. Each
//! advisor whose pointcut accepts the (method, runtime target type) pair, or
//! that has no pointcut, contributes the interceptors its advice normalizes
//! into. Results are memoized by the proxy configuration, not here.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::AopResult;
use crate::foundation::{Method, Type};
use crate::framework::adapter::AdapterRegistry;
use crate::framework::advice::MethodInterceptor;
use crate::framework::advisor::BoxedAdvisor;

/// Builds the ordered interceptor list for one method.
pub trait ChainFactory: Send + Sync {
    /// `target_type` is the runtime type of the target; when unknown the
    /// method's declaring type is used.
    fn interceptors(
        &self,
        advisors: &[BoxedAdvisor],
        method: &Method,
        target_type: Option<&Type>,
    ) -> AopResult<Vec<Arc<dyn MethodInterceptor>>>;
}

/// The standard chain factory, backed by an [`AdapterRegistry`].
#[derive(Clone)]
pub struct DefaultChainFactory {
    registry: Arc<AdapterRegistry>,
}

impl Default for DefaultChainFactory {
    fn default() -> Self {
        Self::new(AdapterRegistry::global())
    }
}

impl DefaultChainFactory {
    pub fn new(registry: Arc<AdapterRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<AdapterRegistry> {
        &self.registry
    }
}

impl ChainFactory for DefaultChainFactory {
    fn interceptors(
        &self,
        advisors: &[BoxedAdvisor],
        method: &Method,
        target_type: Option<&Type>,
    ) -> AopResult<Vec<Arc<dyn MethodInterceptor>>> {
        let actual_type = target_type.unwrap_or_else(|| method.declaring_type());
        let mut chain = Vec::with_capacity(advisors.len());

        for advisor in advisors {
            if let Some(pointcut) = advisor.pointcut() {
                if !pointcut.matches_type(actual_type) {
                    trace!(advisor = %advisor.describe(), "Type filter rejected");
                    continue;
                }
                if !pointcut.method_filter().matches(method, actual_type) {
                    trace!(advisor = %advisor.describe(), "Method filter rejected");
                    continue;
                }
            }
            let advice = advisor.advice()?;
            chain.extend(self.registry.interceptors(&advice)?);
        }

        debug!(
            method = %method,
            target_type = %actual_type,
            advisor_count = advisors.len(),
            interceptor_count = chain.len(),
            "Built interceptor chain"
        );
        Ok(chain)
    }
}
