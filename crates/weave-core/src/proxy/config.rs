//! Proxy configuration: the advisor list, the target and the chain cache.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::error::AopResult;
use crate::foundation::{Method, MethodKey, TargetSource, Type};
use crate::framework::advice::BoxedAdvice;
use crate::framework::advisor::{BoxedAdvisor, DefaultPointcutAdvisor};
use crate::framework::chain::{ChainFactory, DefaultChainFactory};
use crate::framework::invocation::InterceptorChain;

/// Settings that influence how a proxy is shaped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProxySettings {
    /// Always front the target with a subtype-shaped proxy, even when it
    /// exposes interfaces.
    pub proxy_target_type: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    method: MethodKey,
    target_type: Type,
}

#[derive(Default)]
struct ChainCache {
    /// Bumped on every advisor change; chains built against an older
    /// generation are returned but not stored.
    generation: u64,
    entries: HashMap<CacheKey, InterceptorChain>,
}

/// The mutable configuration shared by a proxy and its factory.
///
/// Advisors may be added or removed while proxies are in use; every change
/// clears the memoized chains.
pub struct AdvisedSupport {
    settings: ProxySettings,
    target: RwLock<TargetSource>,
    advisors: RwLock<Vec<BoxedAdvisor>>,
    chain_factory: Arc<dyn ChainFactory>,
    cache: RwLock<ChainCache>,
}

impl AdvisedSupport {
    pub fn new(target: TargetSource) -> Self {
        Self {
            settings: ProxySettings::default(),
            target: RwLock::new(target),
            advisors: RwLock::new(Vec::new()),
            chain_factory: Arc::new(DefaultChainFactory::default()),
            cache: RwLock::new(ChainCache::default()),
        }
    }

    pub fn with_settings(mut self, settings: ProxySettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_chain_factory(mut self, chain_factory: Arc<dyn ChainFactory>) -> Self {
        self.chain_factory = chain_factory;
        self
    }

    pub fn settings(&self) -> ProxySettings {
        self.settings
    }

    /// Returns a snapshot of the current target source.
    pub fn target_source(&self) -> TargetSource {
        self.target.read().clone()
    }

    /// Replaces the target. Cached chains stay valid since they are keyed by
    /// the runtime target type.
    pub fn set_target(&self, target: TargetSource) {
        *self.target.write() = target;
    }

    /// Appends an advisor.
    pub fn add_advisor(&self, advisor: BoxedAdvisor) {
        let mut advisors = self.advisors.write();
        advisors.push(advisor);
        self.advice_changed(advisors.len());
    }

    /// Inserts an advisor at `position`, clamped to the current length.
    pub fn insert_advisor(&self, position: usize, advisor: BoxedAdvisor) {
        let mut advisors = self.advisors.write();
        let position = position.min(advisors.len());
        advisors.insert(position, advisor);
        self.advice_changed(advisors.len());
    }

    /// Appends advice that applies to every method.
    pub fn add_advice(&self, advice: BoxedAdvice) {
        self.add_advisor(Arc::new(DefaultPointcutAdvisor::new(advice)));
    }

    /// Removes `advisor` (compared by identity). Returns whether it was present.
    pub fn remove_advisor(&self, advisor: &BoxedAdvisor) -> bool {
        let mut advisors = self.advisors.write();
        let Some(index) = advisors.iter().position(|a| Arc::ptr_eq(a, advisor)) else {
            return false;
        };
        advisors.remove(index);
        self.advice_changed(advisors.len());
        true
    }

    /// Returns a snapshot of the advisors in order.
    pub fn advisors(&self) -> Vec<BoxedAdvisor> {
        self.advisors.read().clone()
    }

    pub fn advisor_count(&self) -> usize {
        self.advisors.read().len()
    }

    pub fn cached_chain_count(&self) -> usize {
        self.cache.read().entries.len()
    }

    // Called with the advisor write lock held.
    fn advice_changed(&self, advisor_count: usize) {
        let mut cache = self.cache.write();
        cache.generation += 1;
        cache.entries.clear();
        debug!(advisor_count, generation = cache.generation, "Advisors changed, chain cache cleared");
    }

    /// Returns the interceptor chain for `method` called on a target of
    /// runtime type `target_type`, building and memoizing it on first use.
    ///
    /// Repeated calls return the same shared chain until the advisors change.
    pub fn interceptors(&self, method: &Method, target_type: &Type) -> AopResult<InterceptorChain> {
        let key = CacheKey {
            method: method.key(),
            target_type: target_type.clone(),
        };
        if let Some(chain) = self.cache.read().entries.get(&key) {
            trace!(method = %key.method, "Chain cache hit");
            return Ok(Arc::clone(chain));
        }

        let (generation, advisors) = {
            let advisors = self.advisors.read();
            (self.cache.read().generation, advisors.clone())
        };
        let chain: InterceptorChain = self
            .chain_factory
            .interceptors(&advisors, method, Some(target_type))?
            .into();

        let mut cache = self.cache.write();
        if cache.generation != generation {
            return Ok(chain);
        }
        Ok(Arc::clone(cache.entries.entry(key).or_insert(chain)))
    }
}

impl fmt::Debug for AdvisedSupport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdvisedSupport")
            .field("settings", &self.settings)
            .field("target", &*self.target.read())
            .field("advisor_count", &self.advisor_count())
            .field("cached_chains", &self.cached_chain_count())
            .finish()
    }
}
