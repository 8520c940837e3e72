//! The Weaver: registered aspects plus configuration, turned into proxies.
//!
//! ```rust,ignore
//! use weave_runtime::Weaver;
//!
//! let weaver = Weaver::builder(Arc::new(my_parser))
//!     .config_file("weave.toml")
//!     .build()?;
//!
//! weaver.register_singleton(audit_metadata, Value::new(audit_type, Audit::default()))?;
//! let proxy = weaver.proxy(TargetSource::new(Lecturer));
//! ```

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};
use weave_aspect::{
    AspectAdvisorFactory, AspectInstanceFactory, AspectMetadata, PointcutParser,
    SimpleAspectInstanceFactory, SingletonAspectInstanceFactory,
    make_advisor_chain_aspect_capable,
};
use weave_core::{BoxedAdvisor, Proxy, ProxyFactory, TargetSource, Value};

use crate::config::{ConfigLoader, ConfigResult, WeaveConfig};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;

struct RegisteredAspect {
    name: String,
    enabled: bool,
    advisors: Vec<BoxedAdvisor>,
}

/// Counts reported by [`Weaver::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WeaverStats {
    pub aspects: usize,
    pub enabled_aspects: usize,
    pub advisors: usize,
}

/// Assembles proxies from registered aspects and configuration.
///
/// Aspects contribute advisors in registration order; advisors added with
/// [`add_advisor`](Self::add_advisor) follow them.
pub struct Weaver {
    config: WeaveConfig,
    factory: AspectAdvisorFactory,
    aspects: RwLock<Vec<RegisteredAspect>>,
    advisors: RwLock<Vec<BoxedAdvisor>>,
}

impl Weaver {
    /// Creates a weaver, loading configuration from the default locations.
    ///
    /// Falls back to the default configuration when loading fails.
    pub fn new(parser: Arc<dyn PointcutParser>) -> Self {
        let config = ConfigLoader::new().load().unwrap_or_else(|e| {
            eprintln!("Warning: Failed to load config ({e}), using defaults");
            WeaveConfig::default()
        });
        Self::from_config(&config, parser)
    }

    pub fn builder(parser: Arc<dyn PointcutParser>) -> WeaverBuilder {
        WeaverBuilder::new(parser)
    }

    /// Creates a weaver from an already loaded configuration and initializes
    /// logging from it.
    pub fn from_config(config: &WeaveConfig, parser: Arc<dyn PointcutParser>) -> Self {
        logging::init_from_config(&config.logging);

        info!(
            log_level = %config.logging.level,
            proxy_target_type = config.proxy.proxy_target_type,
            expose_invocation = config.proxy.expose_invocation,
            "Weaver initialized from configuration"
        );

        Self {
            config: config.clone(),
            factory: AspectAdvisorFactory::new(parser),
            aspects: RwLock::new(Vec::new()),
            advisors: RwLock::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &WeaveConfig {
        &self.config
    }

    /// Registers an aspect backed by one shared instance.
    pub fn register_singleton(&self, metadata: AspectMetadata, instance: Value) -> RuntimeResult<()> {
        let metadata = self.configure(metadata)?;
        self.register(Arc::new(SingletonAspectInstanceFactory::new(instance, metadata)))
    }

    /// Registers an aspect whose instance is created by `create` on first use.
    pub fn register_factory<F>(&self, metadata: AspectMetadata, create: F) -> RuntimeResult<()>
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        let metadata = self.configure(metadata)?;
        self.register(Arc::new(SimpleAspectInstanceFactory::new(metadata, create)))
    }

    /// Applies the configured advice descriptors of the aspect.
    fn configure(&self, mut metadata: AspectMetadata) -> RuntimeResult<AspectMetadata> {
        let Some(section) = self.config.aspect(metadata.name()) else {
            return Ok(metadata);
        };
        for advice in &section.advice {
            if metadata.method_mut(&advice.method).is_none() {
                return Err(RuntimeError::UnknownAdviceMethod {
                    aspect: section.name.clone(),
                    method: advice.method.clone(),
                });
            }
            metadata.set_descriptor(&advice.method, advice.descriptor.clone())?;
            debug!(
                aspect = %section.name,
                method = %advice.method,
                kind = %advice.descriptor.kind,
                "Applied configured advice descriptor"
            );
        }
        Ok(metadata)
    }

    fn register(&self, instances: Arc<dyn AspectInstanceFactory>) -> RuntimeResult<()> {
        let name = instances.metadata().name().to_string();
        if self.aspects.read().iter().any(|aspect| aspect.name == name) {
            return Err(RuntimeError::AspectExists(name));
        }

        let enabled = self.config.aspect(&name).is_none_or(|section| section.enabled);
        let advisors = if enabled {
            self.factory.advisors(instances)?
        } else {
            Vec::new()
        };

        info!(
            aspect = %name,
            enabled,
            advisor_count = advisors.len(),
            "Registered aspect"
        );

        let mut aspects = self.aspects.write();
        if aspects.iter().any(|aspect| aspect.name == name) {
            return Err(RuntimeError::AspectExists(name));
        }
        aspects.push(RegisteredAspect {
            name,
            enabled,
            advisors,
        });
        Ok(())
    }

    /// Removes a registered aspect. Existing proxies keep their advisors.
    pub fn unregister_aspect(&self, name: &str) -> RuntimeResult<()> {
        let mut aspects = self.aspects.write();
        let index = aspects
            .iter()
            .position(|aspect| aspect.name == name)
            .ok_or_else(|| RuntimeError::AspectNotFound(name.to_string()))?;
        aspects.remove(index);
        info!(aspect = %name, "Unregistered aspect");
        Ok(())
    }

    /// Adds an imperative advisor applied to every proxy created afterwards.
    pub fn add_advisor(&self, advisor: BoxedAdvisor) {
        debug!(advisor = %advisor.describe(), "Added advisor");
        self.advisors.write().push(advisor);
    }

    pub fn aspect_names(&self) -> Vec<String> {
        self.aspects.read().iter().map(|aspect| aspect.name.clone()).collect()
    }

    pub fn is_enabled(&self, name: &str) -> Option<bool> {
        self.aspects
            .read()
            .iter()
            .find(|aspect| aspect.name == name)
            .map(|aspect| aspect.enabled)
    }

    /// All advisors a new proxy would receive, in order.
    pub fn advisors(&self) -> Vec<BoxedAdvisor> {
        let mut advisors: Vec<BoxedAdvisor> = self
            .aspects
            .read()
            .iter()
            .flat_map(|aspect| aspect.advisors.iter().cloned())
            .collect();
        advisors.extend(self.advisors.read().iter().cloned());

        if self.config.proxy.expose_invocation {
            make_advisor_chain_aspect_capable(&mut advisors);
        }
        advisors
    }

    /// Creates a proxy for `target` carrying every current advisor.
    pub fn proxy(&self, target: TargetSource) -> Proxy {
        let advisors = self.advisors();
        debug!(
            target_type = %target.target_type(),
            advisor_count = advisors.len(),
            "Weaving proxy"
        );
        ProxyFactory::new(target)
            .settings(self.config.proxy.to_settings())
            .advisors(advisors)
            .get_proxy()
    }

    pub fn stats(&self) -> WeaverStats {
        let aspects = self.aspects.read();
        WeaverStats {
            aspects: aspects.len(),
            enabled_aspects: aspects.iter().filter(|aspect| aspect.enabled).count(),
            advisors: aspects.iter().map(|aspect| aspect.advisors.len()).sum::<usize>()
                + self.advisors.read().len(),
        }
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for a [`Weaver`] with custom configuration loading.
pub struct WeaverBuilder {
    parser: Arc<dyn PointcutParser>,
    config_loader: ConfigLoader,
}

impl WeaverBuilder {
    pub fn new(parser: Arc<dyn PointcutParser>) -> Self {
        Self {
            parser,
            config_loader: ConfigLoader::new(),
        }
    }

    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    pub fn merge(mut self, config: WeaveConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    pub fn build(self) -> ConfigResult<Weaver> {
        let config = self.config_loader.load()?;
        Ok(Weaver::from_config(&config, self.parser))
    }
}

#[cfg(test)]
mod tests {
    use weave_aspect::testing::GlobParser;
    use weave_aspect::{AdviceDescriptor, AdviceMethod};
    use weave_core::framework::is_expose_invocation_advisor;
    use weave_core::{InvocationResult, Method, Target, Type, advice};

    use super::*;
    use crate::config::{AdviceConfig, AspectConfig};

    struct Lecturer;

    impl Target for Lecturer {
        fn target_type(&self) -> Type {
            Type::new("Lecturer")
        }

        fn invoke(&self, _method: &Method, _args: &[Value]) -> InvocationResult {
            Ok(Some(Value::string("lecture")))
        }
    }

    fn weaver(config: WeaveConfig) -> Weaver {
        Weaver::from_config(&config, Arc::new(GlobParser))
    }

    fn audit() -> AspectMetadata {
        AspectMetadata::new("Audit", Type::new("Audit")).method(
            AdviceMethod::new("log_entry", |_, _| Ok(None)).before("within(Lecturer)"),
        )
    }

    #[test]
    fn test_register_and_proxy() {
        let weaver = weaver(WeaveConfig::default());
        weaver.register_singleton(audit(), Value::string("audit")).unwrap();

        let advisors = weaver.advisors();
        assert_eq!(advisors.len(), 2);
        assert!(is_expose_invocation_advisor(&advisors[0]));

        let proxy = weaver.proxy(TargetSource::new(Lecturer));
        let lecture = Method::new(&Type::new("Lecturer"), "lecture");
        let result = proxy.invoke(&lecture, vec![]).unwrap();
        assert_eq!(result.as_ref().and_then(Value::as_str), Some("lecture"));
    }

    #[test]
    fn test_duplicate_aspect() {
        let weaver = weaver(WeaveConfig::default());
        weaver.register_singleton(audit(), Value::string("audit")).unwrap();
        let err = weaver
            .register_singleton(audit(), Value::string("audit"))
            .unwrap_err();
        assert!(matches!(err, RuntimeError::AspectExists(_)));
    }

    #[test]
    fn test_disabled_aspect_contributes_nothing() {
        let config = WeaveConfig {
            aspects: vec![AspectConfig {
                name: "Audit".to_string(),
                enabled: false,
                advice: vec![],
            }],
            ..Default::default()
        };
        let weaver = weaver(config);
        weaver.register_singleton(audit(), Value::string("audit")).unwrap();

        assert_eq!(weaver.is_enabled("Audit"), Some(false));
        assert!(weaver.advisors().is_empty());
        assert_eq!(
            weaver.stats(),
            WeaverStats {
                aspects: 1,
                enabled_aspects: 0,
                advisors: 0
            }
        );
    }

    #[test]
    fn test_configured_descriptor_replaces_code() {
        let config = WeaveConfig {
            aspects: vec![AspectConfig {
                name: "Audit".to_string(),
                enabled: true,
                advice: vec![AdviceConfig {
                    method: "log_entry".to_string(),
                    descriptor: AdviceDescriptor::before("within(Student)"),
                }],
            }],
            ..Default::default()
        };
        let weaver = weaver(config);
        weaver.register_singleton(audit(), Value::string("audit")).unwrap();

        let described = weaver.advisors()[1].describe();
        assert!(described.ends_with("[within(Student)]"));
    }

    #[test]
    fn test_unknown_configured_method() {
        let config = WeaveConfig {
            aspects: vec![AspectConfig {
                name: "Audit".to_string(),
                enabled: true,
                advice: vec![AdviceConfig {
                    method: "missing".to_string(),
                    descriptor: AdviceDescriptor::before("within(Lecturer)"),
                }],
            }],
            ..Default::default()
        };
        let err = weaver(config)
            .register_singleton(audit(), Value::string("audit"))
            .unwrap_err();
        assert!(matches!(err, RuntimeError::UnknownAdviceMethod { .. }));
    }

    #[test]
    fn test_expose_invocation_can_be_disabled() {
        let mut config = WeaveConfig::default();
        config.proxy.expose_invocation = false;
        let weaver = weaver(config);
        weaver.register_singleton(audit(), Value::string("audit")).unwrap();
        weaver.add_advisor(Arc::new(weave_core::DefaultPointcutAdvisor::new(
            advice::around(|invocation| invocation.proceed()),
        )));

        let advisors = weaver.advisors();
        assert_eq!(advisors.len(), 2);
        assert!(!advisors.iter().any(is_expose_invocation_advisor));
    }

    #[test]
    fn test_unregister() {
        let weaver = weaver(WeaveConfig::default());
        weaver.register_singleton(audit(), Value::string("audit")).unwrap();
        weaver.unregister_aspect("Audit").unwrap();
        assert!(weaver.aspect_names().is_empty());
        assert!(matches!(
            weaver.unregister_aspect("Audit"),
            Err(RuntimeError::AspectNotFound(_))
        ));
    }
}
