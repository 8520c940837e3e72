//! Aspect instance factories.
//!
//! Advice methods run against an aspect instance. A factory decides where that
//! instance comes from: a shared value, a fresh one per request, or a value
//! created once on first use.

use std::fmt;
use std::sync::{Arc, OnceLock};

use tracing::debug;
use weave_core::Value;

use crate::metadata::AspectMetadata;

/// Supplies the aspect instance advice methods run against.
pub trait AspectInstanceFactory: Send + Sync {
    fn aspect_instance(&self) -> Value;

    fn metadata(&self) -> &AspectMetadata;
}

/// Always returns the same instance.
pub struct SingletonAspectInstanceFactory {
    instance: Value,
    metadata: AspectMetadata,
}

impl SingletonAspectInstanceFactory {
    pub fn new(instance: Value, metadata: AspectMetadata) -> Self {
        Self { instance, metadata }
    }
}

impl AspectInstanceFactory for SingletonAspectInstanceFactory {
    fn aspect_instance(&self) -> Value {
        self.instance.clone()
    }

    fn metadata(&self) -> &AspectMetadata {
        &self.metadata
    }
}

type Create = Arc<dyn Fn() -> Value + Send + Sync>;

/// Creates a new instance on every request.
pub struct SimpleAspectInstanceFactory {
    create: Create,
    metadata: AspectMetadata,
}

impl SimpleAspectInstanceFactory {
    pub fn new<F>(metadata: AspectMetadata, create: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Self {
            create: Arc::new(create),
            metadata,
        }
    }
}

impl AspectInstanceFactory for SimpleAspectInstanceFactory {
    fn aspect_instance(&self) -> Value {
        (self.create)()
    }

    fn metadata(&self) -> &AspectMetadata {
        &self.metadata
    }
}

/// Asks the wrapped factory once and keeps the result.
///
/// Concurrent first requests wait for the one that creates the instance, so
/// the wrapped factory is asked at most once.
pub struct LazySingletonAspectInstanceFactory {
    inner: Arc<dyn AspectInstanceFactory>,
    instance: OnceLock<Value>,
}

impl LazySingletonAspectInstanceFactory {
    pub fn new(inner: Arc<dyn AspectInstanceFactory>) -> Self {
        Self {
            inner,
            instance: OnceLock::new(),
        }
    }

    /// Whether the instance has been created yet.
    pub fn is_materialized(&self) -> bool {
        self.instance.get().is_some()
    }
}

impl AspectInstanceFactory for LazySingletonAspectInstanceFactory {
    fn aspect_instance(&self) -> Value {
        self.instance
            .get_or_init(|| {
                debug!(aspect = self.inner.metadata().name(), "Instantiating aspect");
                self.inner.aspect_instance()
            })
            .clone()
    }

    fn metadata(&self) -> &AspectMetadata {
        self.inner.metadata()
    }
}

impl fmt::Debug for LazySingletonAspectInstanceFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazySingletonAspectInstanceFactory")
            .field("aspect", &self.metadata().name())
            .field("materialized", &self.is_materialized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::thread;
    use std::time::Duration;

    use weave_core::Type;

    use super::*;

    #[test]
    fn test_simple_factory_creates_each_time() {
        let counter = Arc::new(AtomicI64::new(0));
        let seen = counter.clone();
        let factory = SimpleAspectInstanceFactory::new(
            AspectMetadata::new("Counter", Type::new("Counter")),
            move || Value::integer(seen.fetch_add(1, Ordering::SeqCst)),
        );
        assert_eq!(factory.aspect_instance().as_integer(), Some(0));
        assert_eq!(factory.aspect_instance().as_integer(), Some(1));
    }

    #[test]
    fn test_lazy_singleton_creates_once() {
        let counter = Arc::new(AtomicI64::new(0));
        let seen = counter.clone();
        let lazy = LazySingletonAspectInstanceFactory::new(Arc::new(
            SimpleAspectInstanceFactory::new(
                AspectMetadata::new("Counter", Type::new("Counter")),
                move || Value::integer(seen.fetch_add(1, Ordering::SeqCst)),
            ),
        ));

        assert!(!lazy.is_materialized());
        let first = lazy.aspect_instance();
        let second = lazy.aspect_instance();
        assert!(first.ptr_eq(&second));
        assert!(lazy.is_materialized());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(lazy.metadata().name(), "Counter");
    }

    #[test]
    fn test_lazy_singleton_racing_first_requests() {
        let counter = Arc::new(AtomicI64::new(0));
        let seen = counter.clone();
        let lazy = LazySingletonAspectInstanceFactory::new(Arc::new(
            SimpleAspectInstanceFactory::new(
                AspectMetadata::new("Counter", Type::new("Counter")),
                move || {
                    thread::sleep(Duration::from_millis(10));
                    Value::integer(seen.fetch_add(1, Ordering::SeqCst))
                },
            ),
        ));
        let barrier = Barrier::new(8);

        let instances: Vec<Value> = thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        lazy.aspect_instance()
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .collect()
        });

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(instances.iter().all(|instance| instance.ptr_eq(&instances[0])));
        assert!(instances[0].ptr_eq(&lazy.aspect_instance()));
    }
}
