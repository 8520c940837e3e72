//! The objects that sit behind a proxy.

use std::fmt;
use std::sync::Arc;

use super::method::Method;
use super::types::Type;
use super::value::Value;
use crate::error::InvocationResult;

/// The real object whose methods are intercepted.
///
/// `invoke` performs the actual method call once every interceptor in the
/// chain has proceeded.
pub trait Target: Send + Sync + 'static {
    /// The runtime type of this object, used for rule matching.
    fn target_type(&self) -> Type;

    /// Invokes `method` on this object.
    fn invoke(&self, method: &Method, args: &[Value]) -> InvocationResult;
}

/// A shared target trait object.
pub type BoxedTarget = Arc<dyn Target>;

/// Pairs a target with the interface types it is exposed through.
///
/// A source with interfaces can be fronted by an interface-shaped proxy,
/// which only dispatches methods declared on one of those interfaces.
#[derive(Clone)]
pub struct TargetSource {
    target: BoxedTarget,
    interfaces: Vec<Type>,
}

impl TargetSource {
    pub fn new(target: impl Target) -> Self {
        Self::from_arc(Arc::new(target))
    }

    pub fn from_arc(target: BoxedTarget) -> Self {
        Self {
            target,
            interfaces: Vec::new(),
        }
    }

    /// Declares an interface implemented by the target.
    pub fn interface(mut self, ty: Type) -> Self {
        self.interfaces.push(ty);
        self
    }

    pub fn target(&self) -> &BoxedTarget {
        &self.target
    }

    pub fn target_type(&self) -> Type {
        self.target.target_type()
    }

    pub fn interfaces(&self) -> &[Type] {
        &self.interfaces
    }
}

impl fmt::Debug for TargetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetSource")
            .field("target_type", &self.target.target_type())
            .field("interfaces", &self.interfaces)
            .finish()
    }
}
