//! Type-erased argument and return values.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use super::types::Type;

/// A runtime value flowing through an interception chain.
///
/// A value carries its runtime [`Type`] next to a shared, type-erased payload.
/// Cloning a value is cheap and never copies the payload.
#[derive(Clone)]
pub struct Value {
    ty: Type,
    data: Arc<dyn Any + Send + Sync>,
}

impl Value {
    /// Wraps `data` as a value of runtime type `ty`.
    pub fn new<T>(ty: Type, data: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self {
            ty,
            data: Arc::new(data),
        }
    }

    pub fn string(s: impl Into<String>) -> Self {
        Self::new(Type::string(), s.into())
    }

    pub fn integer(i: i64) -> Self {
        Self::new(Type::integer(), i)
    }

    pub fn boolean(b: bool) -> Self {
        Self::new(Type::boolean(), b)
    }

    /// Returns the runtime type of this value.
    pub fn value_type(&self) -> &Type {
        &self.ty
    }

    /// Attempts to view the payload as a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.data.downcast_ref::<T>()
    }

    pub fn as_str(&self) -> Option<&str> {
        self.downcast_ref::<String>().map(String::as_str)
    }

    pub fn as_integer(&self) -> Option<i64> {
        self.downcast_ref::<i64>().copied()
    }

    pub fn as_boolean(&self) -> Option<bool> {
        self.downcast_ref::<bool>().copied()
    }

    /// Returns whether both values share the same payload allocation.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(s) = self.as_str() {
            write!(f, "{}({s:?})", self.ty)
        } else if let Some(i) = self.as_integer() {
            write!(f, "{}({i})", self.ty)
        } else if let Some(b) = self.as_boolean() {
            write!(f, "{}({b})", self.ty)
        } else {
            write!(f, "{}(..)", self.ty)
        }
    }
}
