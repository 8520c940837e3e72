//! Method descriptors and their cache identity.

use std::fmt;
use std::sync::Arc;

use super::types::Type;

#[derive(Debug, Clone)]
struct MethodInfo {
    declaring_type: Type,
    name: String,
    parameter_types: Vec<Type>,
    return_type: Type,
}

/// Describes an interceptable method.
///
/// `Method` is cheap to clone and immutable once shared; the builder methods
/// copy the underlying data only when it is shared with another handle.
///
/// ```rust,ignore
/// let lecturer = Type::new("Lecturer");
/// let teach = Method::new(&lecturer, "teach")
///     .param(Type::string())
///     .returns(Type::string());
/// ```
#[derive(Clone)]
pub struct Method {
    inner: Arc<MethodInfo>,
}

impl Method {
    /// Creates a method with no parameters returning `void`.
    pub fn new(declaring_type: &Type, name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(MethodInfo {
                declaring_type: declaring_type.clone(),
                name: name.into(),
                parameter_types: Vec::new(),
                return_type: Type::void(),
            }),
        }
    }

    fn info_mut(&mut self) -> &mut MethodInfo {
        Arc::make_mut(&mut self.inner)
    }

    /// Appends a parameter type.
    pub fn param(mut self, ty: Type) -> Self {
        self.info_mut().parameter_types.push(ty);
        self
    }

    /// Replaces all parameter types.
    pub fn params(mut self, types: impl IntoIterator<Item = Type>) -> Self {
        self.info_mut().parameter_types = types.into_iter().collect();
        self
    }

    /// Sets the declared return type.
    pub fn returns(mut self, ty: Type) -> Self {
        self.info_mut().return_type = ty;
        self
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn declaring_type(&self) -> &Type {
        &self.inner.declaring_type
    }

    pub fn parameter_types(&self) -> &[Type] {
        &self.inner.parameter_types
    }

    pub fn parameter_count(&self) -> usize {
        self.inner.parameter_types.len()
    }

    pub fn return_type(&self) -> &Type {
        &self.inner.return_type
    }

    /// Returns the identity used to key per-method caches.
    pub fn key(&self) -> MethodKey {
        MethodKey {
            declaring_type: self.inner.declaring_type.name().to_string(),
            name: self.inner.name.clone(),
            parameter_types: self
                .inner
                .parameter_types
                .iter()
                .map(|ty| ty.name().to_string())
                .collect(),
        }
    }

    /// Returns whether two handles describe the same method.
    pub fn same_as(&self, other: &Method) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner) || self.key() == other.key()
    }
}

impl PartialEq for Method {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl Eq for Method {}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}.{}(", self.return_type(), self.declaring_type(), self.name())?;
        for (i, ty) in self.parameter_types().iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{ty}")?;
        }
        f.write_str(")")
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Method({self})")
    }
}

/// Collision-free identity of a method: declaring type, name and parameter types.
///
/// Two methods with identical names and parameters declared on unrelated
/// types produce different keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodKey {
    declaring_type: String,
    name: String,
    parameter_types: Vec<String>,
}

impl fmt::Display for MethodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}({})",
            self.declaring_type,
            self.name,
            self.parameter_types.join(",")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_does_not_touch_shared_handles() {
        let lecturer = Type::new("Lecturer");
        let base = Method::new(&lecturer, "teach");
        let with_param = base.clone().param(Type::string());

        assert_eq!(base.parameter_count(), 0);
        assert_eq!(with_param.parameter_count(), 1);
        assert_ne!(base, with_param);
    }

    #[test]
    fn test_key_distinguishes_declaring_types() {
        let a = Method::new(&Type::new("Lecturer"), "teach").param(Type::string());
        let b = Method::new(&Type::new("Student"), "teach").param(Type::string());

        assert_ne!(a.key(), b.key());
        assert_eq!(a.key(), a.clone().key());
        assert_eq!(a.key().to_string(), "Lecturer.teach(string)");
    }

    #[test]
    fn test_display() {
        let m = Method::new(&Type::new("Lecturer"), "grade")
            .params([Type::string(), Type::integer()])
            .returns(Type::boolean());
        assert_eq!(m.to_string(), "boolean Lecturer.grade(string, integer)");
    }
}
