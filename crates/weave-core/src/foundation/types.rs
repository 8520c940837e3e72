//! Runtime type descriptors.
//!
//! Rust has no runtime class model, so interception works over explicit
//! [`Type`] handles. A type has a name and at most one supertype; assignability
//! is decided by walking the supertype chain.
//!
//! ```rust,ignore
//! use weave_core::Type;
//!
//! let io_error = Type::subtype("IoError", &Type::error());
//! let timeout = Type::subtype("TimeoutError", &io_error);
//!
//! assert!(io_error.is_assignable_from(&timeout));
//! assert!(Type::error().is_assignable_from(&timeout));
//! assert!(!timeout.is_assignable_from(&io_error));
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

#[derive(Debug)]
struct TypeInfo {
    name: String,
    supertype: Option<Type>,
}

/// A cheaply cloneable handle describing a runtime type.
///
/// Two handles are equal when their names are equal. Names are expected to be
/// unique within one program (use qualified names when in doubt).
#[derive(Clone)]
pub struct Type {
    inner: Arc<TypeInfo>,
}

macro_rules! well_known_type {
    ($(#[$meta:meta])* $fn_name:ident, $name:literal, $parent:expr) => {
        $(#[$meta])*
        pub fn $fn_name() -> Type {
            static TYPE: OnceLock<Type> = OnceLock::new();
            TYPE.get_or_init(|| Type::with_parent($name, $parent)).clone()
        }
    };
}

impl Type {
    fn with_parent(name: &str, supertype: Option<Type>) -> Self {
        Self {
            inner: Arc::new(TypeInfo {
                name: name.to_string(),
                supertype,
            }),
        }
    }

    /// Creates a new type directly under [`Type::object`].
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_parent(&name.into(), Some(Self::object()))
    }

    /// Creates a new type whose supertype is `parent`.
    pub fn subtype(name: impl Into<String>, parent: &Type) -> Self {
        Self::with_parent(&name.into(), Some(parent.clone()))
    }

    well_known_type!(
        /// The root of every non-void type.
        object, "object", None
    );
    well_known_type!(
        /// The "no value" return type. Only assignable to itself.
        void, "void", None
    );
    well_known_type!(
        /// The root of every thrown error type.
        error, "error", Some(Type::object())
    );
    well_known_type!(
        /// The root of every annotation (marker metadata) type.
        annotation, "annotation", Some(Type::object())
    );
    well_known_type!(string, "string", Some(Type::object()));
    well_known_type!(integer, "integer", Some(Type::object()));
    well_known_type!(boolean, "boolean", Some(Type::object()));
    well_known_type!(
        /// Parameter type of advice methods that receive the current join point.
        join_point, "join_point", Some(Type::object())
    );
    well_known_type!(
        /// Parameter type of around advice methods that may proceed.
        proceeding_join_point, "proceeding_join_point", Some(Type::join_point())
    );
    well_known_type!(
        /// Parameter type of advice methods that only need the static signature.
        static_part, "join_point_static_part", Some(Type::object())
    );

    /// Returns the type name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the direct supertype, if any.
    pub fn supertype(&self) -> Option<&Type> {
        self.inner.supertype.as_ref()
    }

    /// Iterates over this type and then each of its supertypes, most specific first.
    pub fn ancestors(&self) -> impl Iterator<Item = &Type> {
        std::iter::successors(Some(self), |ty| ty.supertype())
    }

    /// Returns whether a value of type `other` can be used where `self` is expected.
    pub fn is_assignable_from(&self, other: &Type) -> bool {
        if self.is_object() {
            return !other.is_void();
        }
        other.ancestors().any(|ancestor| ancestor == self)
    }

    /// Returns whether this type is (a subtype of) [`Type::error`].
    pub fn is_error(&self) -> bool {
        Self::error().is_assignable_from(self)
    }

    /// Returns whether this type is (a subtype of) [`Type::annotation`].
    pub fn is_annotation(&self) -> bool {
        Self::annotation().is_assignable_from(self)
    }

    /// Returns whether this is the root object type.
    pub fn is_object(&self) -> bool {
        self.name() == "object" && self.supertype().is_none()
    }

    /// Returns whether this is the void type.
    pub fn is_void(&self) -> bool {
        self.name() == "void" && self.supertype().is_none()
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner) || self.inner.name == other.inner.name
    }
}

impl Eq for Type {}

impl Hash for Type {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.name.hash(state);
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type({})", self.name())
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Tests
// ============================================================================
