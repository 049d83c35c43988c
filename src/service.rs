//! Type descriptors and service keys.

use std::any::TypeId;
use std::fmt;

/// Runtime description of a Rust type: its `TypeId` plus its name.
///
/// This is the only structural information Rust gives us about a type at
/// runtime, so every type model is built from one of these.
///
/// # Examples
///
/// ```rust
/// use ferrous_whitebox::TypeDescriptor;
///
/// let string = TypeDescriptor::of::<String>();
/// assert_eq!(string.name(), "alloc::string::String");
/// assert_eq!(string, TypeDescriptor::of::<String>());
/// assert_ne!(string, TypeDescriptor::of::<u32>());
/// ```
#[derive(Clone, Copy)]
pub struct TypeDescriptor {
    id: TypeId,
    name: &'static str,
}

impl TypeDescriptor {
    /// Describes `T`. Works for unsized types such as `dyn Trait` and `str`.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// The `std::any::type_name` of the described type.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

// Identity is the TypeId; the name is diagnostic only
impl PartialEq for TypeDescriptor {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeDescriptor {}

impl std::hash::Hash for TypeDescriptor {
    #[inline]
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Key a component can be resolved by.
///
/// # Examples
///
/// ```rust
/// use ferrous_whitebox::{Service, TypeDescriptor};
///
/// let plain = Service::of::<u32>();
/// let keyed = Service::keyed::<u32>("port");
///
/// assert_eq!(plain.service_type(), TypeDescriptor::of::<u32>());
/// assert_eq!(plain.service_key(), None);
/// assert_eq!(keyed.service_key(), Some("port"));
/// assert_ne!(plain, keyed);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    /// Resolved by type alone
    Typed(TypeDescriptor),
    /// Resolved by type and a string key
    Keyed(TypeDescriptor, &'static str),
}

impl Service {
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Service::Typed(TypeDescriptor::of::<T>())
    }

    #[inline]
    pub fn keyed<T: ?Sized + 'static>(key: &'static str) -> Self {
        Service::Keyed(TypeDescriptor::of::<T>(), key)
    }

    pub fn service_type(&self) -> TypeDescriptor {
        match self {
            Service::Typed(ty) | Service::Keyed(ty, _) => *ty,
        }
    }

    pub fn service_key(&self) -> Option<&'static str> {
        match self {
            Service::Typed(_) => None,
            Service::Keyed(_, key) => Some(key),
        }
    }

    /// Type name used in error messages and cycle paths.
    pub fn display_name(&self) -> &'static str {
        self.service_type().name()
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Service::Typed(ty) => write!(f, "{}", ty),
            Service::Keyed(ty, key) => write!(f, "({}) {}", key, ty),
        }
    }
}
