//! Opaque argument values that remember their runtime type
//!
//! Handler constructors are matched against the runtime types of their
//! arguments, and call arguments may be absent. [`Value`] carries a
//! [`TypeTag`] next to the shared payload so both questions can be answered
//! without knowing the concrete type up front.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Runtime identity of a type, with a readable name for diagnostics
///
/// Equality and hashing use only the [`TypeId`].
#[derive(Clone, Copy)]
pub struct TypeTag {
    id: TypeId,
    name: &'static str,
}

impl TypeTag {
    /// Tag for `T`
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The underlying type id
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeTag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeTag {}

impl Hash for TypeTag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A shared, type-erased argument value
#[derive(Clone)]
pub struct Value {
    tag: TypeTag,
    inner: Arc<dyn Any + Send + Sync>,
}

impl Value {
    /// Wrap a value
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            tag: TypeTag::of::<T>(),
            inner: Arc::new(value),
        }
    }

    /// Wrap an already shared value without copying it
    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self {
            tag: TypeTag::of::<T>(),
            inner: value,
        }
    }

    /// Runtime type of the payload
    pub fn type_tag(&self) -> TypeTag {
        self.tag
    }

    /// Check whether the payload is a `T`
    pub fn is<T: Any>(&self) -> bool {
        self.tag.id() == TypeId::of::<T>()
    }

    /// Borrow the payload as `T`
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Share the payload as `Arc<T>`
    pub fn downcast_arc<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.inner).downcast::<T>().ok()
    }

    /// Whether both values point at the same payload
    pub fn ptr_eq(&self, other: &Value) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value({})", self.tag.name())
    }
}

/// Positional call arguments; `None` is an absent value
pub type Arguments = Vec<Option<Value>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_remembers_runtime_type() {
        let value = Value::new(String::from("checkout"));
        assert!(value.is::<String>());
        assert!(!value.is::<&str>());
        assert_eq!(value.type_tag(), TypeTag::of::<String>());
        assert_eq!(value.downcast_ref::<String>().map(String::as_str), Some("checkout"));
        assert!(value.downcast_ref::<u32>().is_none());
    }

    #[test]
    fn test_clones_share_payload() {
        let value = Value::new(vec![1u8, 2, 3]);
        let clone = value.clone();
        assert!(value.ptr_eq(&clone));
        assert!(!value.ptr_eq(&Value::new(vec![1u8, 2, 3])));

        let shared = clone.downcast_arc::<Vec<u8>>().unwrap();
        assert_eq!(shared.len(), 3);
    }

    #[test]
    fn test_type_tag_equality_ignores_name() {
        assert_eq!(TypeTag::of::<i32>(), TypeTag::of::<i32>());
        assert_ne!(TypeTag::of::<i32>(), TypeTag::of::<i64>());
        assert!(TypeTag::of::<String>().name().ends_with("String"));
    }
}
