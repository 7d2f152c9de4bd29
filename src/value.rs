//! Type-erased values flowing between programs and handlers.

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Anything a program can produce or consume as an intermediate result.
///
/// Values are shared between every clone of a program, so they must be
/// clonable and thread-safe.
pub trait ProgramValue: Any + Clone + Send + Sync {}
impl<T: Any + Clone + Send + Sync> ProgramValue for T {}

/// A shared, type-erased result.
///
/// Handlers answer instructions with a `Value`; typed continuations recover
/// the concrete type with [`Value::downcast`].
#[derive(Clone)]
pub struct Value {
    inner: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Value {
    /// Wrap a concrete value.
    pub fn new<T: ProgramValue>(value: T) -> Self {
        Self {
            inner: Arc::new(value),
            type_name: type_name::<T>(),
        }
    }

    /// The `()` value, used by instructions with nothing to report.
    pub fn unit() -> Self {
        static UNIT: OnceLock<Value> = OnceLock::new();
        UNIT.get_or_init(|| Value::new(())).clone()
    }

    /// Name of the wrapped type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn type_id(&self) -> TypeId {
        (*self.inner).type_id()
    }

    /// Whether the wrapped value is a `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    /// Borrow the wrapped value as a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Take the wrapped value out as a `T`, cloning only if it is still shared.
    ///
    /// Hands the value back unchanged when it is not a `T`.
    pub fn downcast<T: ProgramValue>(self) -> Result<T, Value> {
        let type_name = self.type_name;
        match self.inner.downcast::<T>() {
            Ok(shared) => Ok(Arc::try_unwrap(shared).unwrap_or_else(|shared| (*shared).clone())),
            Err(inner) => Err(Value { inner, type_name }),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value(<{}>)", self.type_name)
    }
}

/// The result type an instruction was emitted with.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Expect {
    id: TypeId,
    pub(crate) name: &'static str,
}

impl Expect {
    pub(crate) fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub(crate) fn matches(&self, value: &Value) -> bool {
        self.id == value.type_id()
    }
}

impl PartialEq for Expect {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Expect {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downcast_recovers_the_wrapped_value() {
        let value = Value::new(String::from("hello"));
        assert!(value.is::<String>());
        assert_eq!(value.downcast_ref::<String>().map(String::as_str), Some("hello"));
        assert_eq!(value.downcast::<String>().ok(), Some(String::from("hello")));
    }

    #[test]
    fn downcast_to_the_wrong_type_returns_the_value() {
        let value = Value::new(42_u64);
        let back = value.downcast::<i32>().unwrap_err();
        assert_eq!(back.type_name(), "u64");
        assert_eq!(back.downcast::<u64>().ok(), Some(42));
    }

    #[test]
    fn shared_values_are_cloned_out() {
        let value = Value::new(vec![1, 2, 3]);
        let shared = value.clone();
        assert_eq!(value.downcast::<Vec<i32>>().ok(), Some(vec![1, 2, 3]));
        assert_eq!(shared.downcast_ref::<Vec<i32>>(), Some(&vec![1, 2, 3]));
    }

    #[test]
    fn expect_compares_by_type() {
        assert!(Expect::of::<()>().matches(&Value::unit()));
        assert!(!Expect::of::<String>().matches(&Value::unit()));
        assert_eq!(Expect::of::<u8>(), Expect::of::<u8>());
    }
}
