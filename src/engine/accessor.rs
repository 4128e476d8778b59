//! Member accessors: getter/setter closures keyed by (declaring type, member).
//!
//! A chain resolves one accessor per link when it is created and never looks
//! members up again while running. Resolution is memoized per registry; the
//! thread-local [`AccessorRegistry::shared`] instance lives for the rest of the
//! thread, which is the lifetime of everything that can observe through it.
//!
//! Lookups that miss the explicit registrations fall through to a provider.
//! The default provider serves [`Record`] fields by name.

use crate::engine::error::AccessError;
use crate::engine::record::Record;
use crate::engine::value::{Observed, Value};
use crate::spec::{PathSpec, TypeRef};

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MemberKey {
    pub declaring_type: TypeRef,
    pub member: String,
}

impl MemberKey {
    pub fn new(declaring_type: &str, member: &str) -> Self {
        Self {
            declaring_type: TypeRef::new(declaring_type),
            member: member.to_string(),
        }
    }
}

impl fmt::Display for MemberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.declaring_type, self.member)
    }
}

pub type Getter = Rc<dyn Fn(&dyn Observed) -> Result<Value, AccessError>>;
pub type Setter = Rc<dyn Fn(&dyn Observed, Value) -> Result<(), AccessError>>;

#[derive(Clone)]
pub struct Accessor {
    key: MemberKey,
    getter: Getter,
    setter: Option<Setter>,
}

impl Accessor {
    pub fn new(key: MemberKey, getter: Getter, setter: Option<Setter>) -> Self {
        Self {
            key,
            getter,
            setter,
        }
    }

    /// Accessor for a concrete object type `T`; objects of any other type
    /// are reported as [`AccessError::WrongType`].
    pub fn typed<T: Observed>(
        declaring_type: &str,
        member: &str,
        get: impl Fn(&T) -> Value + 'static,
    ) -> Self {
        let key = MemberKey::new(declaring_type, member);
        let getter_key = key.clone();
        let getter: Getter = Rc::new(move |obj: &dyn Observed| {
            let target = downcast::<T>(&getter_key, obj)?;
            Ok(get(target))
        });
        Self::new(key, getter, None)
    }

    /// Add a setter to a [`Accessor::typed`] accessor.
    pub fn with_setter<T: Observed>(mut self, set: impl Fn(&T, Value) + 'static) -> Self {
        let key = self.key.clone();
        self.setter = Some(Rc::new(move |obj: &dyn Observed, value: Value| {
            let target = downcast::<T>(&key, obj)?;
            set(target, value);
            Ok(())
        }));
        self
    }

    pub fn key(&self) -> &MemberKey {
        &self.key
    }

    pub fn get(&self, obj: &dyn Observed) -> Result<Value, AccessError> {
        (self.getter)(obj)
    }

    pub fn set(&self, obj: &dyn Observed, value: Value) -> Result<(), AccessError> {
        match &self.setter {
            Some(setter) => setter(obj, value),
            None => Err(AccessError::ReadOnly(self.key.clone())),
        }
    }

    pub fn can_set(&self) -> bool {
        self.setter.is_some()
    }
}

impl fmt::Debug for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accessor")
            .field("key", &self.key)
            .field("settable", &self.can_set())
            .finish()
    }
}

fn downcast<'a, T: Observed>(key: &MemberKey, obj: &'a dyn Observed) -> Result<&'a T, AccessError> {
    obj.as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| AccessError::WrongType {
            key: key.clone(),
            expected: key.declaring_type.to_string(),
            found: obj.type_name().to_string(),
        })
}

/// Builds an accessor for a key nobody registered explicitly.
pub type Provider = Box<dyn Fn(&MemberKey) -> Option<Accessor>>;

pub struct AccessorRegistry {
    cache: RefCell<HashMap<MemberKey, Rc<Accessor>>>,
    provider: Option<Provider>,
}

thread_local! {
    static SHARED: Rc<AccessorRegistry> = Rc::new(AccessorRegistry::new());
}

impl AccessorRegistry {
    /// Registry backed by the [`Record`] field provider.
    pub fn new() -> Self {
        Self::with_provider(Box::new(|key: &MemberKey| Some(record_accessor(key))))
    }

    /// Registry that only knows explicit registrations.
    pub fn empty() -> Self {
        Self {
            cache: RefCell::new(HashMap::new()),
            provider: None,
        }
    }

    pub fn with_provider(provider: Provider) -> Self {
        Self {
            cache: RefCell::new(HashMap::new()),
            provider: Some(provider),
        }
    }

    /// The thread's shared registry.
    pub fn shared() -> Rc<AccessorRegistry> {
        SHARED.with(Rc::clone)
    }

    /// Register (or replace) an accessor.
    pub fn register(&self, accessor: Accessor) {
        self.cache
            .borrow_mut()
            .insert(accessor.key.clone(), Rc::new(accessor));
    }

    pub fn resolve(&self, key: &MemberKey) -> Result<Rc<Accessor>, AccessError> {
        if let Some(hit) = self.cache.borrow().get(key) {
            return Ok(Rc::clone(hit));
        }
        let built = self
            .provider
            .as_ref()
            .and_then(|p| p(key))
            .ok_or_else(|| AccessError::NoAccessor(key.clone()))?;
        tracing::trace!(%key, "accessor built");
        let built = Rc::new(built);
        self.cache
            .borrow_mut()
            .insert(key.clone(), Rc::clone(&built));
        Ok(built)
    }

    /// One accessor per link, root first.
    pub fn resolve_path(&self, path: &PathSpec) -> Result<Vec<Rc<Accessor>>, AccessError> {
        path.links
            .iter()
            .map(|link| {
                self.resolve(&MemberKey {
                    declaring_type: link.input_type.clone(),
                    member: link.name.clone(),
                })
            })
            .collect()
    }

    /// Number of memoized accessors.
    pub fn cached_len(&self) -> usize {
        self.cache.borrow().len()
    }
}

impl Default for AccessorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AccessorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessorRegistry")
            .field("cached", &self.cached_len())
            .field("has_provider", &self.provider.is_some())
            .finish()
    }
}

/// Field accessor for records whose type name matches the declaring type.
fn record_accessor(key: &MemberKey) -> Accessor {
    let get_key = key.clone();
    let set_key = key.clone();
    let getter: Getter = Rc::new(move |obj: &dyn Observed| {
        let rec = record_of(&get_key, obj)?;
        Ok(rec.get(&get_key.member))
    });
    let setter: Setter = Rc::new(move |obj: &dyn Observed, value: Value| {
        let rec = record_of(&set_key, obj)?;
        rec.set(&set_key.member, value);
        Ok(())
    });
    Accessor::new(key.clone(), getter, Some(setter))
}

fn record_of<'a>(key: &MemberKey, obj: &'a dyn Observed) -> Result<&'a Record, AccessError> {
    let rec = downcast::<Record>(key, obj)?;
    if rec.type_name() != key.declaring_type.as_str() {
        return Err(AccessError::WrongType {
            key: key.clone(),
            expected: key.declaring_type.to_string(),
            found: rec.type_name().to_string(),
        });
    }
    Ok(rec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::value::{ChangeHandler, ChangeSource, Subscription};
    use std::any::Any;
    use std::cell::Cell;

    struct Counter {
        n: Cell<i64>,
    }

    impl ChangeSource for Counter {
        fn subscribe_changes(&self, _handler: ChangeHandler) -> Subscription {
            Subscription::empty()
        }
    }

    impl Observed for Counter {
        fn type_name(&self) -> &str {
            "Counter"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn resolution_is_memoized() {
        let reg = AccessorRegistry::new();
        let key = MemberKey::new("Host", "value");
        let a = reg.resolve(&key).unwrap();
        let b = reg.resolve(&key).unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(reg.cached_len(), 1);
    }

    #[test]
    fn record_provider_reads_and_writes() {
        let reg = AccessorRegistry::new();
        let host = Record::with_fields("Host", [("value", 3)]);
        let acc = reg.resolve(&MemberKey::new("Host", "value")).unwrap();
        assert_eq!(acc.get(&*host).unwrap(), Value::Int(3));
        acc.set(&*host, Value::Int(4)).unwrap();
        assert_eq!(host.get("value"), Value::Int(4));
    }

    #[test]
    fn record_type_must_match_declaring_type() {
        let reg = AccessorRegistry::new();
        let child = Record::new("Child");
        let acc = reg.resolve(&MemberKey::new("Host", "value")).unwrap();
        let err = acc.get(&*child).unwrap_err();
        assert!(matches!(err, AccessError::WrongType { .. }));
    }

    #[test]
    fn empty_registry_reports_missing_accessor() {
        let reg = AccessorRegistry::empty();
        let err = reg.resolve(&MemberKey::new("Host", "value")).unwrap_err();
        assert_eq!(err, AccessError::NoAccessor(MemberKey::new("Host", "value")));
    }

    #[test]
    fn typed_accessor_with_setter() {
        let reg = AccessorRegistry::empty();
        reg.register(
            Accessor::typed::<Counter>("Counter", "n", |c| Value::Int(c.n.get())).with_setter(
                |c: &Counter, v| {
                    if let Some(i) = v.as_int() {
                        c.n.set(i);
                    }
                },
            ),
        );
        let counter = Counter { n: Cell::new(1) };
        let acc = reg.resolve(&MemberKey::new("Counter", "n")).unwrap();
        assert_eq!(acc.get(&counter).unwrap(), Value::Int(1));
        acc.set(&counter, Value::Int(9)).unwrap();
        assert_eq!(counter.n.get(), 9);

        let rec = Record::new("Counter");
        assert!(acc.get(&*rec).is_err());
    }

    #[test]
    fn read_only_accessor_refuses_writes() {
        let acc = Accessor::typed::<Counter>("Counter", "n", |c| Value::Int(c.n.get()));
        let counter = Counter { n: Cell::new(1) };
        assert!(!acc.can_set());
        assert!(matches!(
            acc.set(&counter, Value::Int(2)),
            Err(AccessError::ReadOnly(_))
        ));
    }
}
