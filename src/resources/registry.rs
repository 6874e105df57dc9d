//! Type-keyed store of singleton service instances.
//!
//! A [`DependencyRegistry`] maps a [`TypeKey`] to exactly one shared instance.
//! The key is whatever type the caller registers under: a concrete service
//! type or a trait object such as `dyn ScoreService`. Two registries coexist
//! while a scene is alive:
//!
//! - the **global** tier, created once and kept for the whole process
//! - the **local** tier, recreated at scene start and cleared at teardown
//!
//! Registering a key that is already present is rejected and leaves the
//! existing entry untouched.
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use compositeroot::error::Tier;
//! use compositeroot::resources::registry::DependencyRegistry;
//!
//! trait Greeter {
//!     fn greet(&self) -> String;
//! }
//! struct English;
//! impl Greeter for English {
//!     fn greet(&self) -> String {
//!         "hello".into()
//!     }
//! }
//!
//! let mut registry = DependencyRegistry::new(Tier::Local);
//! registry.register::<dyn Greeter>(Rc::new(English)).unwrap();
//! assert_eq!(registry.get::<dyn Greeter>().unwrap().greet(), "hello");
//! ```

use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::rc::Rc;

use log::debug;
use rustc_hash::FxHashMap;

use crate::error::{CompositionError, Lookup, Result, Tier};

/// Identity of a registered abstraction: its [`TypeId`] plus a readable name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeKey {
    pub id: TypeId,
    pub name: &'static str,
}

impl TypeKey {
    /// Key for `T`. Works for unsized types, so `dyn Trait` is a valid key.
    pub fn of<T: ?Sized + 'static>() -> Self {
        TypeKey {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

struct Entry {
    key: TypeKey,
    /// Always an `Rc<T>` where `TypeId::of::<T>() == key.id`.
    instance: Rc<dyn Any>,
}

/// Single-tier registry of shared service instances.
pub struct DependencyRegistry {
    tier: Tier,
    entries: FxHashMap<TypeId, Entry>,
    /// Registration order, kept for diagnostics.
    order: Vec<TypeKey>,
}

impl DependencyRegistry {
    /// Create an empty registry for the given tier.
    pub fn new(tier: Tier) -> Self {
        DependencyRegistry {
            tier,
            entries: FxHashMap::default(),
            order: Vec::new(),
        }
    }

    /// Which tier this registry backs.
    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// Store `instance` under `T` and hand it back.
    ///
    /// Fails with [`CompositionError::DuplicateRegistration`] when `T` is
    /// already present in this tier.
    pub fn register<T: ?Sized + 'static>(&mut self, instance: Rc<T>) -> Result<Rc<T>> {
        let key = TypeKey::of::<T>();
        if self.entries.contains_key(&key.id) {
            return Err(CompositionError::DuplicateRegistration {
                dependency: key.name,
                tier: self.tier,
            });
        }
        debug!("Registering {} in the {} tier", key, self.tier);
        self.entries.insert(
            key.id,
            Entry {
                key,
                instance: Rc::new(Rc::clone(&instance)),
            },
        );
        self.order.push(key);
        Ok(instance)
    }

    /// Whether `T` has been registered in this tier.
    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    /// Whether `key` has been registered in this tier.
    pub fn contains_key(&self, key: TypeKey) -> bool {
        self.entries.contains_key(&key.id)
    }

    /// Shared instance registered under `T`.
    pub fn get<T: ?Sized + 'static>(&self) -> Result<Rc<T>> {
        let key = TypeKey::of::<T>();
        self.entries
            .get(&key.id)
            .and_then(|entry| entry.instance.downcast_ref::<Rc<T>>())
            .cloned()
            .ok_or(CompositionError::UnregisteredDependency {
                dependency: key.name,
                lookup: Lookup::Tier(self.tier),
            })
    }

    /// Type-erased lookup. The returned value is the `Rc<T>` stored for `key`;
    /// downcast it with `downcast_ref::<Rc<T>>()`.
    pub fn get_key(&self, key: TypeKey) -> Result<Rc<dyn Any>> {
        self.entries
            .get(&key.id)
            .map(|entry| Rc::clone(&entry.instance))
            .ok_or(CompositionError::UnregisteredDependency {
                dependency: key.name,
                lookup: Lookup::Tier(self.tier),
            })
    }

    /// Drop every entry, keeping the allocated storage.
    pub fn clear(&mut self) {
        debug!(
            "Clearing {} entries from the {} tier",
            self.entries.len(),
            self.tier
        );
        self.entries.clear();
        self.order.clear();
    }

    /// Swap in a brand new backing store.
    ///
    /// Used on the local tier at scene start so nothing from a previous
    /// scene can leak into the next one.
    pub fn recreate(&mut self) {
        *self = DependencyRegistry::new(self.tier);
    }

    /// Number of registered entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered keys, in registration order.
    pub fn keys(&self) -> &[TypeKey] {
        &self.order
    }
}

impl fmt::Debug for DependencyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyRegistry")
            .field("tier", &self.tier)
            .field(
                "entries",
                &self.order.iter().map(|key| key.name).collect::<Vec<_>>(),
            )
            .finish()
    }
}
