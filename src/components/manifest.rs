//! Declared bindings of a composite root.
//!
//! A [`RootManifest`] lists the abstractions a root binds during install and
//! the ones it reads from earlier roots. Nothing at runtime enforces it; it
//! feeds the [`DependencyReport`](crate::systems::report::DependencyReport),
//! which flags roots that read something no earlier root provides.
//!
//! # Example
//!
//! ```
//! use compositeroot::components::manifest::RootManifest;
//!
//! struct Settings;
//! struct Score;
//!
//! let manifest = RootManifest::new().requires::<Settings>().binds::<Score>();
//! assert_eq!(manifest.requires.len(), 1);
//! assert_eq!(manifest.binds.len(), 1);
//! ```

use crate::resources::registry::TypeKey;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RootManifest {
    /// Keys this root registers (either tier).
    pub binds: Vec<TypeKey>,
    /// Keys this root resolves during install.
    pub requires: Vec<TypeKey>,
}

impl RootManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn binds<T: ?Sized + 'static>(mut self) -> Self {
        self.binds.push(TypeKey::of::<T>());
        self
    }

    pub fn requires<T: ?Sized + 'static>(mut self) -> Self {
        self.requires.push(TypeKey::of::<T>());
        self
    }

    /// Add every key of `keys` as a requirement, e.g. an injector's
    /// declared constructor dependencies.
    pub fn requires_all(mut self, keys: &[TypeKey]) -> Self {
        self.requires.extend_from_slice(keys);
        self
    }
}
