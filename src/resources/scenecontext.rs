//! Explicit composition context shared by the orchestrator and every root.
//!
//! A [`SceneContext`] bundles the two registry tiers, the scene's command bus
//! and the injector's factory map. It is a cheap handle: clones share state,
//! so the host creates one, gives a clone to every composite root at
//! construction and hands another to the
//! [`RootOrchestrator`](crate::systems::orchestrator::RootOrchestrator).
//!
//! Lookups that do not name a tier check the global tier first and then the
//! local tier. Binding never fails on an existing key: the instance already
//! bound is handed back, so a root that binds a global service can be
//! installed again in a later scene. The strict, failing path is
//! [`DependencyRegistry::register`].
//!
//! Everything here is single-threaded. A factory closure must not register
//! further factories while it runs; the injector is borrowed during creation.

use std::any::type_name;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use log::debug;

use crate::error::{CompositionError, Lookup, Result, Tier};
use crate::events::command::ListenerCapabilities;
use crate::resources::commandbus::CommandBus;
use crate::resources::registry::{DependencyRegistry, TypeKey};
use crate::systems::injector::{Inject, Injectable, Injector, Resolver, SceneNode};

#[derive(Clone)]
pub struct SceneContext {
    global: Rc<RefCell<DependencyRegistry>>,
    local: Rc<RefCell<DependencyRegistry>>,
    commands: CommandBus,
    injector: Rc<RefCell<Injector>>,
}

impl Default for SceneContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneContext {
    /// Create a process scope: an empty global tier, an empty local tier,
    /// an empty command bus and an injector with no factories.
    pub fn new() -> Self {
        SceneContext {
            global: Rc::new(RefCell::new(DependencyRegistry::new(Tier::Global))),
            local: Rc::new(RefCell::new(DependencyRegistry::new(Tier::Local))),
            commands: CommandBus::new(),
            injector: Rc::new(RefCell::new(Injector::new())),
        }
    }

    /// Context for the next scene of the same process: shares the global tier
    /// and the injector, starts with a fresh local tier and command bus.
    pub fn for_next_scene(&self) -> Self {
        SceneContext {
            global: Rc::clone(&self.global),
            local: Rc::new(RefCell::new(DependencyRegistry::new(Tier::Local))),
            commands: CommandBus::new(),
            injector: Rc::clone(&self.injector),
        }
    }

    // ---------------- registries ----------------

    /// Borrow the process-wide tier.
    pub fn global(&self) -> Ref<'_, DependencyRegistry> {
        self.global.borrow()
    }

    /// Borrow the current scene's tier.
    pub fn local(&self) -> Ref<'_, DependencyRegistry> {
        self.local.borrow()
    }

    /// Replace the local tier's backing store with an empty one.
    pub fn recreate_local(&self) {
        self.local.borrow_mut().recreate();
    }

    /// Drop every local entry, keeping the backing store.
    pub fn clear_local(&self) {
        self.local.borrow_mut().clear();
    }

    /// Whether `key` is registered in either tier.
    pub fn contains_either(&self, key: TypeKey) -> bool {
        self.global.borrow().contains_key(key) || self.local.borrow().contains_key(key)
    }

    /// Resolve `T` from the global tier, falling back to the local tier.
    pub fn resolve_either<T: ?Sized + 'static>(&self) -> Result<Rc<T>> {
        {
            let global = self.global.borrow();
            if global.contains::<T>() {
                return global.get::<T>();
            }
        }
        {
            let local = self.local.borrow();
            if local.contains::<T>() {
                return local.get::<T>();
            }
        }
        Err(CompositionError::UnregisteredDependency {
            dependency: type_name::<T>(),
            lookup: Lookup::Either,
        })
    }

    /// Same as [`SceneContext::resolve_either`].
    pub fn get<T: ?Sized + 'static>(&self) -> Result<Rc<T>> {
        self.resolve_either::<T>()
    }

    /// Resolve `T` from the global tier only.
    pub fn get_global<T: ?Sized + 'static>(&self) -> Result<Rc<T>> {
        self.global.borrow().get::<T>()
    }

    /// Resolve `T` from the local tier only.
    pub fn get_local<T: ?Sized + 'static>(&self) -> Result<Rc<T>> {
        self.local.borrow().get::<T>()
    }

    // ---------------- binding ----------------

    /// Bind `instance` under `T` for the lifetime of the process.
    ///
    /// When the global tier already holds a `T` (bound by an earlier root or
    /// an earlier scene) that instance is returned and `instance` is dropped.
    pub fn bind_global<T: ?Sized + 'static>(&self, instance: Rc<T>) -> Result<Rc<T>> {
        let mut global = self.global.borrow_mut();
        if global.contains::<T>() {
            debug!("{} already bound globally, reusing it", type_name::<T>());
            return global.get::<T>();
        }
        global.register(instance)
    }

    /// Bind `instance` under `T` for the lifetime of the scene.
    ///
    /// An existing `T` wins: the global tier is checked first, then the
    /// local tier, and only when neither holds one is `instance` registered
    /// locally.
    pub fn bind_local<T: ?Sized + 'static>(&self, instance: Rc<T>) -> Result<Rc<T>> {
        self.bind_local_or_reuse(instance).map(|(bound, _)| bound)
    }

    /// [`SceneContext::bind_local`] and subscribe the instance to the
    /// command bus. An instance reused from either tier is not subscribed
    /// again.
    pub fn bind_local_listening<T: ListenerCapabilities>(&self, instance: Rc<T>) -> Result<Rc<T>> {
        let (bound, registered) = self.bind_local_or_reuse(instance)?;
        if registered {
            self.commands.add_listener(&bound);
        }
        Ok(bound)
    }

    /// Returns the bound instance and whether it was newly registered.
    fn bind_local_or_reuse<T: ?Sized + 'static>(&self, instance: Rc<T>) -> Result<(Rc<T>, bool)> {
        {
            let global = self.global.borrow();
            if global.contains::<T>() {
                debug!("{} already bound globally, reusing it", type_name::<T>());
                return Ok((global.get::<T>()?, false));
            }
        }
        let mut local = self.local.borrow_mut();
        if local.contains::<T>() {
            debug!("{} already bound locally, reusing it", type_name::<T>());
            return Ok((local.get::<T>()?, false));
        }
        Ok((local.register(instance)?, true))
    }

    // ---------------- injection ----------------

    /// Borrow the factory map shared by every scene of the process.
    pub fn injector(&self) -> Ref<'_, Injector> {
        self.injector.borrow()
    }

    pub fn injector_mut(&self) -> RefMut<'_, Injector> {
        self.injector.borrow_mut()
    }

    /// Register `T::construct` as the factory for `T`.
    pub fn register_constructor<T: Inject>(&self) {
        self.injector.borrow_mut().register_constructor::<T>();
    }

    /// Register a hand-written factory for `T` with its dependency keys.
    pub fn register_factory<T: 'static, F>(&self, dependencies: Vec<TypeKey>, factory: F)
    where
        F: Fn(&Resolver<'_>) -> Result<T> + 'static,
    {
        self.injector
            .borrow_mut()
            .register_factory::<T, F>(dependencies, factory);
    }

    /// Build a `T` from its only factory, resolving every dependency from
    /// either tier first.
    pub fn create_with_injection<T: 'static>(&self) -> Result<T> {
        self.injector.borrow().create_with_injection::<T>(self)
    }

    /// Run the injection methods of `target`. Returns how many ran.
    pub fn inject_members(&self, target: &dyn Injectable) -> Result<usize> {
        self.injector.borrow().inject_members(target, self)
    }

    /// Member injection into `node`, and into its descendants when
    /// `recursive` is set. Returns how many components were injected.
    pub fn inject_into_hierarchy(&self, node: &dyn SceneNode, recursive: bool) -> Result<usize> {
        self.injector
            .borrow()
            .inject_into_hierarchy(node, recursive, self)
    }

    /// Create a `T` and bind it globally under its own type.
    pub fn create_and_bind_global<T: 'static>(&self) -> Result<Rc<T>> {
        let instance = Rc::new(self.create_with_injection::<T>()?);
        self.bind_global(instance)
    }

    /// Create a `T` and bind it globally under the abstraction `I`.
    ///
    /// `upcast` is usually `|it| it as Rc<dyn Abstraction>`.
    pub fn create_and_bind_global_as<T: 'static, I: ?Sized + 'static>(
        &self,
        upcast: impl FnOnce(Rc<T>) -> Rc<I>,
    ) -> Result<Rc<I>> {
        let instance = Rc::new(self.create_with_injection::<T>()?);
        self.bind_global(upcast(instance))
    }

    /// Create a `T` and bind it locally under its own type.
    pub fn create_and_bind_local<T: 'static>(&self) -> Result<Rc<T>> {
        let instance = Rc::new(self.create_with_injection::<T>()?);
        self.bind_local(instance)
    }

    /// Create a `T` and bind it locally under the abstraction `I`.
    pub fn create_and_bind_local_as<T: 'static, I: ?Sized + 'static>(
        &self,
        upcast: impl FnOnce(Rc<T>) -> Rc<I>,
    ) -> Result<Rc<I>> {
        let instance = Rc::new(self.create_with_injection::<T>()?);
        self.bind_local(upcast(instance))
    }

    /// Create a `T`, bind it locally and subscribe it to the command bus.
    pub fn create_and_bind_local_listening<T: ListenerCapabilities>(&self) -> Result<Rc<T>> {
        let instance = Rc::new(self.create_with_injection::<T>()?);
        self.bind_local_listening(instance)
    }

    // ---------------- commands ----------------

    /// The scene's command bus.
    pub fn commands(&self) -> &CommandBus {
        &self.commands
    }
}

impl fmt::Debug for SceneContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneContext")
            .field("global", &*self.global.borrow())
            .field("local", &*self.local.borrow())
            .field("commands", &self.commands)
            .finish()
    }
}
