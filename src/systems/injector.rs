//! Constructor and member injection.
//!
//! Construction goes through a factory map: every injectable type registers
//! exactly one factory, either from its [`Inject`] implementation or from a
//! closure with an explicit dependency list. Creating an instance checks that
//! every declared dependency is available (global tier first, then local)
//! before the factory runs, so a failed creation never builds anything.
//!
//! Host objects that already exist (scene objects, UI widgets) receive their
//! dependencies through [`Injectable::inject`], which calls
//! [`MemberInjection::method`] once per injection method.
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use compositeroot::resources::scenecontext::SceneContext;
//! use compositeroot::systems::injector::Inject;
//!
//! struct Clock;
//! struct Timer {
//!     clock: Rc<Clock>,
//! }
//!
//! impl Inject for Timer {
//!     type Dependencies = (Rc<Clock>,);
//!     fn construct((clock,): Self::Dependencies) -> Self {
//!         Timer { clock }
//!     }
//! }
//!
//! let context = SceneContext::new();
//! context.register_constructor::<Timer>();
//! context.bind_global(Rc::new(Clock)).unwrap();
//! let timer = context.create_with_injection::<Timer>().unwrap();
//! assert!(Rc::ptr_eq(&timer.clock, &context.get_global::<Clock>().unwrap()));
//! ```

use std::any::{Any, TypeId, type_name};
use std::rc::Rc;

use log::debug;
use rustc_hash::FxHashMap;

use crate::error::{CompositionError, Result};
use crate::resources::registry::TypeKey;
use crate::resources::scenecontext::SceneContext;

/// Resolves dependencies on behalf of one injection target member.
///
/// Lookup failures are reported as [`CompositionError::UnresolvedParameter`]
/// naming the target, the member being injected and the missing type.
pub struct Resolver<'a> {
    context: &'a SceneContext,
    target: &'a str,
    member: &'static str,
}

impl<'a> Resolver<'a> {
    pub fn new(context: &'a SceneContext, target: &'a str, member: &'static str) -> Self {
        Resolver {
            context,
            target,
            member,
        }
    }

    pub fn target(&self) -> &str {
        self.target
    }

    /// Resolve `T` from the global tier, then the local tier.
    pub fn resolve<T: ?Sized + 'static>(&self) -> Result<Rc<T>> {
        self.context
            .resolve_either::<T>()
            .map_err(|err| self.unresolved(err))
    }

    fn unresolved(&self, err: CompositionError) -> CompositionError {
        match err {
            CompositionError::UnregisteredDependency { dependency, .. } => {
                CompositionError::UnresolvedParameter {
                    target: self.target.to_string(),
                    member: self.member,
                    parameter: dependency,
                }
            }
            other => other,
        }
    }
}

/// A declared, ordered list of dependencies, resolved all at once.
///
/// Implemented for `()` and for tuples of `Rc<T>` with up to eight elements.
pub trait DependencyList: Sized {
    /// Declared keys, in parameter order.
    fn keys() -> Vec<TypeKey>;
    fn resolve(resolver: &Resolver<'_>) -> Result<Self>;
}

macro_rules! impl_dependency_list {
    ($($dep:ident),*) => {
        impl<$($dep: ?Sized + 'static),*> DependencyList for ($(Rc<$dep>,)*) {
            fn keys() -> Vec<TypeKey> {
                vec![$(TypeKey::of::<$dep>()),*]
            }

            #[allow(unused_variables)]
            fn resolve(resolver: &Resolver<'_>) -> Result<Self> {
                Ok(($(resolver.resolve::<$dep>()?,)*))
            }
        }
    };
}

impl_dependency_list!();
impl_dependency_list!(A);
impl_dependency_list!(A, B);
impl_dependency_list!(A, B, C);
impl_dependency_list!(A, B, C, D);
impl_dependency_list!(A, B, C, D, E);
impl_dependency_list!(A, B, C, D, E, F);
impl_dependency_list!(A, B, C, D, E, F, G);
impl_dependency_list!(A, B, C, D, E, F, G, H);

/// A type with a single injectable constructor.
pub trait Inject: Sized + 'static {
    type Dependencies: DependencyList;
    fn construct(dependencies: Self::Dependencies) -> Self;
}

/// An existing object with injection methods.
pub trait Injectable {
    fn name(&self) -> &str {
        type_name::<Self>()
    }

    /// Call [`MemberInjection::method`] once per injection method.
    fn inject(&self, injection: &mut MemberInjection<'_>) -> Result<()>;
}

/// Host-side traversal of an object hierarchy.
///
/// The host owns the object model; the injector only walks what this trait
/// exposes.
pub trait SceneNode {
    fn name(&self) -> &str;
    /// Injectable components attached to this node.
    fn components(&self) -> Vec<&dyn Injectable>;
    fn children(&self) -> Vec<&dyn SceneNode>;
}

/// Injection session for one target, handed to [`Injectable::inject`].
pub struct MemberInjection<'a> {
    context: &'a SceneContext,
    target: &'a str,
    invoked: usize,
}

impl MemberInjection<'_> {
    /// Resolve the arguments of injection method `member` and invoke it.
    pub fn method<D: DependencyList>(
        &mut self,
        member: &'static str,
        method: impl FnOnce(D),
    ) -> Result<()> {
        let resolver = Resolver::new(self.context, self.target, member);
        let arguments = D::resolve(&resolver)?;
        method(arguments);
        self.invoked += 1;
        Ok(())
    }

    /// Injection methods invoked so far.
    pub fn invoked(&self) -> usize {
        self.invoked
    }
}

type BuildFn<T> = Box<dyn Fn(&Resolver<'_>) -> Result<T>>;

struct Factory {
    dependencies: Vec<TypeKey>,
    /// Always a `BuildFn<T>` for the `T` this factory is filed under.
    build: Box<dyn Any>,
}

/// Factory map used for constructor injection.
#[derive(Default)]
pub struct Injector {
    factories: FxHashMap<TypeId, Vec<Factory>>,
}

impl Injector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the [`Inject`] implementation of `T` as a factory.
    pub fn register_constructor<T: Inject>(&mut self) {
        self.register_factory::<T, _>(T::Dependencies::keys(), |resolver| {
            let dependencies = T::Dependencies::resolve(resolver)?;
            Ok(T::construct(dependencies))
        });
    }

    /// Register a closure building `T` from the declared `dependencies`.
    ///
    /// Factories accumulate: registering a second one for the same type makes
    /// creation of that type ambiguous.
    pub fn register_factory<T: 'static, F>(&mut self, dependencies: Vec<TypeKey>, factory: F)
    where
        F: Fn(&Resolver<'_>) -> Result<T> + 'static,
    {
        debug!(
            "Registering factory for {} ({} dependencies)",
            type_name::<T>(),
            dependencies.len()
        );
        let build: BuildFn<T> = Box::new(factory);
        self.factories
            .entry(TypeId::of::<T>())
            .or_default()
            .push(Factory {
                dependencies,
                build: Box::new(build),
            });
    }

    pub fn factory_count<T: 'static>(&self) -> usize {
        self.factories
            .get(&TypeId::of::<T>())
            .map_or(0, |factories| factories.len())
    }

    /// Declared dependencies of `T`, when it has exactly one factory.
    pub fn dependencies_of<T: 'static>(&self) -> Option<&[TypeKey]> {
        match self.factories.get(&TypeId::of::<T>()).map(Vec::as_slice) {
            Some([factory]) => Some(&factory.dependencies),
            _ => None,
        }
    }

    /// Build a new `T` with every declared dependency resolved.
    pub fn create_with_injection<T: 'static>(&self, context: &SceneContext) -> Result<T> {
        let target = type_name::<T>();
        let factories = self
            .factories
            .get(&TypeId::of::<T>())
            .map_or(&[][..], Vec::as_slice);
        let [factory] = factories else {
            return Err(CompositionError::AmbiguousConstructor {
                target,
                found: factories.len(),
            });
        };

        if let Some(missing) = factory
            .dependencies
            .iter()
            .find(|key| !context.contains_either(**key))
        {
            return Err(CompositionError::UnresolvedParameter {
                target: target.to_string(),
                member: "constructor",
                parameter: missing.name,
            });
        }

        let build = factory.build.downcast_ref::<BuildFn<T>>().ok_or(
            CompositionError::AmbiguousConstructor { target, found: 0 },
        )?;
        let instance = build(&Resolver::new(context, target, "constructor"))?;
        debug!("Created {} with injection", target);
        Ok(instance)
    }

    /// Invoke every injection method of `target`. Returns how many ran.
    pub fn inject_members(&self, target: &dyn Injectable, context: &SceneContext) -> Result<usize> {
        let mut injection = MemberInjection {
            context,
            target: target.name(),
            invoked: 0,
        };
        target.inject(&mut injection)?;
        debug!(
            "Injected {} method(s) into {}",
            injection.invoked,
            target.name()
        );
        Ok(injection.invoked)
    }

    /// Inject every component of `node`, and of its descendants when
    /// `recursive` is set. Returns the number of components visited.
    pub fn inject_into_hierarchy(
        &self,
        node: &dyn SceneNode,
        recursive: bool,
        context: &SceneContext,
    ) -> Result<usize> {
        let mut visited = 0;
        for component in node.components() {
            self.inject_members(component, context)?;
            visited += 1;
        }
        if recursive {
            for child in node.children() {
                visited += self.inject_into_hierarchy(child, true, context)?;
            }
        }
        Ok(visited)
    }
}
