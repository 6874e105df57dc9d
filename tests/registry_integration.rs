//! Registry and injector integration tests: tier rules, trait-object keys,
//! atomic construction and member injection across a hierarchy.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use compositeroot::error::{CompositionError, Lookup, Result, Tier};
use compositeroot::resources::registry::{DependencyRegistry, TypeKey};
use compositeroot::resources::scenecontext::SceneContext;
use compositeroot::systems::injector::{Inject, Injectable, MemberInjection, SceneNode};

trait Greeter {
    fn greet(&self) -> String;
}

struct English(&'static str);

impl Greeter for English {
    fn greet(&self) -> String {
        format!("hello {}", self.0)
    }
}

#[derive(Debug, PartialEq)]
struct Counter(u32);

// ==================== REGISTRY ====================

#[test]
fn test_get_returns_registered_instance() {
    let mut registry = DependencyRegistry::new(Tier::Local);
    let registered = registry.register(Rc::new(Counter(1))).unwrap();
    let fetched = registry.get::<Counter>().unwrap();
    assert!(Rc::ptr_eq(&registered, &fetched));
}

#[test]
fn test_duplicate_register_keeps_first_instance() {
    let mut registry = DependencyRegistry::new(Tier::Global);
    let first = registry.register(Rc::new(Counter(1))).unwrap();

    let err = registry.register(Rc::new(Counter(2))).unwrap_err();
    assert!(matches!(
        err,
        CompositionError::DuplicateRegistration {
            tier: Tier::Global,
            ..
        }
    ));
    assert!(Rc::ptr_eq(&first, &registry.get::<Counter>().unwrap()));
    assert_eq!(*registry.get::<Counter>().unwrap(), Counter(1));
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_trait_object_key_is_distinct_from_concrete_type() {
    let mut registry = DependencyRegistry::new(Tier::Local);
    registry
        .register::<dyn Greeter>(Rc::new(English("world")))
        .unwrap();

    assert!(registry.contains::<dyn Greeter>());
    assert!(!registry.contains::<English>());
    assert_eq!(registry.get::<dyn Greeter>().unwrap().greet(), "hello world");
}

#[test]
fn test_type_erased_lookup() {
    let mut registry = DependencyRegistry::new(Tier::Local);
    registry.register(Rc::new(Counter(9))).unwrap();

    let key = TypeKey::of::<Counter>();
    assert!(registry.contains_key(key));
    let erased: Rc<dyn Any> = registry.get_key(key).unwrap();
    let counter = erased.downcast_ref::<Rc<Counter>>().unwrap();
    assert_eq!(counter.0, 9);

    let missing = registry.get_key(TypeKey::of::<String>()).unwrap_err();
    assert!(matches!(
        missing,
        CompositionError::UnregisteredDependency {
            lookup: Lookup::Tier(Tier::Local),
            ..
        }
    ));
}

#[test]
fn test_clear_and_recreate_empty_the_tier() {
    let mut registry = DependencyRegistry::new(Tier::Local);
    registry.register(Rc::new(Counter(1))).unwrap();
    registry.clear();
    assert!(registry.is_empty());
    assert!(registry.get::<Counter>().is_err());

    registry.register(Rc::new(Counter(2))).unwrap();
    registry.recreate();
    assert!(registry.is_empty());
    assert_eq!(registry.tier(), Tier::Local);
}

// ==================== TIERS ====================

#[test]
fn test_global_wins_when_bound_in_both_tiers() {
    let context = SceneContext::new();
    let local = context.bind_local(Rc::new(Counter(2))).unwrap();
    let global = context.bind_global(Rc::new(Counter(1))).unwrap();

    let resolved = context.resolve_either::<Counter>().unwrap();
    assert!(Rc::ptr_eq(&resolved, &global));
    assert!(Rc::ptr_eq(&context.get_local::<Counter>().unwrap(), &local));
}

#[test]
fn test_local_bind_hands_back_global_instance() {
    let context = SceneContext::new();
    let global = context.bind_global(Rc::new(Counter(1))).unwrap();
    let bound = context.bind_local(Rc::new(Counter(2))).unwrap();
    assert!(Rc::ptr_eq(&bound, &global));
    assert!(!context.local().contains::<Counter>());
}

#[test]
fn test_either_lookup_falls_back_to_local_then_fails() {
    let context = SceneContext::new();
    context.bind_local(Rc::new(Counter(2))).unwrap();
    assert_eq!(context.get::<Counter>().unwrap().0, 2);

    let err = context.get::<String>().unwrap_err();
    assert!(matches!(
        err,
        CompositionError::UnregisteredDependency {
            lookup: Lookup::Either,
            ..
        }
    ));
}

// ==================== CONSTRUCTOR INJECTION ====================

struct Clock;
struct Audio;

struct Alarm {
    clock: Rc<Clock>,
    greeter: Rc<dyn Greeter>,
}

impl Inject for Alarm {
    type Dependencies = (Rc<Clock>, Rc<dyn Greeter>);

    fn construct((clock, greeter): Self::Dependencies) -> Self {
        Alarm { clock, greeter }
    }
}

#[test]
fn test_create_resolves_across_tiers() {
    let context = SceneContext::new();
    context.register_constructor::<Alarm>();
    let clock = context.bind_global(Rc::new(Clock)).unwrap();
    context
        .bind_local::<dyn Greeter>(Rc::new(English("alarm")))
        .unwrap();

    let alarm = context.create_with_injection::<Alarm>().unwrap();
    assert!(Rc::ptr_eq(&alarm.clock, &clock));
    assert_eq!(alarm.greeter.greet(), "hello alarm");
    assert_eq!(
        context.injector().dependencies_of::<Alarm>().unwrap(),
        &[TypeKey::of::<Clock>(), TypeKey::of::<dyn Greeter>()]
    );
}

#[test]
fn test_missing_dependency_builds_nothing() {
    let context = SceneContext::new();
    let built = Rc::new(Cell::new(0));
    let counter = built.clone();
    context.register_factory::<Alarm, _>(
        vec![TypeKey::of::<Clock>(), TypeKey::of::<dyn Greeter>()],
        move |resolver| {
            counter.set(counter.get() + 1);
            Ok(Alarm {
                clock: resolver.resolve::<Clock>()?,
                greeter: resolver.resolve::<dyn Greeter>()?,
            })
        },
    );
    context.bind_global(Rc::new(Clock)).unwrap();

    let err = context.create_with_injection::<Alarm>().err().unwrap();
    match err {
        CompositionError::UnresolvedParameter {
            target,
            member,
            parameter,
        } => {
            assert!(target.ends_with("Alarm"));
            assert_eq!(member, "constructor");
            assert!(parameter.contains("Greeter"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(built.get(), 0);
}

#[test]
fn test_two_factories_are_ambiguous() {
    let context = SceneContext::new();
    context.register_factory::<Clock, _>(Vec::new(), |_| Ok(Clock));
    context.register_factory::<Clock, _>(Vec::new(), |_| Ok(Clock));
    assert_eq!(context.injector().factory_count::<Clock>(), 2);

    let err = context.create_with_injection::<Clock>().err().unwrap();
    assert!(matches!(
        err,
        CompositionError::AmbiguousConstructor { found: 2, .. }
    ));
}

#[test]
fn test_create_and_bind_under_abstraction() {
    let context = SceneContext::new();
    context.register_factory::<English, _>(Vec::new(), |_| Ok(English("bound")));

    let greeter = context
        .create_and_bind_global_as::<English, dyn Greeter>(|english| english as Rc<dyn Greeter>)
        .unwrap();
    assert_eq!(greeter.greet(), "hello bound");
    assert!(context.global().contains::<dyn Greeter>());
    assert!(!context.global().contains::<English>());
}

// ==================== MEMBER INJECTION ====================

#[derive(Default)]
struct Speaker {
    clock: RefCell<Option<Rc<Clock>>>,
    audio: RefCell<Option<Rc<Audio>>>,
}

impl Injectable for Speaker {
    fn name(&self) -> &str {
        "Speaker"
    }

    fn inject(&self, injection: &mut MemberInjection<'_>) -> Result<()> {
        injection.method("set_clock", |(clock,): (Rc<Clock>,)| {
            *self.clock.borrow_mut() = Some(clock);
        })?;
        injection.method("set_audio", |(audio,): (Rc<Audio>,)| {
            *self.audio.borrow_mut() = Some(audio);
        })
    }
}

#[test]
fn test_member_injection_reports_missing_parameter() {
    let context = SceneContext::new();
    context.bind_global(Rc::new(Clock)).unwrap();
    let speaker = Speaker::default();

    let err = context.inject_members(&speaker).unwrap_err();
    match err {
        CompositionError::UnresolvedParameter {
            target,
            member,
            parameter,
        } => {
            assert_eq!(target, "Speaker");
            assert_eq!(member, "set_audio");
            assert!(parameter.ends_with("Audio"));
        }
        other => panic!("unexpected error: {other}"),
    }
    // methods before the failing one already ran
    assert!(speaker.clock.borrow().is_some());
    assert!(speaker.audio.borrow().is_none());
}

struct Node {
    name: &'static str,
    speakers: Vec<Speaker>,
    children: Vec<Node>,
}

impl SceneNode for Node {
    fn name(&self) -> &str {
        self.name
    }

    fn components(&self) -> Vec<&dyn Injectable> {
        self.speakers.iter().map(|s| s as &dyn Injectable).collect()
    }

    fn children(&self) -> Vec<&dyn SceneNode> {
        self.children.iter().map(|c| c as &dyn SceneNode).collect()
    }
}

fn leaf(name: &'static str) -> Node {
    Node {
        name,
        speakers: vec![Speaker::default()],
        children: Vec::new(),
    }
}

#[test]
fn test_hierarchy_injection_flat_and_recursive() {
    let context = SceneContext::new();
    context.bind_global(Rc::new(Clock)).unwrap();
    context.bind_local(Rc::new(Audio)).unwrap();

    let tree = Node {
        name: "root",
        speakers: vec![Speaker::default(), Speaker::default()],
        children: vec![leaf("left"), leaf("right")],
    };

    assert_eq!(context.inject_into_hierarchy(&tree, false).unwrap(), 2);
    assert!(tree.children[0].speakers[0].clock.borrow().is_none());

    assert_eq!(context.inject_into_hierarchy(&tree, true).unwrap(), 4);
    assert!(tree.children[1].speakers[0].audio.borrow().is_some());
}
