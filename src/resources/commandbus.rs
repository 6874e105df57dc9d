//! Scene-scoped command bus.
//!
//! The [`CommandBus`] maps a command type to an ordered bucket of listeners
//! and dispatches commands synchronously, in insertion order. It is a cheap
//! handle: clones share the same buckets, which is how the orchestrator, the
//! scene context and every composite root talk to one bus.
//!
//! Buckets hold [`Weak`] references. The bus never keeps a listener alive;
//! whoever created the listener (usually the local registry) owns it, and
//! listeners that have been dropped are skipped on dispatch.
//!
//! Adding the same listener twice puts it in the bucket twice and it will
//! react twice per command. Removing a listener removes every occurrence.

use std::any::{Any, TypeId, type_name};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use log::{debug, trace};
use rustc_hash::FxHashMap;

use crate::events::command::{Command, CommandListener, ListenerCapabilities};

/// Identity of a listener allocation, independent of the trait it is viewed through.
type ListenerId = usize;

fn listener_id<T: ?Sized>(listener: &Rc<T>) -> ListenerId {
    Rc::as_ptr(listener) as *const () as ListenerId
}

/// Type-erased view of a [`Bucket`] so buckets of different command types
/// can share one map.
trait ListenerBucket {
    fn remove(&mut self, id: ListenerId) -> usize;
    fn contains(&self, id: ListenerId) -> bool;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

struct Bucket<C: Command> {
    listeners: Vec<(ListenerId, Weak<dyn CommandListener<C>>)>,
}

impl<C: Command> ListenerBucket for Bucket<C> {
    fn remove(&mut self, id: ListenerId) -> usize {
        let before = self.listeners.len();
        self.listeners.retain(|(listener, _)| *listener != id);
        before - self.listeners.len()
    }

    fn contains(&self, id: ListenerId) -> bool {
        self.listeners.iter().any(|(listener, _)| *listener == id)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Shared handle to the scene's listener buckets.
#[derive(Clone)]
pub struct CommandBus {
    buckets: Rc<RefCell<FxHashMap<TypeId, Box<dyn ListenerBucket>>>>,
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandBus {
    pub fn new() -> Self {
        CommandBus {
            buckets: Rc::new(RefCell::new(FxHashMap::default())),
        }
    }

    /// Subscribe `listener` to every command type it declares through
    /// [`ListenerCapabilities`]. Objects declaring none are added nowhere.
    pub fn add_listener<T: ListenerCapabilities>(&self, listener: &Rc<T>) {
        T::subscribe(listener, self);
    }

    /// Append `listener` to the bucket of command type `C`.
    pub fn listen<C: Command>(&self, listener: Rc<dyn CommandListener<C>>) {
        let id = listener_id(&listener);
        let mut buckets = self.buckets.borrow_mut();
        let bucket = buckets.entry(TypeId::of::<C>()).or_insert_with(|| {
            Box::new(Bucket::<C> {
                listeners: Vec::new(),
            })
        });
        if let Some(bucket) = bucket.as_any_mut().downcast_mut::<Bucket<C>>() {
            debug!("Listener added for {}", type_name::<C>());
            bucket.listeners.push((id, Rc::downgrade(&listener)));
        }
    }

    /// Remove every occurrence of `listener` from every bucket.
    ///
    /// Returns how many entries were removed; zero when it was never added.
    pub fn remove_listener<T: ?Sized>(&self, listener: &Rc<T>) -> usize {
        let id = listener_id(listener);
        self.buckets
            .borrow_mut()
            .values_mut()
            .map(|bucket| bucket.remove(id))
            .sum()
    }

    /// Whether `listener` sits in at least one bucket.
    pub fn is_subscribed<T: ?Sized>(&self, listener: &Rc<T>) -> bool {
        self.contains_id(listener_id(listener))
    }

    fn contains_id(&self, id: ListenerId) -> bool {
        self.buckets
            .borrow()
            .values()
            .any(|bucket| bucket.contains(id))
    }

    /// Dispatch `command` to every listener of `C`, in insertion order.
    ///
    /// Sending a command nobody listens to is a silent no-op. The bucket is
    /// snapshotted before dispatch: listeners may send other commands or
    /// add and remove listeners while reacting, and such changes apply from
    /// the next send on. Returns the number of listeners that reacted.
    pub fn send<C: Command>(&self, command: C) -> usize {
        let snapshot: Vec<Weak<dyn CommandListener<C>>> = {
            let buckets = self.buckets.borrow();
            match buckets
                .get(&TypeId::of::<C>())
                .and_then(|bucket| bucket.as_any().downcast_ref::<Bucket<C>>())
            {
                Some(bucket) => bucket
                    .listeners
                    .iter()
                    .map(|(_, listener)| Weak::clone(listener))
                    .collect(),
                None => {
                    trace!("No listeners for {}", type_name::<C>());
                    return 0;
                }
            }
        };

        let mut delivered = 0;
        for listener in snapshot {
            if let Some(listener) = listener.upgrade() {
                listener.react_command(command.clone());
                delivered += 1;
            }
        }
        delivered
    }

    /// Number of entries in the bucket of `C`, dropped listeners included.
    pub fn listener_count<C: Command>(&self) -> usize {
        self.buckets
            .borrow()
            .get(&TypeId::of::<C>())
            .and_then(|bucket| bucket.as_any().downcast_ref::<Bucket<C>>())
            .map_or(0, |bucket| bucket.listeners.len())
    }

    /// Empty every bucket.
    pub fn clean_up(&self) {
        debug!("Cleaning up command bus");
        self.buckets.borrow_mut().clear();
    }

    /// Replace the bucket map with a fresh one. Every handle sees the change.
    pub fn recreate(&self) {
        *self.buckets.borrow_mut() = FxHashMap::default();
    }
}

impl fmt::Debug for CommandBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandBus")
            .field("command_types", &self.buckets.borrow().len())
            .finish()
    }
}

/// A host object able to listen to commands, with its concrete type erased.
///
/// Built by the host for every listener-capable object it finds in a scene
/// and handed to the orchestrator, which subscribes them after install.
/// Holds a weak reference; a dropped object subscribes to nothing.
pub struct ListenerTarget {
    name: &'static str,
    id: ListenerId,
    subscribe: Box<dyn Fn(&CommandBus)>,
}

impl ListenerTarget {
    pub fn new<T: ListenerCapabilities>(listener: &Rc<T>) -> Self {
        let weak = Rc::downgrade(listener);
        ListenerTarget {
            name: type_name::<T>(),
            id: listener_id(listener),
            subscribe: Box::new(move |bus| {
                if let Some(listener) = weak.upgrade() {
                    T::subscribe(&listener, bus);
                }
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn subscribe(&self, bus: &CommandBus) {
        (self.subscribe)(bus);
    }

    pub fn is_subscribed(&self, bus: &CommandBus) -> bool {
        bus.contains_id(self.id)
    }
}

impl fmt::Debug for ListenerTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerTarget")
            .field("name", &self.name)
            .finish()
    }
}
