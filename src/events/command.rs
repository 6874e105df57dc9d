//! Scene commands and the listener capabilities that receive them.
//!
//! A command is a small immutable value broadcast through the scene's
//! [`CommandBus`](crate::resources::commandbus::CommandBus) to every listener
//! registered for its type. Commands without fields are plain signals.
//!
//! Listeners declare which commands they handle explicitly, by implementing
//! [`ListenerCapabilities`] and calling
//! [`CommandBus::listen`](crate::resources::commandbus::CommandBus::listen)
//! once per handled command type.
//!
//! # Example
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use compositeroot::events::command::{Command, CommandListener, ListenerCapabilities};
//! use compositeroot::resources::commandbus::CommandBus;
//!
//! #[derive(Clone)]
//! struct LevelCleared {
//!     coins: u32,
//! }
//! impl Command for LevelCleared {}
//!
//! #[derive(Default)]
//! struct Wallet {
//!     coins: Cell<u32>,
//! }
//!
//! impl CommandListener<LevelCleared> for Wallet {
//!     fn react_command(&self, command: LevelCleared) {
//!         self.coins.set(self.coins.get() + command.coins);
//!     }
//! }
//!
//! impl ListenerCapabilities for Wallet {
//!     fn subscribe(listener: &Rc<Self>, bus: &CommandBus) {
//!         bus.listen::<LevelCleared>(listener.clone());
//!     }
//! }
//!
//! let bus = CommandBus::new();
//! let wallet = Rc::new(Wallet::default());
//! bus.add_listener(&wallet);
//! bus.send(LevelCleared { coins: 5 });
//! assert_eq!(wallet.coins.get(), 5);
//! ```

use std::rc::Rc;

use crate::resources::commandbus::CommandBus;

/// Marker for values that can be broadcast on the command bus.
///
/// Commands are passed by value; each listener receives its own clone.
pub trait Command: Clone + 'static {}

/// Receives commands of type `C`.
pub trait CommandListener<C: Command> {
    fn react_command(&self, command: C);
}

/// Declares which command types an object listens to.
///
/// The default implementation subscribes to nothing, so adding such an
/// object to the bus is a no-op.
pub trait ListenerCapabilities: 'static {
    fn subscribe(listener: &Rc<Self>, bus: &CommandBus)
    where
        Self: Sized,
    {
        let _ = (listener, bus);
    }
}
