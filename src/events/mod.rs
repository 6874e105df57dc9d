//! Scene commands.
//!
//! Submodules:
//! - [`command`] – command marker, listener trait and capability declaration
//!
//! Commands travel through the
//! [`CommandBus`](crate::resources::commandbus::CommandBus) of the scene.
pub mod command;
