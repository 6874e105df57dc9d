//! Composite roots and their capabilities.
//!
//! Submodules overview:
//! - [`compositeroot`] – the root trait, its lifecycle states and phase futures
//! - [`manifest`] – declared binds and requirements, read by the dependency report
//! - [`tickable`] – frame, fixed-step and late-frame update capabilities

pub mod compositeroot;
pub mod manifest;
pub mod tickable;
