//! Composition-root lifecycle framework.
//!
//! Scenes are wired by an ordered list of composite roots. Each root binds
//! services into a two-tier registry (global for the process, local for the
//! scene), and a [`RootOrchestrator`](systems::orchestrator::RootOrchestrator)
//! walks every root through install, pre-initialize, initialize and run with
//! a barrier between phases. Running roots may join the shared update loop,
//! and scene objects talk through a scoped command bus.
//!
//! This library backs the headless host binary and the integration tests.

pub mod components;
pub mod error;
pub mod events;
pub mod game;
pub mod resources;
pub mod systems;
