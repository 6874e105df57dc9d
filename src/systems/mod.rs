//! Scene systems.
//!
//! This module groups the code that acts on roots and services: building
//! them, driving their lifecycle and inspecting their wiring.
//!
//! Submodules overview
//! - [`injector`] – constructor and member injection through a factory map
//! - [`orchestrator`] – phase pipeline, tick lists and teardown
//! - [`frameloop`] – per-frame delivery of fixed, frame and late signals
//! - [`report`] – static dependency analysis of a root list

pub mod frameloop;
pub mod injector;
pub mod orchestrator;
pub mod report;
