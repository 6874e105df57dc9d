//! Long-lived state shared by roots and the host.
//!
//! Overview
//! - `registry` – type-keyed dependency registry for one lifetime tier
//! - `commandbus` – scene-scoped broadcast of commands to weak listeners
//! - `scenecontext` – handle bundling both tiers, the bus and the injector
//! - `frameclock` – scaled time and fixed-step accumulator for the host loop
//! - `sceneconfig` – INI-backed host settings
pub mod commandbus;
pub mod frameclock;
pub mod registry;
pub mod sceneconfig;
pub mod scenecontext;
