//! Per-frame update capabilities.
//!
//! A composite root opts into the shared update loop by implementing one or
//! more of these traits and returning itself from the matching
//! `CompositeRoot::as_*` query. The orchestrator then calls it once per
//! delivered signal, in root list order.

/// Called on every frame signal with the frame delta in seconds.
pub trait Tickable {
    fn tick(&mut self, delta: f32);
}

/// Called on every fixed-interval signal with the fixed step in seconds.
pub trait FixedTickable {
    fn fixed_tick(&mut self, delta: f32);
}

/// Called after every frame signal, once all [`Tickable`]s have run.
pub trait LateTickable {
    fn late_tick(&mut self, delta: f32);
}
