//! Per-frame driver for a running scene.
//!
//! Advances the [`FrameClock`] once per frame and forwards the update
//! signals to the orchestrator in this order:
//!
//! 1. `fixed_tick` once per fixed step due this frame
//! 2. `tick` with the scaled frame delta
//! 3. `late_tick` with the same delta
use log::{debug, trace};

use crate::resources::frameclock::FrameClock;
use crate::resources::sceneconfig::SceneConfig;
use crate::systems::orchestrator::RootOrchestrator;

/// Counters accumulated by [`FrameLoop`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameStats {
    pub frames: u32,
    pub fixed_steps: u32,
}

#[derive(Debug, Clone)]
pub struct FrameLoop {
    clock: FrameClock,
    frame_delta: f32,
    stats: FrameStats,
}

impl FrameLoop {
    pub fn new(frame_delta: f32, fixed_step: f32) -> Self {
        FrameLoop {
            clock: FrameClock::new(fixed_step),
            frame_delta,
            stats: FrameStats::default(),
        }
    }

    pub fn from_config(config: &SceneConfig) -> Self {
        let mut frame_loop = FrameLoop::new(config.frame_delta(), config.fixed_step());
        frame_loop.clock.time_scale = config.time_scale;
        frame_loop
    }

    /// Run one frame. Returns the number of fixed steps delivered.
    pub fn step(&mut self, orchestrator: &mut RootOrchestrator) -> u32 {
        let fixed_steps = self.clock.advance(self.frame_delta);
        for _ in 0..fixed_steps {
            orchestrator.fixed_tick(self.clock.fixed_step);
        }
        orchestrator.tick(self.clock.delta);
        orchestrator.late_tick(self.clock.delta);

        self.stats.frames += 1;
        self.stats.fixed_steps += fixed_steps;
        trace!(
            "Frame {} at {:.3}s: {} fixed step(s)",
            self.stats.frames, self.clock.elapsed, fixed_steps
        );
        fixed_steps
    }

    /// Run up to `frames` frames, stopping early if the scene stops running.
    pub fn run(&mut self, orchestrator: &mut RootOrchestrator, frames: u32) -> FrameStats {
        for _ in 0..frames {
            if !orchestrator.is_started() {
                debug!("Scene is not running, frame loop stopped");
                break;
            }
            self.step(orchestrator);
        }
        self.stats
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::compositeroot::CompositeRoot;
    use crate::components::tickable::{FixedTickable, LateTickable, Tickable};
    use crate::resources::scenecontext::SceneContext;
    use futures::executor::block_on;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Recorder {
        log: Rc<RefCell<Vec<&'static str>>>,
    }

    impl Tickable for Recorder {
        fn tick(&mut self, _delta: f32) {
            self.log.borrow_mut().push("tick");
        }
    }

    impl FixedTickable for Recorder {
        fn fixed_tick(&mut self, _delta: f32) {
            self.log.borrow_mut().push("fixed");
        }
    }

    impl LateTickable for Recorder {
        fn late_tick(&mut self, _delta: f32) {
            self.log.borrow_mut().push("late");
        }
    }

    impl CompositeRoot for Recorder {
        fn as_tickable(&mut self) -> Option<&mut dyn Tickable> {
            Some(self)
        }
        fn as_fixed_tickable(&mut self) -> Option<&mut dyn FixedTickable> {
            Some(self)
        }
        fn as_late_tickable(&mut self) -> Option<&mut dyn LateTickable> {
            Some(self)
        }
    }

    #[test]
    fn test_signal_order_within_a_frame() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut orchestrator = RootOrchestrator::new(SceneContext::new())
            .with_root(Recorder { log: log.clone() });
        block_on(orchestrator.start()).unwrap();

        // two fixed steps per frame
        let mut frame_loop = FrameLoop::new(0.5, 0.25);
        assert_eq!(frame_loop.step(&mut orchestrator), 2);
        assert_eq!(*log.borrow(), vec!["fixed", "fixed", "tick", "late"]);
    }

    #[test]
    fn test_run_counts_frames_and_stops_after_teardown() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut orchestrator = RootOrchestrator::new(SceneContext::new())
            .with_root(Recorder { log: log.clone() });
        block_on(orchestrator.start()).unwrap();

        let mut frame_loop = FrameLoop::new(0.25, 0.5);
        let stats = frame_loop.run(&mut orchestrator, 4);
        assert_eq!(stats, FrameStats { frames: 4, fixed_steps: 2 });

        orchestrator.teardown();
        let stats = frame_loop.run(&mut orchestrator, 4);
        assert_eq!(stats.frames, 4);
    }

    struct Refuses;

    impl CompositeRoot for Refuses {
        fn run(&mut self) -> crate::components::compositeroot::PhaseFuture<'_> {
            Box::pin(futures::future::ready(Err(
                crate::error::CompositionError::phase_failed("refuses", "run", "not today"),
            )))
        }
    }

    #[test]
    fn test_run_skips_scene_whose_startup_aborted() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut orchestrator = RootOrchestrator::new(SceneContext::new())
            .with_root(Recorder { log: log.clone() })
            .with_root(Refuses);
        assert!(block_on(orchestrator.start()).is_err());

        let mut frame_loop = FrameLoop::new(0.25, 0.5);
        assert_eq!(frame_loop.run(&mut orchestrator, 4).frames, 0);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_from_config_uses_rates_and_scale() {
        let mut config = SceneConfig::new();
        config.frame_rate = 10;
        config.fixed_rate = 5;
        config.time_scale = 2.0;
        let frame_loop = FrameLoop::from_config(&config);
        assert!((frame_loop.frame_delta - 0.1).abs() < 1e-6);
        assert!((frame_loop.clock().fixed_step - 0.2).abs() < 1e-6);
        assert_eq!(frame_loop.clock().time_scale, 2.0);
    }
}
