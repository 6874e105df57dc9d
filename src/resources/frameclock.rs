//! Frame clock for the headless host.
//!
//! Tracks scaled elapsed time and splits each frame into the number of
//! fixed steps to run, using an accumulator:
//!
//! ```text
//! accumulator += frame_delta * time_scale
//! while accumulator >= fixed_step { run fixed tick; accumulator -= fixed_step }
//! ```
//!
//! Pending steps are capped at [`MAX_FIXED_STEPS_PER_FRAME`] so a long stall
//! does not turn into a burst of catch-up work.

/// Upper bound on fixed steps produced by a single frame.
pub const MAX_FIXED_STEPS_PER_FRAME: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameClock {
    /// Scaled seconds since the clock started.
    pub elapsed: f32,
    /// Scaled delta of the last frame.
    pub delta: f32,
    pub time_scale: f32,
    /// Fixed step length in seconds (scaled time).
    pub fixed_step: f32,
    accumulator: f32,
}

impl Default for FrameClock {
    fn default() -> Self {
        FrameClock::new(1.0 / 50.0)
    }
}

impl FrameClock {
    pub fn new(fixed_step: f32) -> Self {
        FrameClock {
            elapsed: 0.0,
            delta: 0.0,
            time_scale: 1.0,
            fixed_step,
            accumulator: 0.0,
        }
    }

    pub fn with_time_scale(mut self, time_scale: f32) -> Self {
        self.time_scale = time_scale;
        self
    }

    /// Advance by an unscaled frame delta. Returns the number of fixed
    /// steps due this frame.
    pub fn advance(&mut self, dt: f32) -> u32 {
        let scaled = dt * self.time_scale;
        self.elapsed += scaled;
        self.delta = scaled;

        if self.fixed_step <= 0.0 {
            return 0;
        }
        self.accumulator += scaled;
        let mut steps = 0;
        while self.accumulator >= self.fixed_step && steps < MAX_FIXED_STEPS_PER_FRAME {
            self.accumulator -= self.fixed_step;
            steps += 1;
        }
        if steps == MAX_FIXED_STEPS_PER_FRAME {
            // drop the backlog
            self.accumulator = self.accumulator.min(self.fixed_step);
        }
        steps
    }

    /// Unconsumed time towards the next fixed step.
    pub fn accumulator(&self) -> f32 {
        self.accumulator
    }

    pub fn reset(&mut self) {
        *self = FrameClock {
            time_scale: self.time_scale,
            ..FrameClock::new(self.fixed_step)
        };
    }
}
