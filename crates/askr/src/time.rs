//! Fixed-step accumulation.
//!
//! [`FixedStep`] turns the variable frame deltas handed to
//! [`Scene::update`](crate::scene::Scene::update) into a whole number of fixed
//! simulation steps, which is what the physics bridge feeds to its backend.

/// Fixed-timestep accumulator.
///
/// Frame deltas are added (capped at `max_frame_delta` to prevent a spiral of
/// death after a hitch) and consumed in whole `step` increments.
#[derive(Debug, Clone, Copy)]
pub struct FixedStep {
    step: f32,
    max_frame_delta: f32,
    accumulator: f32,
}

impl FixedStep {
    pub fn new(step: f32, max_frame_delta: f32) -> Self {
        let step = if step.is_finite() && step > 0.0 { step } else { 1.0 / 60.0 };
        Self {
            step,
            max_frame_delta: max_frame_delta.max(step),
            accumulator: 0.0,
        }
    }

    pub fn step(&self) -> f32 {
        self.step
    }

    /// Add a frame delta and return how many fixed steps are now due.
    pub fn advance(&mut self, frame_dt: f32) -> u32 {
        if !frame_dt.is_finite() || frame_dt <= 0.0 {
            return 0;
        }
        self.accumulator += frame_dt.min(self.max_frame_delta);
        let mut steps = 0;
        while self.accumulator >= self.step {
            self.accumulator -= self.step;
            steps += 1;
        }
        steps
    }

    /// Leftover time that has not yet amounted to a full step.
    pub fn remainder(&self) -> f32 {
        self.accumulator
    }
}
