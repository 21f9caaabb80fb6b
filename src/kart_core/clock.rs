// ==============================================================================
// clock.rs — FIXED-STEP ACCUMULATOR
// ------------------------------------------------------------------------------
// Converts wall-clock frame times into whole physics steps:
//
//     frame_dt  = min((now - last) / 1000, max_frame_dt)
//     residual += frame_dt
//     while residual >= fixed_dt && steps < max_steps { step(fixed_dt) }
//
// - The first tick only records the timestamp.
// - Time left over once the cap is hit is dropped, not carried into the next
//   frame (no catch-up spiral).
// - alpha = residual / fixed_dt is the render interpolation fraction.
// ==============================================================================

use crate::kart_core::config::ClockConfig;

#[derive(Debug, Clone)]
pub struct FixedStepClock {
    fixed_dt: f32,
    max_steps: u32,
    max_frame_dt: f32,
    residual: f32,
    last_ms: Option<f64>,
}

impl FixedStepClock {
    pub fn new(cfg: &ClockConfig) -> Self {
        Self {
            fixed_dt: cfg.fixed_dt,
            max_steps: cfg.max_steps.max(1),
            max_frame_dt: cfg.max_frame_dt,
            residual: 0.0,
            last_ms: None,
        }
    }

    pub fn fixed_dt(&self) -> f32 {
        self.fixed_dt
    }

    /// Render interpolation fraction in [0, 1).
    pub fn alpha(&self) -> f32 {
        self.residual / self.fixed_dt
    }

    /// Feed the current wall-clock time; runs `step` zero or more times.
    /// Returns how many steps ran.
    pub fn tick<F: FnMut(f32)>(&mut self, now_ms: f64, mut step: F) -> u32 {
        let Some(last) = self.last_ms.replace(now_ms) else {
            return 0;
        };

        // clocks going backwards count as a zero-length frame
        let frame_dt = (((now_ms - last) / 1000.0) as f32).clamp(0.0, self.max_frame_dt);
        self.residual += frame_dt;

        let mut steps = 0;
        while self.residual >= self.fixed_dt && steps < self.max_steps {
            step(self.fixed_dt);
            self.residual -= self.fixed_dt;
            steps += 1;
        }

        if self.residual >= self.fixed_dt {
            self.residual = 0.0;
        }

        steps
    }

    /// Clears the residual; the next `tick` re-baselines.
    pub fn reset(&mut self) {
        self.residual = 0.0;
        self.last_ms = None;
    }
}
