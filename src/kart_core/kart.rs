//! Per-kart mutable state and the item-effect primitives.
//!
//! `apply_boost` and `apply_hit` are the only entry points item behaviours
//! (bananas, shells, mushrooms) are allowed to use on a `KartState`.

use serde::Serialize;

use crate::kart_core::config::KartConfig;
use crate::kart_core::types::{
    forward_from_heading, normalize_angle, SurfaceTag, Vec3, WORLD_UP,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KartState {
    pub position: Vec3,
    pub prev_position: Vec3,    // pre-step snapshot, render interpolation only

    pub velocity: Vec3,         // world space, XZ driven by heading/grip
    pub heading: f32,           // (−π, π], 0 faces +Z
    pub speed: f32,             // signed, along heading

    pub vertical_velocity: f32,
    pub is_grounded: bool,

    pub is_drifting: bool,
    pub drift_direction: f32,   // -1, 0, +1
    pub steer_angle: f32,       // last applied steer (visual)

    pub boost_timer: f32,
    pub boost_power: f32,
    pub spin_timer: f32,
    pub shrink_timer: f32,
    pub star_timer: f32,
    pub hit_timer: f32,
    pub is_hit: bool,

    pub lap_progress: f32,      // [0, 1)

    pub on_anti_gravity: bool,
    pub track_normal: Vec3,     // cached for render tilt
    pub track_tangent: Vec3,
}

impl KartState {
    pub fn new(position: Vec3, heading: f32) -> Self {
        let heading = normalize_angle(heading);
        Self {
            position,
            prev_position: position,
            velocity: [0.0, 0.0, 0.0],
            heading,
            speed: 0.0,
            vertical_velocity: 0.0,
            is_grounded: true,
            is_drifting: false,
            drift_direction: 0.0,
            steer_angle: 0.0,
            boost_timer: 0.0,
            boost_power: 0.0,
            spin_timer: 0.0,
            shrink_timer: 0.0,
            star_timer: 0.0,
            hit_timer: 0.0,
            is_hit: false,
            lap_progress: 0.0,
            on_anti_gravity: false,
            track_normal: WORLD_UP,
            track_tangent: forward_from_heading(heading),
        }
    }

    pub fn forward(&self) -> Vec3 {
        forward_from_heading(self.heading)
    }

    pub fn is_spinning(&self) -> bool {
        self.spin_timer > 0.0
    }

    pub fn is_boosting(&self) -> bool {
        self.boost_timer > 0.0
    }

    pub fn is_starred(&self) -> bool {
        self.star_timer > 0.0
    }

    pub fn is_shrunk(&self) -> bool {
        self.shrink_timer > 0.0
    }

    /// Spinning or stunned: the kart ignores driver input this step.
    pub fn is_interrupted(&self) -> bool {
        self.is_spinning() || self.hit_timer > 0.0
    }

    /// Position blended between the last two steps.
    pub fn interpolated_position(&self, alpha: f32) -> Vec3 {
        let a = alpha.clamp(0.0, 1.0);
        [
            self.prev_position[0] + (self.position[0] - self.prev_position[0]) * a,
            self.prev_position[1] + (self.position[1] - self.prev_position[1]) * a,
            self.prev_position[2] + (self.position[2] - self.prev_position[2]) * a,
        ]
    }

    /// Counts every timer down by `dt`. Boost power drops with its timer.
    pub fn decay_timers(&mut self, dt: f32) {
        self.boost_timer = (self.boost_timer - dt).max(0.0);
        if self.boost_timer <= 0.0 {
            self.boost_power = 0.0;
        }
        self.spin_timer = (self.spin_timer - dt).max(0.0);
        self.hit_timer = (self.hit_timer - dt).max(0.0);
        self.is_hit = self.hit_timer > 0.0;
        self.star_timer = (self.star_timer - dt).max(0.0);
        self.shrink_timer = (self.shrink_timer - dt).max(0.0);
    }

    pub fn clamp_speed(&mut self, cfg: &KartConfig) {
        self.speed = self.speed.clamp(-cfg.reverse_max, absolute_speed_cap(cfg));
    }
}

// ============================================
// Speed limits
// ============================================

/// Current top speed. Every factor is an independent multiplier.
pub fn max_speed(cfg: &KartConfig, state: &KartState, tag: Option<SurfaceTag>) -> f32 {
    let mut factor = 1.0;
    if tag == Some(SurfaceTag::Offroad) && !state.is_starred() {
        factor *= cfg.offroad_factor;
    }
    if state.is_boosting() {
        factor *= 1.0 + state.boost_power;
    }
    if state.is_starred() {
        factor *= cfg.star_factor;
    }
    if state.is_shrunk() {
        factor *= cfg.shrink_factor;
    }
    cfg.max_speed * factor
}

/// Highest speed any combination of boost and star can reach.
pub fn absolute_speed_cap(cfg: &KartConfig) -> f32 {
    cfg.max_speed * (1.0 + cfg.max_boost_power) * cfg.star_factor.max(1.0)
}

// ============================================
// Item-effect primitives
// ============================================

/// Timed speed boost. Also lifts the current speed so a slow release still
/// feels rewarded.
pub fn apply_boost(cfg: &KartConfig, state: &mut KartState, power: f32, duration: f32) {
    let power = power.clamp(0.0, cfg.max_boost_power);
    state.boost_timer = duration.max(0.0);
    state.boost_power = power;
    state.speed = state.speed.max(cfg.max_speed * (1.0 + power * 0.5));
    state.clamp_speed(cfg);
}

/// Spin-out from an item. Returns `false` when a star absorbed the hit.
pub fn apply_hit(cfg: &KartConfig, state: &mut KartState, spin_duration: f32) -> bool {
    if state.is_starred() {
        return false;
    }
    let spin = spin_duration.max(0.0);
    state.spin_timer = state.spin_timer.max(spin);
    state.hit_timer = state.hit_timer.max(spin + cfg.hit_recovery);
    state.is_hit = state.hit_timer > 0.0;
    state.speed *= cfg.hit_speed_factor;
    state.boost_timer = 0.0;
    state.boost_power = 0.0;
    state.is_drifting = false;
    state.drift_direction = 0.0;
    tracing::debug!(spin, "kart hit");
    true
}
