//! Simulation tunables.
//!
//! Every number the simulation reads lives here. `SimConfig::default()` is the
//! shipping tune; tests and the server may override any subset from JSON.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

// ============================================
// Reference drift constants
// ============================================
pub const DRIFT_MIN_SPEED: f32 = 12.0;
pub const DRIFT_MIN_STEER: f32 = 0.3;
pub const DRIFT_CHARGE_RATE: f32 = 1.0;

pub const DRIFT_STAGE_1_TIME: f32 = 0.6;
pub const DRIFT_STAGE_2_TIME: f32 = 1.3;
pub const DRIFT_STAGE_3_TIME: f32 = 2.2;

pub const DRIFT_BOOST_1_POWER: f32 = 0.2;
pub const DRIFT_BOOST_1_DURATION: f32 = 0.5;
pub const DRIFT_BOOST_2_POWER: f32 = 0.35;
pub const DRIFT_BOOST_2_DURATION: f32 = 0.9;
pub const DRIFT_BOOST_3_POWER: f32 = 0.5;
pub const DRIFT_BOOST_3_DURATION: f32 = 1.4;

pub const PHYSICS_STEP: f32 = 1.0 / 120.0;
pub const MAX_STEPS_PER_FRAME: u32 = 4;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================
// Kart handling
// ============================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KartConfig {
    pub max_speed: f32,            // m/s
    pub acceleration: f32,         // m/s²
    pub brake_decel: f32,          // m/s², braking while rolling forward
    pub reverse_accel: f32,        // m/s²
    pub reverse_max: f32,          // m/s
    pub coast_decel: f32,          // m/s², no pedal

    pub steer_rate: f32,           // rad/s at full authority
    pub steer_full_speed: f32,     // m/s where steering reaches full authority
    pub drift_angle_addition: f32, // inward bias while drifting (x steer_rate)
    pub drift_steer_factor: f32,   // direct steer share while drifting

    pub grip: f32,                 // 1/s velocity→heading convergence
    pub drift_grip: f32,           // 1/s, lower = more slide

    // --- speed multipliers (all multiplicative) ---
    pub offroad_factor: f32,
    pub star_factor: f32,
    pub shrink_factor: f32,
    pub max_boost_power: f32,      // ceiling for any single boost

    // --- vertical ---
    pub gravity: f32,              // m/s²
    pub snap_band: f32,            // m above ground that still hard-snaps
    pub fall_band: f32,            // m above ground where free fall starts
    pub pull_rate: f32,            // 1/s soft pull-in on flat ground
    pub steep_pull_rate: f32,      // 1/s soft pull-in on a 90° slope

    // --- walls ---
    pub wall_speed_loss: f32,      // speed multiplier per wall contact step

    // --- interruptions ---
    pub spin_decay: f32,           // per step
    pub hit_decay: f32,            // per step
    pub spin_visual_rate: f32,     // rad/s
    pub hit_recovery: f32,         // s of stun after the spin ends
    pub hit_speed_factor: f32,     // speed multiplier applied on hit

    // --- anti-gravity ---
    pub ag_min_speed: f32,         // m/s floor on loops
    pub ag_lateral_rate: f32,      // m/s lateral slide at full steer

    // --- surface features ---
    pub boost_pad_power: f32,
    pub boost_pad_duration: f32,   // s
    pub jump_velocity: f32,        // m/s
    pub jump_min_speed: f32,       // m/s
}

impl Default for KartConfig {
    fn default() -> Self {
        Self {
            max_speed: 30.0,
            acceleration: 18.0,
            brake_decel: 40.0,
            reverse_accel: 10.0,
            reverse_max: 8.0,
            coast_decel: 8.0,

            steer_rate: 2.2,
            steer_full_speed: 10.0,
            drift_angle_addition: 0.45,
            drift_steer_factor: 0.55,

            grip: 10.0,
            drift_grip: 3.0,

            offroad_factor: 0.55,
            star_factor: 1.25,
            shrink_factor: 0.6,
            max_boost_power: 1.0,

            gravity: 30.0,
            snap_band: 0.1,
            fall_band: 1.5,
            pull_rate: 8.0,
            steep_pull_rate: 20.0,

            wall_speed_loss: 0.7,

            spin_decay: 0.95,
            hit_decay: 0.98,
            spin_visual_rate: 12.0,
            hit_recovery: 0.4,
            hit_speed_factor: 0.5,

            ag_min_speed: 12.0,
            ag_lateral_rate: 6.0,

            boost_pad_power: 0.5,
            boost_pad_duration: 1.0,
            jump_velocity: 8.0,
            jump_min_speed: 8.0,
        }
    }
}

// ============================================
// Drift
// ============================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoostTier {
    pub power: f32,
    pub duration: f32, // s
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftConfig {
    pub min_speed: f32,
    pub min_steer: f32,
    pub charge_rate: f32,
    pub stage_times: [f32; 3], // Blue, Orange, Pink thresholds (charge units)
    pub boosts: [BoostTier; 3],
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            min_speed: DRIFT_MIN_SPEED,
            min_steer: DRIFT_MIN_STEER,
            charge_rate: DRIFT_CHARGE_RATE,
            stage_times: [DRIFT_STAGE_1_TIME, DRIFT_STAGE_2_TIME, DRIFT_STAGE_3_TIME],
            boosts: [
                BoostTier { power: DRIFT_BOOST_1_POWER, duration: DRIFT_BOOST_1_DURATION },
                BoostTier { power: DRIFT_BOOST_2_POWER, duration: DRIFT_BOOST_2_DURATION },
                BoostTier { power: DRIFT_BOOST_3_POWER, duration: DRIFT_BOOST_3_DURATION },
            ],
        }
    }
}

// ============================================
// Collision / rubber band
// ============================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionConfig {
    pub kart_radius: f32, // m
    pub bounce: f32,      // 0 = inelastic, 1 = elastic
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self { kart_radius: 1.0, bounce: 0.6 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RubberBandConfig {
    pub last_place_bonus: f32,
    pub first_place_penalty: f32,
    pub decay: f32, // per-frame speed multiplier while over the cap
}

impl Default for RubberBandConfig {
    fn default() -> Self {
        Self {
            last_place_bonus: 0.15,
            first_place_penalty: 0.05,
            decay: 0.995,
        }
    }
}

// ============================================
// AI
// ============================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiTuning {
    // difficulty ranges: [at difficulty 0, at difficulty 1]
    pub path_noise: [f32; 2],      // m
    pub reaction_delay: [f32; 2],  // s
    pub drift_skill: [f32; 2],     // 0..1

    pub look_ahead: f32,           // m
    pub steer_gain_base: f32,
    pub steer_gain_angle: f32,     // per rad of error
    pub wander_interval: [f32; 2], // s

    pub sharp_turn_angle: f32,     // rad
    pub sharp_turn_speed: f32,     // fraction of max speed
    pub sharp_turn_brake: f32,     // 0..1
    pub drift_angle: f32,          // rad

    pub stuck_speed: f32,          // m/s
    pub stuck_progress: f32,       // lap fraction per step treated as static
    pub stuck_time: f32,           // s
    pub recovery_reverse_time: f32,
    pub recovery_forward_time: f32,
    pub recovery_jitter: f32,      // s, added to the reverse phase
    pub recovery_look_ahead: f32,  // m

    pub item_cooldown: [f32; 2],   // s
    pub mushroom_chance: f32,
    pub green_shell_radius: f32,   // m
}

impl Default for AiTuning {
    fn default() -> Self {
        Self {
            path_noise: [3.0, 0.5],
            reaction_delay: [0.35, 0.05],
            drift_skill: [0.2, 0.95],

            look_ahead: 12.0,
            steer_gain_base: 1.5,
            steer_gain_angle: 2.0,
            wander_interval: [1.0, 3.0],

            sharp_turn_angle: 0.7,
            sharp_turn_speed: 0.75,
            sharp_turn_brake: 0.4,
            drift_angle: 0.35,

            stuck_speed: 1.0,
            stuck_progress: 1e-4,
            stuck_time: 1.2,
            recovery_reverse_time: 0.8,
            recovery_forward_time: 1.0,
            recovery_jitter: 0.3,
            recovery_look_ahead: 6.0,

            item_cooldown: [1.0, 3.0],
            mushroom_chance: 0.5,
            green_shell_radius: 20.0,
        }
    }
}

// ============================================
// Items / clock
// ============================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemConfig {
    pub mushroom_power: f32,
    pub mushroom_duration: f32, // s
    pub star_duration: f32,     // s
    pub lightning_shrink: f32,  // s
    pub lightning_spin: f32,    // s
}

impl Default for ItemConfig {
    fn default() -> Self {
        Self {
            mushroom_power: 0.6,
            mushroom_duration: 1.2,
            star_duration: 8.0,
            lightning_shrink: 6.0,
            lightning_spin: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    pub fixed_dt: f32,     // s
    pub max_steps: u32,    // per frame
    pub max_frame_dt: f32, // s
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            fixed_dt: PHYSICS_STEP,
            max_steps: MAX_STEPS_PER_FRAME,
            max_frame_dt: 0.1,
        }
    }
}

// ============================================
// Everything
// ============================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub kart: KartConfig,
    pub drift: DriftConfig,
    pub collision: CollisionConfig,
    pub rubber_band: RubberBandConfig,
    pub ai: AiTuning,
    pub items: ItemConfig,
    pub clock: ClockConfig,
    pub seed: Option<u64>,
}

impl SimConfig {
    pub fn from_json_str(txt: &str) -> Result<Self, ConfigError> {
        let cfg: SimConfig = serde_json::from_str(txt)?;
        if let Err(e) = cfg.validate() {
            tracing::warn!("rejected config: {e}");
            return Err(e);
        }
        Ok(cfg)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let txt = std::fs::read_to_string(path)?;
        Self::from_json_str(&txt)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if !(self.clock.fixed_dt > 0.0) {
            return invalid("clock.fixed_dt must be positive");
        }
        if self.clock.max_steps == 0 {
            return invalid("clock.max_steps must be at least 1");
        }
        if !(self.kart.max_speed > 0.0) || self.kart.reverse_max < 0.0 {
            return invalid("kart speed limits must be positive");
        }
        let [s1, s2, s3] = self.drift.stage_times;
        if !(0.0 < s1 && s1 < s2 && s2 < s3) {
            return invalid("drift.stage_times must be positive and strictly ascending");
        }
        if self.drift.boosts.iter().any(|b| b.power > self.kart.max_boost_power) {
            return invalid("drift boost power exceeds kart.max_boost_power");
        }
        if self.collision.kart_radius < 0.0 {
            return invalid("collision.kart_radius must not be negative");
        }
        if !(0.0..=1.0).contains(&self.collision.bounce) {
            return invalid("collision.bounce must be in [0, 1]");
        }
        if !(0.0 < self.rubber_band.decay && self.rubber_band.decay <= 1.0) {
            return invalid("rubber_band.decay must be in (0, 1]");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        SimConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_json_overrides_only_named_fields() {
        let cfg = SimConfig::from_json_str(r#"{ "kart": { "max_speed": 42.0 }, "seed": 7 }"#).unwrap();
        assert_eq!(cfg.kart.max_speed, 42.0);
        assert_eq!(cfg.kart.acceleration, KartConfig::default().acceleration);
        assert_eq!(cfg.seed, Some(7));
    }

    #[test]
    fn rejects_descending_drift_stages() {
        let err = SimConfig::from_json_str(r#"{ "drift": { "stage_times": [1.0, 0.5, 2.0] } }"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_bounce_outside_unit_range() {
        for bounce in ["1.5", "-0.1"] {
            let txt = format!(r#"{{ "collision": {{ "bounce": {bounce} }} }}"#);
            let err = SimConfig::from_json_str(&txt).unwrap_err();
            assert!(matches!(&err, ConfigError::Invalid(msg) if msg.contains("bounce")), "{err}");
        }
        let mut cfg = SimConfig::default();
        cfg.collision.bounce = 1.0;
        cfg.validate().unwrap();
        cfg.collision.bounce = f32::NAN;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_malformed_json() {
        let err = SimConfig::from_json_str("{ kart: ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
