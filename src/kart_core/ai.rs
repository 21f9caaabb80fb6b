// ==============================================================================
// ai.rs — COMPUTER DRIVER
// ------------------------------------------------------------------------------
// Produces a KartInput per fixed step; the race feeds it to the integrator
// together with the human inputs, so every decision for a step exists before
// any kart moves.
//
// Per step:
//   finished / spinning / stunned  -> idle input
//   anti-gravity                   -> full throttle, zero steer
//   recovering                     -> reverse phase, then forward phase
//   otherwise                      -> look-ahead steering + brake + drift
// Items are considered separately on a randomized cooldown.
//
// Every random draw goes through a named `roll_*` function on the injected
// generator so a pinned seed replays the same race.
// ==============================================================================

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::kart_core::config::{AiTuning, SimConfig};
use crate::kart_core::items::ItemKind;
use crate::kart_core::kart::{max_speed, KartState};
use crate::kart_core::surface::{SplineProvider, SurfaceQuery};
use crate::kart_core::types::{
    heading_of, normalize_angle, sign_or_zero, v_add, v_len_xz, v_scale, v_sub, wrapped_delta,
    KartInput, Vec3,
};

// ============================================
// Difficulty
// ============================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CpuDifficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl CpuDifficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            CpuDifficulty::Easy => "Easy",
            CpuDifficulty::Medium => "Medium",
            CpuDifficulty::Hard => "Hard",
        }
    }

    pub fn scalar(self) -> f32 {
        match self {
            CpuDifficulty::Easy => 0.2,
            CpuDifficulty::Medium => 0.5,
            CpuDifficulty::Hard => 0.9,
        }
    }
}

/// Fixed per-driver parameters derived from a 0..1 difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AiConfig {
    pub path_noise: f32,     // m, wander amplitude
    pub reaction_delay: f32, // s, steering lag
    pub drift_skill: f32,    // chance to commit to a drift opportunity
}

impl AiConfig {
    pub fn from_difficulty(tuning: &AiTuning, difficulty: f32) -> Self {
        let d = if difficulty.is_finite() { difficulty.clamp(0.0, 1.0) } else { 0.5 };
        let lerp = |r: [f32; 2]| r[0] + (r[1] - r[0]) * d;
        Self {
            path_noise: lerp(tuning.path_noise).max(0.0),
            reaction_delay: lerp(tuning.reaction_delay).max(0.0),
            drift_skill: lerp(tuning.drift_skill).clamp(0.0, 1.0),
        }
    }
}

// ============================================
// Per-step inputs / outputs
// ============================================

/// What the driver may know about the race this step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AiContext {
    pub rank: usize, // 1-based
    pub racer_count: usize,
    pub held_item: Option<ItemKind>,
    pub nearest_opponent: Option<f32>, // m, planar
    pub finished: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AiDecision {
    pub input: KartInput,
    pub use_item: bool,
}

impl AiDecision {
    const IDLE: AiDecision = AiDecision { input: KartInput::IDLE, use_item: false };
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Recovery {
    Reversing { remaining: f32, steer_sign: f32 },
    Forward { remaining: f32 },
}

/// Planar distance from `karts[slot]` to the closest other kart.
pub fn nearest_opponent(karts: &[KartState], slot: usize) -> Option<f32> {
    let me = karts.get(slot)?.position;
    karts
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != slot)
        .map(|(_, k)| v_len_xz(v_sub(k.position, me)))
        .min_by(|a, b| a.total_cmp(b))
}

// ============================================
// Driver
// ============================================

#[derive(Debug, Clone, Serialize)]
pub struct AiDriver {
    pub config: AiConfig,

    wander_offset: f32,
    wander_target: f32,
    wander_timer: f32,

    item_cooldown: f32,

    stuck_timer: f32,
    last_progress: Option<f32>,
    recovery: Option<Recovery>,

    steer: f32,                   // smoothed output
    drift_commit: Option<bool>,   // decided once per opportunity
}

impl AiDriver {
    pub fn new(config: AiConfig) -> Self {
        Self {
            config,
            wander_offset: 0.0,
            wander_target: 0.0,
            wander_timer: 0.0,
            item_cooldown: 0.0,
            stuck_timer: 0.0,
            last_progress: None,
            recovery: None,
            steer: 0.0,
            drift_commit: None,
        }
    }

    pub fn with_difficulty(tuning: &AiTuning, difficulty: CpuDifficulty) -> Self {
        Self::new(AiConfig::from_difficulty(tuning, difficulty.scalar()))
    }

    pub fn recovery(&self) -> Option<Recovery> {
        self.recovery
    }

    pub fn is_recovering(&self) -> bool {
        self.recovery.is_some()
    }

    pub fn stuck_timer(&self) -> f32 {
        self.stuck_timer
    }

    pub fn update<T, R>(
        &mut self,
        cfg: &SimConfig,
        state: &KartState,
        ctx: &AiContext,
        track: &T,
        dt: f32,
        rng: &mut R,
    ) -> AiDecision
    where
        T: SplineProvider + SurfaceQuery + ?Sized,
        R: Rng + ?Sized,
    {
        let tuning = &cfg.ai;

        if ctx.finished || state.is_interrupted() {
            self.steer = 0.0;
            self.drift_commit = None;
            self.stuck_timer = 0.0;
            self.last_progress = Some(state.lap_progress);
            return AiDecision::IDLE;
        }

        self.update_wander(tuning, dt, rng);
        self.update_stuck(tuning, state, track, dt, rng);

        let input = if state.on_anti_gravity {
            self.steer = 0.0;
            self.drift_commit = None;
            KartInput { accel: 1.0, ..KartInput::IDLE }
        } else if let Some(recovery) = self.recovery {
            self.recovery_input(tuning, recovery, state, track, dt)
        } else {
            self.race_input(cfg, state, track, dt, rng)
        };

        let use_item = self.update_items(tuning, ctx, dt, rng);
        AiDecision { input, use_item }
    }

    // ------------------------------------------------------------------
    // wander
    // ------------------------------------------------------------------
    fn update_wander<R: Rng + ?Sized>(&mut self, tuning: &AiTuning, dt: f32, rng: &mut R) {
        self.wander_timer -= dt;
        if self.wander_timer <= 0.0 {
            self.wander_target = roll_wander_target(rng, self.config.path_noise);
            self.wander_timer = roll_wander_interval(rng, tuning.wander_interval);
        }
        self.wander_offset += (self.wander_target - self.wander_offset) * (1.5 * dt).min(1.0);
    }

    // ------------------------------------------------------------------
    // stuck detection / recovery
    // ------------------------------------------------------------------
    fn update_stuck<T, R>(&mut self, tuning: &AiTuning, state: &KartState, track: &T, dt: f32, rng: &mut R)
    where
        T: SplineProvider + SurfaceQuery + ?Sized,
        R: Rng + ?Sized,
    {
        let progressed = self
            .last_progress
            .map_or(f32::INFINITY, |last| wrapped_delta(last, state.lap_progress).abs());
        self.last_progress = Some(state.lap_progress);

        if self.recovery.is_some() || state.on_anti_gravity {
            self.stuck_timer = 0.0;
            return;
        }

        if state.speed.abs() < tuning.stuck_speed && progressed < tuning.stuck_progress {
            self.stuck_timer += dt;
        } else {
            self.stuck_timer = 0.0;
        }

        if self.stuck_timer > tuning.stuck_time {
            let reverse = tuning.recovery_reverse_time + roll_recovery_jitter(rng, tuning.recovery_jitter);
            // steering inverts in reverse: +sign(error) swings the nose toward the centerline
            let error = centerline_error(state, track, tuning.recovery_look_ahead);
            let steer_sign = if error == 0.0 { 1.0 } else { sign_or_zero(error) };
            self.recovery = Some(Recovery::Reversing { remaining: reverse, steer_sign });
            self.stuck_timer = 0.0;
            self.drift_commit = None;
            tracing::debug!(t = state.lap_progress, reverse, "ai stuck, recovering");
        }
    }

    fn recovery_input<T>(
        &mut self,
        tuning: &AiTuning,
        recovery: Recovery,
        state: &KartState,
        track: &T,
        dt: f32,
    ) -> KartInput
    where
        T: SplineProvider + SurfaceQuery + ?Sized,
    {
        self.drift_commit = None;
        match recovery {
            Recovery::Reversing { remaining, steer_sign } => {
                let remaining = remaining - dt;
                self.recovery = if remaining > 0.0 {
                    Some(Recovery::Reversing { remaining, steer_sign })
                } else {
                    Some(Recovery::Forward { remaining: tuning.recovery_forward_time })
                };
                self.steer = steer_sign;
                KartInput { brake: 1.0, steer: steer_sign, ..KartInput::IDLE }
            }
            Recovery::Forward { remaining } => {
                let remaining = remaining - dt;
                if remaining > 0.0 {
                    self.recovery = Some(Recovery::Forward { remaining });
                } else {
                    self.recovery = None;
                    tracing::debug!(t = state.lap_progress, "ai recovered");
                }
                let error = centerline_error(state, track, tuning.recovery_look_ahead);
                self.steer = steering_for(tuning, error);
                KartInput { accel: 1.0, steer: self.steer, ..KartInput::IDLE }
            }
        }
    }

    // ------------------------------------------------------------------
    // racing line
    // ------------------------------------------------------------------
    fn race_input<T, R>(&mut self, cfg: &SimConfig, state: &KartState, track: &T, dt: f32, rng: &mut R) -> KartInput
    where
        T: SplineProvider + SurfaceQuery + ?Sized,
        R: Rng + ?Sized,
    {
        let tuning = &cfg.ai;
        let length = track.spline_length().max(1e-3);
        let ahead = track.point_at(state.lap_progress + tuning.look_ahead / length);
        let target = v_add(ahead.position, v_scale(ahead.binormal, self.wander_offset));
        let error = heading_error(state, target);

        // reaction delay: first-order lag on the steering output
        let wanted = steering_for(tuning, error);
        let lag = if self.config.reaction_delay > 0.0 {
            (dt / self.config.reaction_delay).min(1.0)
        } else {
            1.0
        };
        self.steer += (wanted - self.steer) * lag;

        let mut input = KartInput { accel: 1.0, steer: self.steer, ..KartInput::IDLE };

        let top = max_speed(&cfg.kart, state, None);
        if error.abs() > tuning.sharp_turn_angle && state.speed > top * tuning.sharp_turn_speed {
            input.accel = 0.0;
            input.brake = tuning.sharp_turn_brake;
        }

        let opportunity = error.abs() > tuning.drift_angle && state.speed >= cfg.drift.min_speed;
        if opportunity {
            let skill = self.config.drift_skill;
            input.drift_held = *self.drift_commit.get_or_insert_with(|| roll_drift_commit(rng, skill));
        } else {
            self.drift_commit = None;
        }

        input
    }

    // ------------------------------------------------------------------
    // items
    // ------------------------------------------------------------------
    fn update_items<R: Rng + ?Sized>(&mut self, tuning: &AiTuning, ctx: &AiContext, dt: f32, rng: &mut R) -> bool {
        self.item_cooldown -= dt;
        let Some(kind) = ctx.held_item else {
            return false;
        };
        if self.item_cooldown > 0.0 {
            return false;
        }
        self.item_cooldown = roll_item_cooldown(rng, tuning.item_cooldown);
        should_use_item(tuning, kind, ctx, rng)
    }
}

/// Fixed decision table; the only draw is the mushroom coin flip.
pub fn should_use_item<R: Rng + ?Sized>(tuning: &AiTuning, kind: ItemKind, ctx: &AiContext, rng: &mut R) -> bool {
    match kind {
        ItemKind::Mushroom => roll_mushroom(rng, tuning.mushroom_chance),
        ItemKind::Banana => ctx.rank <= 3,
        ItemKind::GreenShell => ctx.nearest_opponent.is_some_and(|d| d <= tuning.green_shell_radius),
        ItemKind::RedShell => ctx.rank > 1,
        ItemKind::Star => true,
        ItemKind::Lightning => ctx.rank >= 4,
    }
}

// ============================================
// Steering helpers
// ============================================

/// Signed heading change needed to face `target`, in (−π, π].
fn heading_error(state: &KartState, target: Vec3) -> f32 {
    match heading_of(v_sub(target, state.position)) {
        Some(desired) => normalize_angle(desired - state.heading),
        None => 0.0,
    }
}

fn centerline_error<T>(state: &KartState, track: &T, look_ahead: f32) -> f32
where
    T: SplineProvider + SurfaceQuery + ?Sized,
{
    let length = track.spline_length().max(1e-3);
    let p = track.point_at(state.lap_progress + look_ahead / length);
    heading_error(state, p.position)
}

/// Positive steer lowers heading, so the sign is flipped.
fn steering_for(tuning: &AiTuning, error: f32) -> f32 {
    let gain = tuning.steer_gain_base + error.abs() * tuning.steer_gain_angle;
    (-error * gain).clamp(-1.0, 1.0)
}

// ============================================
// Named draws
// ============================================

fn roll_wander_target<R: Rng + ?Sized>(rng: &mut R, noise: f32) -> f32 {
    if noise <= 0.0 { 0.0 } else { rng.gen_range(-noise..=noise) }
}

fn roll_wander_interval<R: Rng + ?Sized>(rng: &mut R, range: [f32; 2]) -> f32 {
    roll_between(rng, range)
}

fn roll_item_cooldown<R: Rng + ?Sized>(rng: &mut R, range: [f32; 2]) -> f32 {
    roll_between(rng, range)
}

fn roll_recovery_jitter<R: Rng + ?Sized>(rng: &mut R, jitter: f32) -> f32 {
    if jitter <= 0.0 { 0.0 } else { rng.gen_range(0.0..=jitter) }
}

fn roll_drift_commit<R: Rng + ?Sized>(rng: &mut R, skill: f32) -> bool {
    rng.gen_bool(f64::from(skill.clamp(0.0, 1.0)))
}

fn roll_mushroom<R: Rng + ?Sized>(rng: &mut R, chance: f32) -> bool {
    rng.gen_bool(f64::from(chance.clamp(0.0, 1.0)))
}

fn roll_between<R: Rng + ?Sized>(rng: &mut R, range: [f32; 2]) -> f32 {
    let (lo, hi) = (range[0].min(range[1]), range[0].max(range[1]));
    if hi - lo <= f32::EPSILON { lo } else { rng.gen_range(lo..hi) }
}
