// ==============================================================================
// integrator.rs — KART STEP (SPIN / HIT / ANTI-GRAVITY / NORMAL)
// ==============================================================================
// One call = one fixed step for one kart:
//
// 1) decay timers
// 2) surface lookup
//      on anti-gravity -> by parameter (lap_progress), otherwise by position
//      leaving anti-gravity -> snap Y to the fresh ground height
// 3) branch = select_branch(interruption, on_anti_gravity)
//
//        interruption | off anti-gravity | on anti-gravity
//        -------------+------------------+---------------------------
//        spin         | Spin             | AntiGravity, inputs zeroed
//        hit          | HitStun          | AntiGravity, inputs zeroed
//        none         | Normal           | AntiGravity
//
//    Spin beats hit. On anti-gravity the kart keeps moving along the loop
//    while stunned instead of freezing in place.
// 4) branch body
// 5) heading wrapped to (−π, π], speed clamped
//
// Speed model (shared by Normal and AntiGravity):
//   accel (not reversing) -> toward max_speed(...)
//   brake                 -> toward 0, then into reverse
//   neither               -> coast toward 0
//   above max             -> bleed at 2 * coast_decel (soft ceiling)
//
// Ground bands (Normal, height above ground `h`):
//   h <= snap_band (and not rising)  -> snap, slope-follow vertical velocity
//   h >  fall_band                   -> free fall
//   otherwise                        -> soft pull-in while descending,
//                                       stronger on steep slopes
// ==============================================================================

use serde::Serialize;

use crate::kart_core::config::{KartConfig, SimConfig};
use crate::kart_core::drift::DriftState;
use crate::kart_core::kart::{apply_boost, max_speed, KartState};
use crate::kart_core::surface::SurfaceQuery;
use crate::kart_core::types::{
    forward_from_heading, heading_of, normalize_angle, sign_or_zero, v_add, v_dot, v_scale,
    v_sub, wrap_unit, KartInput, SurfaceInfo, SurfaceTag, WORLD_UP,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Interruption {
    None,
    Spin,
    Hit,
}

impl Interruption {
    pub fn of(state: &KartState) -> Self {
        if state.spin_timer > 0.0 {
            Interruption::Spin
        } else if state.hit_timer > 0.0 {
            Interruption::Hit
        } else {
            Interruption::None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StepBranch {
    Spin,
    HitStun,
    AntiGravity { inputs_zeroed: bool },
    Normal,
}

/// The transition table. Exactly one branch runs per step.
pub fn select_branch(interruption: Interruption, on_anti_gravity: bool) -> StepBranch {
    match (interruption, on_anti_gravity) {
        (Interruption::Spin, false) => StepBranch::Spin,
        (Interruption::Hit, false) => StepBranch::HitStun,
        (Interruption::None, false) => StepBranch::Normal,
        (Interruption::None, true) => StepBranch::AntiGravity { inputs_zeroed: false },
        (_, true) => StepBranch::AntiGravity { inputs_zeroed: true },
    }
}

/// Advance one kart by one fixed step. Returns the branch that ran.
pub fn advance<Q: SurfaceQuery + ?Sized>(
    cfg: &SimConfig,
    state: &mut KartState,
    drift: &mut DriftState,
    input: &KartInput,
    dt: f32,
    track: &Q,
) -> StepBranch {
    let kcfg = &cfg.kart;
    let input = input.clamped();

    state.prev_position = state.position;
    state.decay_timers(dt);

    let surface = if state.on_anti_gravity {
        track.surface_at_t(state.lap_progress, state.position)
    } else {
        track.surface_at(state.position)
    };
    let on_ag = surface.is_some_and(|s| s.tag == SurfaceTag::Antigravity);

    if state.on_anti_gravity && !on_ag {
        snap_to_ground(state, track);
    }
    state.on_anti_gravity = on_ag;

    let interruption = Interruption::of(state);
    if interruption != Interruption::None && drift.active {
        drift.cancel(state);
    }

    let branch = select_branch(interruption, on_ag);
    match branch {
        StepBranch::Spin => {
            state.speed *= kcfg.spin_decay;
            state.heading += kcfg.spin_visual_rate * dt;
            state.steer_angle = 0.0;
        }
        StepBranch::HitStun => {
            state.speed *= kcfg.hit_decay;
            state.steer_angle = 0.0;
        }
        StepBranch::AntiGravity { inputs_zeroed } => {
            let input = if inputs_zeroed {
                if state.spin_timer > 0.0 { state.speed *= kcfg.spin_decay; }
                if state.hit_timer > 0.0 { state.speed *= kcfg.hit_decay; }
                KartInput::IDLE
            } else {
                drift.update(&cfg.drift, kcfg, state, input.steer, input.drift_held, dt);
                input
            };
            // `on_ag` implies a surface
            if let Some(surface) = surface {
                step_anti_gravity(kcfg, state, &input, dt, track, &surface);
            }
        }
        StepBranch::Normal => {
            drift.update(&cfg.drift, kcfg, state, input.steer, input.drift_held, dt);
            step_normal(kcfg, state, &input, dt, track);
        }
    }

    state.heading = normalize_angle(state.heading);
    state.clamp_speed(kcfg);
    branch
}

/// Forces the kart onto the ground under it (used the step after leaving an
/// anti-gravity section, where Y was loop-relative).
fn snap_to_ground<Q: SurfaceQuery + ?Sized>(state: &mut KartState, track: &Q) {
    if let Some(ground) = track.surface_at(state.position) {
        state.position[1] = ground.height;
        state.vertical_velocity = 0.0;
        state.velocity[1] = 0.0;
        state.is_grounded = true;
        tracing::debug!(t = ground.t, "left anti-gravity, snapped to ground");
    }
}

// ----------------------------------------------------------------------
// Speed
// ----------------------------------------------------------------------
fn update_speed(cfg: &KartConfig, state: &mut KartState, input: &KartInput, max: f32, dt: f32) {
    let speed = state.speed;

    state.speed = if input.accel > 0.0 && speed >= 0.0 {
        if speed < max {
            (speed + cfg.acceleration * input.accel * dt).min(max)
        } else {
            speed
        }
    } else if input.brake > 0.0 {
        if speed > 0.0 {
            (speed - cfg.brake_decel * input.brake * dt).max(0.0)
        } else {
            speed - cfg.reverse_accel * input.brake * dt
        }
    } else if speed > 0.0 {
        (speed - cfg.coast_decel * dt).max(0.0)
    } else {
        (speed + cfg.coast_decel * dt).min(0.0)
    };

    // soft ceiling: e.g. a boost just ran out
    if state.speed > max {
        state.speed = (state.speed - 2.0 * cfg.coast_decel * dt).max(max);
    }
    state.speed = state.speed.max(-cfg.reverse_max);
}

// ----------------------------------------------------------------------
// Normal driving
// ----------------------------------------------------------------------
fn step_normal<Q: SurfaceQuery + ?Sized>(
    cfg: &KartConfig,
    state: &mut KartState,
    input: &KartInput,
    dt: f32,
    track: &Q,
) {
    // tag under the kart before moving decides this step's top speed
    let tag_before = track.surface_at(state.position).map(|s| s.tag);
    let max = max_speed(cfg, state, tag_before);
    update_speed(cfg, state, input, max, dt);

    // --- steering ---
    let authority = (state.speed / cfg.steer_full_speed.max(1e-3)).clamp(-1.0, 1.0);
    let turn = if state.is_drifting {
        state.drift_direction * cfg.drift_angle_addition + input.steer * cfg.drift_steer_factor
    } else {
        input.steer
    };
    state.heading -= turn * cfg.steer_rate * authority * dt;
    state.steer_angle = input.steer;

    // --- grip: planar velocity chases heading * speed ---
    let forward = forward_from_heading(state.heading);
    let target = v_scale(forward, state.speed);
    let grip = if state.is_drifting { cfg.drift_grip } else { cfg.grip };
    let k = 1.0 - (-grip * dt).exp();
    state.velocity[0] += (target[0] - state.velocity[0]) * k;
    state.velocity[2] += (target[2] - state.velocity[2]) * k;

    // --- vertical ---
    if !state.is_grounded {
        state.vertical_velocity -= cfg.gravity * dt;
    }
    state.velocity[1] = state.vertical_velocity;

    let prev_y = state.position[1];
    state.position = v_add(state.position, v_scale(state.velocity, dt));

    let Some(surface) = track.surface_at(state.position) else {
        // off the corridor: no ground, no walls
        state.is_grounded = false;
        state.track_normal = WORLD_UP;
        state.track_tangent = forward;
        return;
    };

    settle_on_ground(cfg, state, &surface, prev_y, dt);
    collide_walls(cfg, state, &surface);

    if state.is_grounded {
        match surface.tag {
            SurfaceTag::Boost => {
                apply_boost(cfg, state, cfg.boost_pad_power, cfg.boost_pad_duration);
            }
            SurfaceTag::Jump if state.speed >= cfg.jump_min_speed => {
                state.vertical_velocity = cfg.jump_velocity;
                state.velocity[1] = cfg.jump_velocity;
                state.is_grounded = false;
            }
            _ => {}
        }
    }

    state.lap_progress = surface.t;
    state.track_normal = surface.normal;
    state.track_tangent = surface.tangent;
}

fn settle_on_ground(cfg: &KartConfig, state: &mut KartState, surface: &SurfaceInfo, prev_y: f32, dt: f32) {
    let above = state.position[1] - surface.height;
    let rising = state.vertical_velocity > 0.0;

    if above <= cfg.snap_band && (!rising || above <= 0.0) {
        // slope-follow: carry the ground's vertical rate so crests can launch
        let follow = (surface.height - prev_y) / dt.max(1e-6);
        let follow = if state.is_grounded { follow } else { follow.max(0.0) };
        state.position[1] = surface.height;
        state.vertical_velocity = follow;
        state.is_grounded = true;
    } else if above > cfg.fall_band {
        state.is_grounded = false;
    } else {
        state.is_grounded = false;
        if !rising {
            let steep = (1.0 - surface.normal[1].abs()).clamp(0.0, 1.0);
            let rate = cfg.pull_rate + (cfg.steep_pull_rate - cfg.pull_rate) * steep;
            state.position[1] -= above * (rate * dt).min(1.0);
        }
    }
    state.velocity[1] = state.vertical_velocity;
}

fn collide_walls(cfg: &KartConfig, state: &mut KartState, surface: &SurfaceInfo) {
    let excess = surface.offset.abs() - surface.half_width;
    if excess <= 0.0 {
        return;
    }
    let outward = v_scale(surface.binormal, sign_or_zero(surface.offset));
    state.position = v_sub(state.position, v_scale(outward, excess));
    state.speed *= cfg.wall_speed_loss;

    // only the part heading into the wall is removed
    let into = v_dot(state.velocity, outward);
    if into > 0.0 {
        state.velocity = v_sub(state.velocity, v_scale(outward, into));
    }
}

// ----------------------------------------------------------------------
// Anti-gravity: motion expressed in (t, lateral) instead of world space
// ----------------------------------------------------------------------
fn step_anti_gravity<Q: SurfaceQuery + ?Sized>(
    cfg: &KartConfig,
    state: &mut KartState,
    input: &KartInput,
    dt: f32,
    track: &Q,
    surface: &SurfaceInfo,
) {
    let max = max_speed(cfg, state, Some(SurfaceTag::Antigravity));
    update_speed(cfg, state, input, max, dt);
    state.speed = state.speed.max(cfg.ag_min_speed);

    let length = surface.total_length.max(1e-3);
    let t = wrap_unit(surface.t + state.speed * dt / length);

    // no wall penalty here: binormal twist on loops makes lateral spikes
    let authority = (state.speed / cfg.steer_full_speed.max(1e-3)).clamp(0.0, 1.0);
    let lateral = surface.offset - input.steer * cfg.ag_lateral_rate * authority * dt;

    let Some(next) = track.surface_at_t(t, state.position) else {
        return;
    };
    let lateral = lateral.clamp(-next.half_width, next.half_width);

    state.position = v_add(next.center, v_scale(next.binormal, lateral));
    if let Some(h) = heading_of(next.tangent) {
        state.heading = h;
    }
    state.velocity = v_scale(next.tangent, state.speed);
    state.vertical_velocity = 0.0;
    state.is_grounded = true;
    state.steer_angle = input.steer;
    state.lap_progress = t;
    state.track_normal = next.normal;
    state.track_tangent = next.tangent;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kart_core::kart::{absolute_speed_cap, apply_hit};
    use crate::kart_core::test_support::{StraightRoad, Void};
    use crate::kart_core::track::SplineTrack;
    use crate::kart_core::types::v_len_xz;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::f32::consts::PI;

    const DT: f32 = 1.0 / 120.0;

    fn throttle() -> KartInput {
        KartInput { accel: 1.0, ..KartInput::IDLE }
    }

    #[test]
    fn transition_table() {
        assert_eq!(select_branch(Interruption::Spin, false), StepBranch::Spin);
        assert_eq!(select_branch(Interruption::Hit, false), StepBranch::HitStun);
        assert_eq!(select_branch(Interruption::None, false), StepBranch::Normal);
        assert_eq!(
            select_branch(Interruption::None, true),
            StepBranch::AntiGravity { inputs_zeroed: false }
        );
        assert_eq!(
            select_branch(Interruption::Spin, true),
            StepBranch::AntiGravity { inputs_zeroed: true }
        );
        assert_eq!(
            select_branch(Interruption::Hit, true),
            StepBranch::AntiGravity { inputs_zeroed: true }
        );
    }

    #[test]
    fn straight_line_acceleration_is_monotonic_and_capped() {
        let cfg = SimConfig::default();
        let road = StraightRoad::new(8.0);
        let mut s = KartState::new([0.0; 3], 0.0);
        let mut d = DriftState::default();

        let mut last = s.speed;
        for _ in 0..600 {
            advance(&cfg, &mut s, &mut d, &throttle(), DT, &road);
            assert!(s.speed >= last);
            assert!(s.speed <= cfg.kart.max_speed + 2.0 * cfg.kart.coast_decel * DT);
            last = s.speed;
        }
        assert!((s.speed - cfg.kart.max_speed).abs() < 1e-3);
        assert!(s.position[2] > 50.0);
        assert!(s.position[0].abs() < 1e-3);
        assert!(s.is_grounded);
    }

    #[test]
    fn lost_boost_bleeds_instead_of_clamping() {
        let cfg = SimConfig::default();
        let road = StraightRoad::new(8.0);
        let mut s = KartState::new([0.0; 3], 0.0);
        let mut d = DriftState::default();
        s.speed = cfg.kart.max_speed * 1.4;
        advance(&cfg, &mut s, &mut d, &throttle(), DT, &road);
        let expected = cfg.kart.max_speed * 1.4 - 2.0 * cfg.kart.coast_decel * DT;
        assert!((s.speed - expected).abs() < 1e-4);
    }

    #[test]
    fn brake_then_reverse() {
        let cfg = SimConfig::default();
        let road = StraightRoad::new(8.0);
        let mut s = KartState::new([0.0; 3], 0.0);
        let mut d = DriftState::default();
        s.speed = 5.0;
        let brake = KartInput { brake: 1.0, ..KartInput::IDLE };
        for _ in 0..600 {
            advance(&cfg, &mut s, &mut d, &brake, DT, &road);
        }
        assert_eq!(s.speed, -cfg.kart.reverse_max);
    }

    #[test]
    fn heading_stays_normalized_under_full_lock() {
        let cfg = SimConfig::default();
        let road = StraightRoad::new(1000.0);
        let mut s = KartState::new([0.0; 3], 3.0);
        let mut d = DriftState::default();
        let input = KartInput { accel: 1.0, steer: -5.0, ..KartInput::IDLE };
        for _ in 0..3000 {
            advance(&cfg, &mut s, &mut d, &input, DT, &road);
            assert!(s.heading > -PI && s.heading <= PI, "{}", s.heading);
        }
    }

    #[test]
    fn speed_bound_holds_for_random_inputs() {
        let cfg = SimConfig::default();
        let road = StraightRoad::new(10.0);
        let mut rng = StdRng::seed_from_u64(11);
        let mut s = KartState::new([0.0; 3], 0.0);
        let mut d = DriftState::default();
        let bound = absolute_speed_cap(&cfg.kart).max(cfg.kart.reverse_max);

        for i in 0..5000 {
            if i % 500 == 0 {
                s.star_timer = 2.0;
                apply_boost(&cfg.kart, &mut s, 1.0, 1.5);
            }
            let input = KartInput {
                accel: rng.gen_range(0.0..1.0),
                brake: if rng.gen_bool(0.2) { 1.0 } else { 0.0 },
                steer: rng.gen_range(-1.5..1.5),
                drift_held: rng.gen_bool(0.5),
                ..KartInput::IDLE
            };
            advance(&cfg, &mut s, &mut d, &input, DT, &road);
            assert!(s.speed.abs() <= bound + 1e-3, "step {i}: {}", s.speed);
        }
    }

    #[test]
    fn spin_freezes_translation_off_anti_gravity() {
        let cfg = SimConfig::default();
        let road = StraightRoad::new(8.0);
        let mut s = KartState::new([0.0; 3], 0.0);
        let mut d = DriftState::default();
        s.speed = 20.0;
        apply_hit(&cfg.kart, &mut s, 0.5);
        let start = s.position;
        let speed = s.speed;
        let branch = advance(&cfg, &mut s, &mut d, &throttle(), DT, &road);
        assert_eq!(branch, StepBranch::Spin);
        assert_eq!(s.position, start);
        assert!((s.speed - speed * cfg.kart.spin_decay).abs() < 1e-5);
        assert!(s.heading != 0.0);
    }

    #[test]
    fn hit_stun_follows_spin() {
        let cfg = SimConfig::default();
        let road = StraightRoad::new(8.0);
        let mut s = KartState::new([0.0; 3], 0.0);
        let mut d = DriftState::default();
        s.speed = 10.0;
        apply_hit(&cfg.kart, &mut s, 0.1);
        let mut branches = Vec::new();
        for _ in 0..120 {
            branches.push(advance(&cfg, &mut s, &mut d, &throttle(), DT, &road));
        }
        let first_hit = branches.iter().position(|b| *b == StepBranch::HitStun).unwrap();
        let first_normal = branches.iter().position(|b| *b == StepBranch::Normal).unwrap();
        assert!(branches[..first_hit].iter().all(|b| *b == StepBranch::Spin));
        assert!(first_hit < first_normal);
    }

    #[test]
    fn interruption_cancels_drift_without_boost() {
        let cfg = SimConfig::default();
        let road = StraightRoad::new(50.0);
        let mut s = KartState::new([0.0; 3], 0.0);
        let mut d = DriftState::default();
        s.speed = 25.0;
        let input = KartInput { accel: 1.0, steer: 1.0, drift_held: true, ..KartInput::IDLE };
        for _ in 0..200 {
            advance(&cfg, &mut s, &mut d, &input, DT, &road);
        }
        assert!(d.active);
        apply_hit(&cfg.kart, &mut s, 0.5);
        advance(&cfg, &mut s, &mut d, &input, DT, &road);
        assert!(!d.active);
        assert!(!s.is_boosting());
    }

    #[test]
    fn wall_push_keeps_outbound_motion() {
        let cfg = SimConfig::default();
        let road = StraightRoad::new(5.0);
        let mut s = KartState::new([4.99, 0.0, 0.0], 0.6); // angled toward +x wall
        let mut d = DriftState::default();
        s.speed = 20.0;
        s.velocity = v_scale(s.forward(), 20.0);
        let speed_before = s.speed;
        advance(&cfg, &mut s, &mut d, &throttle(), DT, &road);
        assert!(s.position[0] <= 5.0 + 1e-4);
        assert!(s.speed < speed_before);
        assert!(s.velocity[0] <= 1e-4, "into-wall component removed");
        assert!(s.velocity[2] > 0.0, "along-wall component kept");
    }

    #[test]
    fn void_means_free_fall() {
        let cfg = SimConfig::default();
        let mut s = KartState::new([0.0, 10.0, 0.0], 0.0);
        let mut d = DriftState::default();
        s.is_grounded = false;
        for _ in 0..60 {
            advance(&cfg, &mut s, &mut d, &KartInput::IDLE, DT, &Void);
        }
        assert!(s.position[1] < 10.0);
        assert!(s.vertical_velocity < 0.0);
        assert!(!s.is_grounded);
        assert_eq!(s.track_normal, WORLD_UP);
    }

    #[test]
    fn airborne_kart_lands_and_snaps() {
        let cfg = SimConfig::default();
        let road = StraightRoad::new(8.0);
        let mut s = KartState::new([0.0, 3.0, 0.0], 0.0);
        let mut d = DriftState::default();
        s.is_grounded = false;
        for _ in 0..240 {
            advance(&cfg, &mut s, &mut d, &KartInput::IDLE, DT, &road);
        }
        assert!(s.is_grounded);
        assert_eq!(s.position[1], 0.0);
    }

    #[test]
    fn boost_pad_refreshes_boost() {
        let cfg = SimConfig::default();
        let pad = StraightRoad::new(8.0).with_tag(SurfaceTag::Boost);
        let mut s = KartState::new([0.0; 3], 0.0);
        let mut d = DriftState::default();
        s.speed = 10.0;
        s.velocity = v_scale(s.forward(), 10.0);
        advance(&cfg, &mut s, &mut d, &throttle(), DT, &pad);
        assert!(s.is_grounded);
        assert_eq!(s.boost_timer, cfg.kart.boost_pad_duration);
        assert_eq!(s.boost_power, cfg.kart.boost_pad_power);
        assert!(s.speed >= cfg.kart.max_speed);

        // plain road afterwards only counts the timer down
        let road = StraightRoad::new(8.0);
        advance(&cfg, &mut s, &mut d, &throttle(), DT, &road);
        assert!(s.boost_timer < cfg.kart.boost_pad_duration);
    }

    #[test]
    fn jump_pad_launches_fast_kart() {
        let cfg = SimConfig::default();
        let road = StraightRoad::new(8.0).with_tag(SurfaceTag::Jump);
        let mut s = KartState::new([0.0; 3], 0.0);
        let mut d = DriftState::default();
        s.speed = 20.0;
        s.velocity = v_scale(s.forward(), 20.0);
        advance(&cfg, &mut s, &mut d, &throttle(), DT, &road);
        assert!(!s.is_grounded);
        let mut peak: f32 = 0.0;
        for _ in 0..30 {
            let road = StraightRoad::new(8.0);
            advance(&cfg, &mut s, &mut d, &throttle(), DT, &road);
            peak = peak.max(s.position[1]);
        }
        assert!(peak > 0.5, "peak {peak}");
    }

    // ------------------------------------------------------------------
    // anti-gravity on the demo loop
    // ------------------------------------------------------------------

    fn loop_start(track: &SplineTrack) -> (f32, f32) {
        let zone = track
            .zones()
            .iter()
            .find(|z| z.tag == SurfaceTag::Antigravity)
            .copied()
            .unwrap();
        (zone.start, zone.end)
    }

    fn kart_at(track: &SplineTrack, t: f32, speed: f32) -> KartState {
        use crate::kart_core::surface::SplineProvider;
        let p = track.point_at(t);
        let mut s = KartState::new(p.position, heading_of(p.tangent).unwrap());
        s.speed = speed;
        s.velocity = v_scale(p.tangent, speed);
        s.lap_progress = t;
        s
    }

    #[test]
    fn anti_gravity_keeps_kart_inside_the_loop() {
        let cfg = SimConfig::default();
        let track = SplineTrack::demo_circuit();
        let (start, _) = loop_start(&track);
        let mut s = kart_at(&track, start + 0.001, 20.0);
        let mut d = DriftState::default();
        let input = KartInput { accel: 1.0, steer: 1.0, ..KartInput::IDLE };

        let mut saw_ag = false;
        let mut max_height: f32 = 0.0;
        for _ in 0..600 {
            let branch = advance(&cfg, &mut s, &mut d, &input, DT, &track);
            if saw_ag && !s.on_anti_gravity {
                break;
            }
            if matches!(branch, StepBranch::AntiGravity { .. }) {
                saw_ag = true;
                let info = track.surface_at_t(s.lap_progress, s.position).unwrap();
                let lateral = v_dot(v_sub(s.position, info.center), info.binormal);
                assert!(lateral.abs() <= info.half_width + 1e-3);
                assert!(v_len_xz(v_sub(s.position, info.center)) <= info.half_width + 1e-3);
            }
            max_height = max_height.max(s.position[1]);
        }
        assert!(saw_ag);
        assert!(max_height > 15.0, "went over the top: {max_height}");
        assert!(!s.on_anti_gravity, "came out the other side");
    }

    #[test]
    fn spin_on_anti_gravity_still_advances() {
        let cfg = SimConfig::default();
        let track = SplineTrack::demo_circuit();
        let (start, _) = loop_start(&track);
        let mut s = kart_at(&track, start + 0.002, 20.0);
        let mut d = DriftState::default();
        advance(&cfg, &mut s, &mut d, &throttle(), DT, &track);
        assert!(s.on_anti_gravity);

        apply_hit(&cfg.kart, &mut s, 1.0);
        let t_before = s.lap_progress;
        let branch = advance(&cfg, &mut s, &mut d, &throttle(), DT, &track);
        assert_eq!(branch, StepBranch::AntiGravity { inputs_zeroed: true });
        assert!(s.lap_progress > t_before);
        assert!(s.speed >= cfg.kart.ag_min_speed);
    }

    #[test]
    fn leaving_anti_gravity_snaps_to_ground() {
        let cfg = SimConfig::default();
        let road = StraightRoad::new(8.0);
        let mut s = KartState::new([0.0, 0.7, 0.0], 0.0);
        let mut d = DriftState::default();
        s.on_anti_gravity = true;
        s.is_grounded = false;
        s.vertical_velocity = 3.0;
        advance(&cfg, &mut s, &mut d, &KartInput::IDLE, DT, &road);
        assert!(!s.on_anti_gravity);
        assert!(s.is_grounded);
        assert_eq!(s.position[1], 0.0);
        assert_eq!(s.vertical_velocity, 0.0);
    }
}
