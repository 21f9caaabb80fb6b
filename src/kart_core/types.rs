//! Core shared types for `kart_core` (engine-agnostic).
// kart_core/types.rs
use serde::{Deserialize, Serialize};
use std::f32::consts::{PI, TAU};
use std::fmt;

pub type Vec3 = [f32; 3];

pub const WORLD_UP: Vec3 = [0.0, 1.0, 0.0];

// ----- tiny vec helpers (value types only, nothing mutates in place) -----
#[inline] pub fn v_add(a: Vec3, b: Vec3) -> Vec3 { [a[0]+b[0], a[1]+b[1], a[2]+b[2]] }
#[inline] pub fn v_sub(a: Vec3, b: Vec3) -> Vec3 { [a[0]-b[0], a[1]-b[1], a[2]-b[2]] }
#[inline] pub fn v_scale(v: Vec3, s: f32) -> Vec3 { [v[0]*s, v[1]*s, v[2]*s] }
#[inline] pub fn v_dot(a: Vec3, b: Vec3) -> f32 { a[0]*b[0] + a[1]*b[1] + a[2]*b[2] }
#[inline] pub fn v_mag(v: Vec3) -> f32 { v_dot(v, v).sqrt() }
#[inline] pub fn v_lerp(a: Vec3, b: Vec3, t: f32) -> Vec3 { v_add(a, v_scale(v_sub(b, a), t)) }

/// Normalizes `v`, or returns `fallback` when `v` is degenerate.
#[inline]
pub fn v_norm_or(v: Vec3, fallback: Vec3) -> Vec3 {
    let m = v_mag(v);
    if m > 1e-6 { v_scale(v, 1.0 / m) } else { fallback }
}

#[inline]
pub fn v_cross(a: Vec3, b: Vec3) -> Vec3 {
    [
        a[1]*b[2] - a[2]*b[1],
        a[2]*b[0] - a[0]*b[2],
        a[0]*b[1] - a[1]*b[0],
    ]
}

/// Length of the XZ (ground plane) projection.
#[inline]
pub fn v_len_xz(v: Vec3) -> f32 { (v[0]*v[0] + v[2]*v[2]).sqrt() }

// ============================================
// Angles / parameters
// ============================================

/// Forward unit vector for a heading. Heading 0 faces +Z.
#[inline]
pub fn forward_from_heading(heading: f32) -> Vec3 {
    [heading.sin(), 0.0, heading.cos()]
}

/// Heading of a direction projected on the ground plane. `None` when the
/// direction is (nearly) vertical.
#[inline]
pub fn heading_of(dir: Vec3) -> Option<f32> {
    if v_len_xz(dir) < 1e-4 {
        return None;
    }
    Some(dir[0].atan2(dir[2]))
}

/// Wraps an angle into (−π, π].
pub fn normalize_angle(a: f32) -> f32 {
    if !a.is_finite() {
        return 0.0;
    }
    let mut r = a % TAU;
    if r <= -PI { r += TAU; }
    if r > PI { r -= TAU; }
    r
}

/// Wraps a spline parameter into [0, 1).
#[inline]
pub fn wrap_unit(t: f32) -> f32 {
    let r = t.rem_euclid(1.0);
    // rem_euclid can round up to exactly 1.0 for tiny negative inputs
    if r >= 1.0 { 0.0 } else { r }
}

/// Shortest signed difference `b - a` between two wrapped parameters,
/// in [−0.5, 0.5).
#[inline]
pub fn wrapped_delta(a: f32, b: f32) -> f32 {
    let d = (b - a).rem_euclid(1.0);
    if d >= 0.5 { d - 1.0 } else { d }
}

#[inline]
pub fn sign_or_zero(v: f32) -> f32 {
    if v > 0.0 { 1.0 } else if v < 0.0 { -1.0 } else { 0.0 }
}

// ============================================
// Surface description
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceTag {
    Road,
    Offroad,
    Boost,
    Jump,
    Antigravity,
}

impl SurfaceTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            SurfaceTag::Road => "road",
            SurfaceTag::Offroad => "offroad",
            SurfaceTag::Boost => "boost",
            SurfaceTag::Jump => "jump",
            SurfaceTag::Antigravity => "antigravity",
        }
    }
}

impl fmt::Display for SurfaceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One sample of the track spline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackPoint {
    pub position: Vec3, // road surface center
    pub normal: Vec3,   // unit, away from the road surface
    pub tangent: Vec3,  // unit, direction of travel
    pub binormal: Vec3, // unit, normal × tangent
    pub width: f32,     // full drivable width (m)
}

/// Result of a single surface query. Never cached beyond one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceInfo {
    pub height: f32,       // ground height under the query point
    pub normal: Vec3,
    pub tangent: Vec3,
    pub binormal: Vec3,
    pub center: Vec3,      // spline center at `t`
    pub offset: f32,       // signed lateral offset of the query point along `binormal`
    pub half_width: f32,   // wall distance from the center
    pub tag: SurfaceTag,
    pub t: f32,            // [0, 1)
    pub total_length: f32, // m
}

// ============================================
// Control input
// ============================================

/// Per-step driver input. Humans fill this from the input reader; AI karts
/// get it from `ai::AiDriver::update`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KartInput {
    pub accel: f32,       // 0..1
    pub brake: f32,       // 0..1
    pub steer: f32,       // -1..1, positive turns toward -binormal (heading decreases)
    pub drift_held: bool,
    pub use_item: bool,
    pub look_back: bool,  // camera only
    pub pause: bool,      // orchestrator only
}

impl KartInput {
    pub const IDLE: KartInput = KartInput {
        accel: 0.0,
        brake: 0.0,
        steer: 0.0,
        drift_held: false,
        use_item: false,
        look_back: false,
        pause: false,
    };

    /// Copy with every analog axis clamped to its documented range.
    pub fn clamped(&self) -> Self {
        Self {
            accel: finite_or_zero(self.accel).clamp(0.0, 1.0),
            brake: finite_or_zero(self.brake).clamp(0.0, 1.0),
            steer: finite_or_zero(self.steer).clamp(-1.0, 1.0),
            ..*self
        }
    }
}

#[inline]
fn finite_or_zero(v: f32) -> f32 {
    if v.is_finite() { v } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_angle_stays_in_half_open_range() {
        for i in -40..=40 {
            let a = normalize_angle(i as f32 * 0.7);
            assert!(a > -PI - 1e-6 && a <= PI + 1e-6, "{a}");
        }
        assert!((normalize_angle(-PI) - PI).abs() < 1e-5);
        assert_eq!(normalize_angle(f32::NAN), 0.0);
    }

    #[test]
    fn wrapped_delta_takes_short_way_round() {
        assert!((wrapped_delta(0.95, 0.05) - 0.1).abs() < 1e-5);
        assert!((wrapped_delta(0.05, 0.95) + 0.1).abs() < 1e-5);
        assert!(wrapped_delta(0.3, 0.3).abs() < 1e-6);
    }

    #[test]
    fn heading_round_trips_through_forward() {
        let h = 1.1;
        let f = forward_from_heading(h);
        assert!((heading_of(f).unwrap() - h).abs() < 1e-5);
        assert!(heading_of([0.0, 1.0, 0.0]).is_none());
    }

    #[test]
    fn input_clamp_degrades_gracefully() {
        let input = KartInput { accel: 3.0, brake: -1.0, steer: 5.0, ..KartInput::IDLE };
        let c = input.clamped();
        assert_eq!((c.accel, c.brake, c.steer), (1.0, 0.0, 1.0));
    }

    #[test]
    fn cross_of_up_and_forward_is_binormal() {
        assert_eq!(v_cross(WORLD_UP, [0.0, 0.0, 1.0]), [1.0, 0.0, 0.0]);
    }
}
