// ==============================================================================
// track.rs — SAMPLED CATMULL-ROM TRACK (SplineProvider + SurfaceQuery)
// ------------------------------------------------------------------------------
// Builds a closed loop through authored control points and answers surface
// queries against it:
//
// - samples: uniform Catmull-Rom, `samples_per_segment` per control segment
// - t: normalized arc length in [0, 1)
// - frame per sample:
//       binormal = normalize(up_hint × tangent)
//       normal   = tangent × binormal
//   `up_hint` defaults to world up; loops and banked turns author their own.
// - corridor: road half width = width/2, walls at width/2 + shoulder;
//   anything past the walls + corridor_margin (or too far under the road)
//   is "off the known track" and yields None.
// - zones: [start, end) ranges of t that override the surface tag.
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::path::Path;
use thiserror::Error;

use crate::kart_core::surface::{SplineProvider, SurfaceQuery};
use crate::kart_core::types::{
    v_add, v_cross, v_dot, v_lerp, v_mag, v_norm_or, v_scale, v_sub, wrap_unit, SurfaceInfo,
    SurfaceTag, TrackPoint, Vec3, WORLD_UP,
};

#[derive(Debug, Error)]
pub enum TrackError {
    #[error("failed to read track: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse track: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("a closed track needs at least 3 control points, got {0}")]
    TooFewPoints(usize),

    #[error("zone [{start}, {end}) is outside [0, 1]")]
    InvalidZone { start: f32, end: f32 },
}

fn default_width() -> f32 { 12.0 }
fn default_samples() -> usize { 16 }
fn default_shoulder() -> f32 { 2.0 }
fn default_margin() -> f32 { 6.0 }
fn default_depth() -> f32 { 6.0 }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlPoint {
    pub position: Vec3,
    #[serde(default = "default_width")]
    pub width: f32,
    #[serde(default)]
    pub up: Option<Vec3>,
}

impl ControlPoint {
    pub fn flat(position: Vec3, width: f32) -> Self {
        Self { position, width, up: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceZone {
    pub start: f32,
    pub end: f32, // may be < start to wrap through t = 0
    pub tag: SurfaceTag,
}

impl SurfaceZone {
    pub fn contains(&self, t: f32) -> bool {
        if self.start <= self.end {
            t >= self.start && t < self.end
        } else {
            t >= self.start || t < self.end
        }
    }
}

/// On-disk track description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackDef {
    pub points: Vec<ControlPoint>,
    #[serde(default)]
    pub zones: Vec<SurfaceZone>,
    #[serde(default = "default_samples")]
    pub samples_per_segment: usize,
    #[serde(default = "default_shoulder")]
    pub shoulder: f32,
    #[serde(default = "default_margin")]
    pub corridor_margin: f32,
    #[serde(default = "default_depth")]
    pub corridor_depth: f32,
}

impl TrackDef {
    pub fn new(points: Vec<ControlPoint>) -> Self {
        Self {
            points,
            zones: Vec::new(),
            samples_per_segment: default_samples(),
            shoulder: default_shoulder(),
            corridor_margin: default_margin(),
            corridor_depth: default_depth(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SplineTrack {
    samples: Vec<TrackPoint>,
    cumulative: Vec<f32>, // samples.len() + 1 entries, last = total length
    total_length: f32,
    samples_per_segment: usize,
    zones: Vec<SurfaceZone>,
    shoulder: f32,
    corridor_margin: f32,
    corridor_depth: f32,
}

// ----------------------------------------------------------------------
// Catmull-Rom (uniform)
// ----------------------------------------------------------------------
fn catmull_rom(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3, u: f32) -> (Vec3, Vec3) {
    let u2 = u * u;
    let u3 = u2 * u;
    let mut pos = [0.0; 3];
    let mut der = [0.0; 3];
    for i in 0..3 {
        let a = 2.0 * p1[i];
        let b = -p0[i] + p2[i];
        let c = 2.0 * p0[i] - 5.0 * p1[i] + 4.0 * p2[i] - p3[i];
        let d = -p0[i] + 3.0 * p1[i] - 3.0 * p2[i] + p3[i];
        pos[i] = 0.5 * (a + b * u + c * u2 + d * u3);
        der[i] = 0.5 * (b + 2.0 * c * u + 3.0 * d * u2);
    }
    (pos, der)
}

/// Tangent/binormal/normal from a travel direction and an up hint.
fn frame(tangent: Vec3, up_hint: Vec3, prev_binormal: Vec3) -> (Vec3, Vec3, Vec3) {
    let t = v_norm_or(tangent, [0.0, 0.0, 1.0]);
    let b = v_norm_or(v_cross(up_hint, t), prev_binormal);
    let n = v_norm_or(v_cross(t, b), up_hint);
    (t, b, n)
}

impl SplineTrack {
    pub fn from_def(def: &TrackDef) -> Result<Self, TrackError> {
        let n = def.points.len();
        if n < 3 {
            return Err(TrackError::TooFewPoints(n));
        }
        for z in &def.zones {
            if !(0.0..=1.0).contains(&z.start) || !(0.0..=1.0).contains(&z.end) {
                return Err(TrackError::InvalidZone { start: z.start, end: z.end });
            }
        }

        let sps = def.samples_per_segment.max(1);
        let pts = &def.points;
        let mut samples = Vec::with_capacity(n * sps);
        let mut prev_binormal = [1.0, 0.0, 0.0];

        for i in 0..n {
            let p0 = pts[(i + n - 1) % n].position;
            let p1 = &pts[i];
            let p2 = &pts[(i + 1) % n];
            let p3 = pts[(i + 2) % n].position;
            let up1 = v_norm_or(p1.up.unwrap_or(WORLD_UP), WORLD_UP);
            let up2 = v_norm_or(p2.up.unwrap_or(WORLD_UP), WORLD_UP);

            for k in 0..sps {
                let u = k as f32 / sps as f32;
                let (position, derivative) = catmull_rom(p0, p1.position, p2.position, p3, u);
                let up_hint = v_norm_or(v_lerp(up1, up2, u), up1);
                let (tangent, binormal, normal) = frame(derivative, up_hint, prev_binormal);
                prev_binormal = binormal;
                samples.push(TrackPoint {
                    position,
                    normal,
                    tangent,
                    binormal,
                    width: p1.width + (p2.width - p1.width) * u,
                });
            }
        }

        let mut cumulative = Vec::with_capacity(samples.len() + 1);
        let mut acc = 0.0;
        cumulative.push(0.0);
        for j in 0..samples.len() {
            let next = samples[(j + 1) % samples.len()].position;
            acc += v_mag(v_sub(next, samples[j].position));
            cumulative.push(acc);
        }

        Ok(Self {
            samples,
            cumulative,
            total_length: acc.max(1e-3),
            samples_per_segment: sps,
            zones: def.zones.clone(),
            shoulder: def.shoulder.max(0.0),
            corridor_margin: def.corridor_margin.max(0.0),
            corridor_depth: def.corridor_depth.max(0.0),
        })
    }

    pub fn from_json_str(txt: &str) -> Result<Self, TrackError> {
        let def: TrackDef = serde_json::from_str(txt)?;
        Self::from_def(&def)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, TrackError> {
        let txt = std::fs::read_to_string(path)?;
        Self::from_json_str(&txt)
    }

    /// Parameter of the `i`-th authored control point.
    pub fn control_point_t(&self, i: usize) -> f32 {
        let j = (i * self.samples_per_segment) % self.samples.len();
        self.cumulative[j] / self.total_length
    }

    pub fn with_zone(mut self, start: f32, end: f32, tag: SurfaceTag) -> Self {
        self.zones.push(SurfaceZone { start: wrap_unit(start), end: wrap_unit(end), tag });
        self
    }

    pub fn zones(&self) -> &[SurfaceZone] {
        &self.zones
    }

    fn zone_tag(&self, t: f32) -> Option<SurfaceTag> {
        // later zones win
        self.zones.iter().rev().find(|z| z.contains(t)).map(|z| z.tag)
    }

    fn segment_at(&self, s: f32) -> usize {
        let j = self.cumulative.partition_point(|&c| c <= s);
        j.saturating_sub(1).min(self.samples.len() - 1)
    }

    // ------------------------------------------------------------------
    // Built-in layouts
    // ------------------------------------------------------------------

    /// Flat stadium oval. Starts at (radius, 0, -straight/2) heading +Z;
    /// binormal points away from the infield on the first straight.
    pub fn oval(straight: f32, radius: f32, width: f32) -> Self {
        let def = TrackDef::new(oval_points(straight, radius, width, None));
        // four or more points, no zones: cannot fail
        match Self::from_def(&def) {
            Ok(track) => track,
            Err(e) => unreachable!("built-in oval rejected: {e}"),
        }
    }

    /// Oval with a boost pad and a jump on the first straight and a vertical
    /// loop (anti-gravity) on the back straight.
    pub fn demo_circuit() -> Self {
        let straight = 120.0;
        let radius = 40.0;
        let width = 14.0;
        let loop_radius = 10.0;

        let mut points = oval_points(straight, radius, width, Some(loop_radius));
        let loop_range = loop_control_range(&mut points);

        let def = TrackDef::new(points);
        let track = match Self::from_def(&def) {
            Ok(track) => track,
            Err(e) => unreachable!("built-in demo circuit rejected: {e}"),
        };

        let ag_start = track.control_point_t(loop_range.0);
        let ag_end = track.control_point_t(loop_range.1);
        let straight_t = track.control_point_t(1);

        track
            .with_zone(straight_t, straight_t + 0.01, SurfaceTag::Boost)
            .with_zone(straight_t + 0.04, straight_t + 0.045, SurfaceTag::Jump)
            .with_zone(ag_start, ag_end, SurfaceTag::Antigravity)
    }
}

/// Stadium control points. With `loop_radius`, the back straight gets a
/// vertical loop whose exit is shifted sideways so the corridor does not
/// overlap itself.
fn oval_points(straight: f32, radius: f32, width: f32, loop_radius: Option<f32>) -> Vec<ControlPoint> {
    let half = straight * 0.5;
    let mut pts = Vec::new();

    // first straight, +Z
    for k in 0..3 {
        let z = -half + straight * k as f32 / 3.0;
        pts.push(ControlPoint::flat([radius, 0.0, z], width));
    }
    // far turn around (0, 0, +half)
    for k in 0..4 {
        let a = PI * k as f32 / 4.0;
        pts.push(ControlPoint::flat([radius * a.cos(), 0.0, half + radius * a.sin()], width));
    }
    // back straight, -Z
    match loop_radius {
        None => {
            for k in 0..3 {
                let z = half - straight * k as f32 / 3.0;
                pts.push(ControlPoint::flat([-radius, 0.0, z], width));
            }
        }
        Some(r) => {
            pts.push(ControlPoint::flat([-radius, 0.0, half], width));
            pts.push(ControlPoint::flat([-radius, 0.0, half * 0.4], width));
            let zc = 0.0;
            let shift = width * 1.2;
            for k in 0..=8 {
                let phi = PI * k as f32 / 4.0;
                let x = -radius - shift * k as f32 / 8.0;
                let pos = [x, r - r * phi.cos(), zc - r * phi.sin()];
                let center = [x, r, zc];
                let up = v_norm_or(v_sub(center, pos), WORLD_UP);
                pts.push(ControlPoint { position: pos, width, up: Some(up) });
            }
            pts.push(ControlPoint::flat([-radius - shift * 0.5, 0.0, -half * 0.5], width));
        }
    }
    // near turn around (0, 0, -half)
    for k in 0..4 {
        let a = PI + PI * k as f32 / 4.0;
        pts.push(ControlPoint::flat([radius * a.cos(), 0.0, -half + radius * a.sin()], width));
    }
    pts
}

/// Index range (entry, exit) of the loop control points inside `oval_points`.
fn loop_control_range(pts: &mut [ControlPoint]) -> (usize, usize) {
    // 3 straight + 4 turn + 2 approach points precede the loop; the loop
    // spans 9 points and the anti-gravity zone covers entry..=exit
    let entry = 3 + 4 + 2;
    let exit = entry + 8;
    // flat entry/exit points keep world up so the normal branch hands over
    // cleanly
    pts[entry].up = None;
    pts[exit].up = None;
    (entry, exit)
}

impl SplineProvider for SplineTrack {
    fn point_at(&self, t: f32) -> TrackPoint {
        let s = wrap_unit(t) * self.total_length;
        let j = self.segment_at(s);
        let seg = (self.cumulative[j + 1] - self.cumulative[j]).max(1e-6);
        let f = ((s - self.cumulative[j]) / seg).clamp(0.0, 1.0);
        let a = &self.samples[j];
        let b = &self.samples[(j + 1) % self.samples.len()];

        let tangent = v_norm_or(v_lerp(a.tangent, b.tangent, f), a.tangent);
        let normal_guess = v_norm_or(v_lerp(a.normal, b.normal, f), a.normal);
        let binormal = v_norm_or(v_cross(normal_guess, tangent), a.binormal);
        let normal = v_norm_or(v_cross(tangent, binormal), normal_guess);

        TrackPoint {
            position: v_lerp(a.position, b.position, f),
            normal,
            tangent,
            binormal,
            width: a.width + (b.width - a.width) * f,
        }
    }

    fn closest_t(&self, pos: Vec3) -> f32 {
        let n = self.samples.len();
        let mut best_d2 = f32::INFINITY;
        let mut best_s = 0.0;

        for j in 0..n {
            let a = self.samples[j].position;
            let b = self.samples[(j + 1) % n].position;
            let ab = v_sub(b, a);
            let len2 = v_dot(ab, ab);
            let f = if len2 > 1e-9 {
                (v_dot(v_sub(pos, a), ab) / len2).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let p = v_add(a, v_scale(ab, f));
            let d = v_sub(pos, p);
            let d2 = v_dot(d, d);
            if d2 < best_d2 {
                best_d2 = d2;
                best_s = self.cumulative[j] + f * (self.cumulative[j + 1] - self.cumulative[j]);
            }
        }

        wrap_unit(best_s / self.total_length)
    }

    fn sample_count(&self) -> usize {
        self.samples.len()
    }

    fn total_length(&self) -> f32 {
        self.total_length
    }
}

impl SurfaceQuery for SplineTrack {
    fn surface_at(&self, pos: Vec3) -> Option<SurfaceInfo> {
        let t = self.closest_t(pos);
        let info = self.surface_at_t(t, pos)?;

        if info.offset.abs() > info.half_width + self.corridor_margin {
            return None;
        }
        let under = pos[1] - info.height;
        if under < -self.corridor_depth {
            return None;
        }
        Some(info)
    }

    fn surface_at_t(&self, t: f32, pos: Vec3) -> Option<SurfaceInfo> {
        let t = wrap_unit(t);
        let p = self.point_at(t);
        let offset = v_dot(v_sub(pos, p.position), p.binormal);
        let road_half = p.width * 0.5;

        let tag = match self.zone_tag(t) {
            Some(tag) => tag,
            None if offset.abs() > road_half => SurfaceTag::Offroad,
            None => SurfaceTag::Road,
        };

        Some(SurfaceInfo {
            height: p.position[1] + p.binormal[1] * offset,
            normal: p.normal,
            tangent: p.tangent,
            binormal: p.binormal,
            center: p.position,
            offset,
            half_width: road_half + self.shoulder,
            tag,
            t,
            total_length: self.total_length,
        })
    }

    fn spline_length(&self) -> f32 {
        self.total_length
    }
}
