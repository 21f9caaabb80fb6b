// Minimal surfaces for unit tests.

use crate::kart_core::surface::SurfaceQuery;
use crate::kart_core::types::{wrap_unit, SurfaceInfo, SurfaceTag, Vec3, WORLD_UP};

/// Flat road along +Z centered on x = 0. Walls at ±half_width.
pub(crate) struct StraightRoad {
    pub half_width: f32,
    pub length: f32,
    pub tag: SurfaceTag,
}

impl StraightRoad {
    pub fn new(half_width: f32) -> Self {
        Self { half_width, length: 1000.0, tag: SurfaceTag::Road }
    }

    pub fn with_tag(mut self, tag: SurfaceTag) -> Self {
        self.tag = tag;
        self
    }

    fn info(&self, t: f32, z: f32, pos: Vec3) -> SurfaceInfo {
        SurfaceInfo {
            height: 0.0,
            normal: WORLD_UP,
            tangent: [0.0, 0.0, 1.0],
            binormal: [1.0, 0.0, 0.0],
            center: [0.0, 0.0, z],
            offset: pos[0],
            half_width: self.half_width,
            tag: self.tag,
            t,
            total_length: self.length,
        }
    }
}

impl SurfaceQuery for StraightRoad {
    fn surface_at(&self, pos: Vec3) -> Option<SurfaceInfo> {
        if pos[0].abs() > self.half_width + 10.0 {
            return None;
        }
        Some(self.info(wrap_unit(pos[2] / self.length), pos[2], pos))
    }

    fn surface_at_t(&self, t: f32, pos: Vec3) -> Option<SurfaceInfo> {
        let t = wrap_unit(t);
        Some(self.info(t, t * self.length, pos))
    }

    fn spline_length(&self) -> f32 {
        self.length
    }
}

/// No ground anywhere.
pub(crate) struct Void;

impl SurfaceQuery for Void {
    fn surface_at(&self, _pos: Vec3) -> Option<SurfaceInfo> {
        None
    }

    fn surface_at_t(&self, _t: f32, _pos: Vec3) -> Option<SurfaceInfo> {
        None
    }

    fn spline_length(&self) -> f32 {
        1.0
    }
}
