//! Track query contract consumed by the simulation.
//!
//! The simulation never owns track geometry. It asks a `SurfaceQuery` either
//! "what is under this world position" (closest-point search) or "what is
//! at spline parameter t" (no search). The two are kept apart because the
//! closest-point search can jump to the far side of a vertical loop; anything
//! driving on anti-gravity sections must use the parametric lookup.

use crate::kart_core::types::{SurfaceInfo, TrackPoint, Vec3};

/// Raw spline access.
pub trait SplineProvider {
    /// Frame and width at normalized arc-length parameter `t` (wrapped).
    fn point_at(&self, t: f32) -> TrackPoint;

    /// Parameter of the spline point closest to `pos`.
    fn closest_t(&self, pos: Vec3) -> f32;

    fn sample_count(&self) -> usize;

    /// Full loop length in meters.
    fn total_length(&self) -> f32;
}

/// Surface lookup used by the integrator and the AI.
pub trait SurfaceQuery {
    /// Closest-point lookup. `None` means `pos` is outside the known corridor
    /// (no ground, no walls).
    fn surface_at(&self, pos: Vec3) -> Option<SurfaceInfo>;

    /// Parametric lookup at `t`; `pos` only feeds the lateral offset.
    fn surface_at_t(&self, t: f32, pos: Vec3) -> Option<SurfaceInfo>;

    fn spline_length(&self) -> f32;
}
