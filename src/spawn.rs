use serde::Serialize;

use crate::kart_core::kart::KartState;
use crate::kart_core::surface::SplineProvider;
use crate::kart_core::types::{heading_of, v_add, v_scale, wrap_unit, Vec3};

// ---------------------------------------------
// SPAWN RESULT RETURNED TO RACE + NET
// ---------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GridSlot {
    pub index: usize,
    pub position: Vec3,
    pub heading: f32,
    pub t: f32, // spline parameter of the slot (just below 1.0)
}

impl GridSlot {
    pub fn kart_state(&self) -> KartState {
        let mut state = KartState::new(self.position, self.heading);
        state.lap_progress = self.t;
        state
    }
}

// ---------------------------------------------
// STAGGERED TWO-WIDE GRID BEHIND THE START LINE
// ---------------------------------------------
//   row 0:  [0]         <- front_gap behind t = 0
//               [1]     <- + stagger
//   row 1:  [2]         <- + row_spacing
//               [3]
#[derive(Debug, Clone)]
pub struct GridAllocator {
    pub front_gap: f32,   // m behind the line for the pole slot
    pub row_spacing: f32, // m between rows
    pub stagger: f32,     // m the right column sits behind the left
    pub lane_offset: f32, // m from centerline per column
    next: usize,
}

impl Default for GridAllocator {
    fn default() -> Self {
        Self {
            front_gap: 4.0,
            row_spacing: 8.0,
            stagger: 3.0,
            lane_offset: 2.5,
            next: 0,
        }
    }
}

impl GridAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of slots handed out so far.
    pub fn allocated(&self) -> usize {
        self.next
    }

    /// Slot `index` without consuming it.
    pub fn slot<T: SplineProvider + ?Sized>(&self, track: &T, index: usize) -> GridSlot {
        let row = index / 2;
        let column = index % 2;

        let back = self.front_gap + row as f32 * self.row_spacing + column as f32 * self.stagger;
        let t = wrap_unit(-back / track.total_length().max(1e-3));
        let side = if column == 0 { -1.0 } else { 1.0 };

        let p = track.point_at(t);
        GridSlot {
            index,
            position: v_add(p.position, v_scale(p.binormal, side * self.lane_offset)),
            heading: heading_of(p.tangent).unwrap_or(0.0),
            t,
        }
    }

    pub fn allocate<T: SplineProvider + ?Sized>(&mut self, track: &T) -> GridSlot {
        let slot = self.slot(track, self.next);
        self.next += 1;
        slot
    }
}
