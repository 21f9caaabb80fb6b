// ==============================================================================
// collision.rs — KART vs KART
// ------------------------------------------------------------------------------
// Circles on the XZ plane, radius = kart_radius.
//   overlap -> split the overlap evenly along the contact normal
//   closing -> impulse along the normal scaled by (1 + bounce)
// After the impulse, speed is the projection of velocity on the kart's own
// heading, never |velocity| (a side or rear tap must not launch a parked kart).
// Karts on anti-gravity are skipped: they are re-placed on the spline anyway.
// ==============================================================================

use crate::kart_core::config::CollisionConfig;
use crate::kart_core::kart::KartState;
use crate::kart_core::types::{v_add, v_dot, v_scale, v_sub, Vec3};

/// Resolves one pair. Returns true if they were touching.
pub fn resolve(cfg: &CollisionConfig, a: &mut KartState, b: &mut KartState) -> bool {
    if a.on_anti_gravity || b.on_anti_gravity {
        return false;
    }

    let dx = b.position[0] - a.position[0];
    let dz = b.position[2] - a.position[2];
    let dist = (dx * dx + dz * dz).sqrt();
    let min_dist = 2.0 * cfg.kart_radius;
    if dist >= min_dist {
        return false;
    }

    // stacked exactly: pick a fixed axis
    let normal: Vec3 = if dist > 1e-6 { [dx / dist, 0.0, dz / dist] } else { [1.0, 0.0, 0.0] };

    let push = (min_dist - dist) * 0.5;
    a.position = v_sub(a.position, v_scale(normal, push));
    b.position = v_add(b.position, v_scale(normal, push));

    // negative = moving toward each other
    let closing = v_dot(v_sub(b.velocity, a.velocity), normal);
    if closing < 0.0 {
        let j = -(1.0 + cfg.bounce) * closing * 0.5;
        a.velocity = v_sub(a.velocity, v_scale(normal, j));
        b.velocity = v_add(b.velocity, v_scale(normal, j));
        a.speed = v_dot(a.velocity, a.forward());
        b.speed = v_dot(b.velocity, b.forward());
    }
    true
}

/// Every unordered pair once, in slot order. Returns the number of contacts.
pub fn resolve_all(cfg: &CollisionConfig, karts: &mut [KartState]) -> usize {
    let mut contacts = 0;
    for j in 1..karts.len() {
        let (head, tail) = karts.split_at_mut(j);
        let b = &mut tail[0];
        for a in head.iter_mut() {
            if resolve(cfg, a, b) {
                contacts += 1;
            }
        }
    }
    contacts
}
