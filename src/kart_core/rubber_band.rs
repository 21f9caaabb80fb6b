//! Rank-based speed cap for computer karts.
//!
//! Rank is normalized to `n` in [0, 1] (0 = leader, 1 = last). The cap is
//! `top * (1 + n * last_place_bonus - (1 - n) * first_place_penalty)`, where
//! `top` is the kart's own current top speed (boost/star/shrink included,
//! surface ignored). Over the cap the speed is multiplied by `decay` once per
//! call instead of being clamped.

use crate::kart_core::config::{KartConfig, RubberBandConfig};
use crate::kart_core::kart::{max_speed, KartState};

/// 1-based `rank` among `count` racers -> [0, 1].
pub fn normalized_rank(rank: usize, count: usize) -> f32 {
    if count <= 1 {
        return 0.0;
    }
    (rank.clamp(1, count) - 1) as f32 / (count - 1) as f32
}

pub fn speed_cap(cfg: &RubberBandConfig, kart_cfg: &KartConfig, state: &KartState, rank: usize, count: usize) -> f32 {
    let n = normalized_rank(rank, count);
    let factor = 1.0 + n * cfg.last_place_bonus - (1.0 - n) * cfg.first_place_penalty;
    max_speed(kart_cfg, state, None) * factor
}

/// Returns true when the kart was over its cap and got slowed.
pub fn apply(
    cfg: &RubberBandConfig,
    kart_cfg: &KartConfig,
    state: &mut KartState,
    rank: usize,
    count: usize,
) -> bool {
    if state.speed > speed_cap(cfg, kart_cfg, state, rank, count) {
        state.speed *= cfg.decay;
        true
    } else {
        false
    }
}
