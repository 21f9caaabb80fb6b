// ==============================================================================
// items.rs — HELD ITEMS
// ------------------------------------------------------------------------------
// Instant items act on karts through the kart primitives only:
//   Mushroom  -> apply_boost
//   Star      -> star timer (hit immunity, offroad ignored, speed factor)
//   Lightning -> every other kart shrunk + apply_hit (stars are immune)
// Banana / shells are handed back to the caller as projectiles; their flight
// and contact belong to external behaviours that end in apply_hit.
// ==============================================================================

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::kart_core::config::{ItemConfig, KartConfig};
use crate::kart_core::kart::{apply_boost, apply_hit, KartState};
use crate::kart_core::rubber_band::normalized_rank;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Mushroom,
    Banana,
    GreenShell,
    RedShell,
    Star,
    Lightning,
}

// (kind, weight) per rank band: front / middle / back
const FRONT_TABLE: [(ItemKind, u32); 4] = [
    (ItemKind::Banana, 35),
    (ItemKind::GreenShell, 35),
    (ItemKind::Mushroom, 25),
    (ItemKind::RedShell, 5),
];
const MIDDLE_TABLE: [(ItemKind, u32); 5] = [
    (ItemKind::Mushroom, 30),
    (ItemKind::RedShell, 30),
    (ItemKind::GreenShell, 20),
    (ItemKind::Banana, 10),
    (ItemKind::Star, 10),
];
const BACK_TABLE: [(ItemKind, u32); 4] = [
    (ItemKind::Mushroom, 30),
    (ItemKind::RedShell, 25),
    (ItemKind::Star, 25),
    (ItemKind::Lightning, 20),
];

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Mushroom => "mushroom",
            ItemKind::Banana => "banana",
            ItemKind::GreenShell => "green_shell",
            ItemKind::RedShell => "red_shell",
            ItemKind::Star => "star",
            ItemKind::Lightning => "lightning",
        }
    }

    pub fn is_projectile(self) -> bool {
        matches!(self, ItemKind::Banana | ItemKind::GreenShell | ItemKind::RedShell)
    }

    /// Item-box draw. Trailing racers get the stronger tables.
    pub fn roll<R: Rng + ?Sized>(rng: &mut R, rank: usize, count: usize) -> ItemKind {
        let n = normalized_rank(rank, count);
        let table: &[(ItemKind, u32)] = if n < 0.34 {
            &FRONT_TABLE
        } else if n <= 0.67 {
            &MIDDLE_TABLE
        } else {
            &BACK_TABLE
        };

        let total: u32 = table.iter().map(|(_, w)| w).sum();
        let mut pick = rng.gen_range(0..total);
        for &(kind, weight) in table {
            if pick < weight {
                return kind;
            }
            pick -= weight;
        }
        table[table.len() - 1].0
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ItemEffect {
    Boosted,
    Starred,
    /// Lightning; number of karts actually hit (stars excluded).
    Struck { karts: usize },
    /// Banana / shell left for the projectile layer.
    Released(ItemKind),
}

/// Uses `kind` held by `karts[user]`.
pub fn use_item(
    cfg: &ItemConfig,
    kart_cfg: &KartConfig,
    kind: ItemKind,
    user: usize,
    karts: &mut [KartState],
) -> ItemEffect {
    match kind {
        ItemKind::Mushroom => {
            if let Some(state) = karts.get_mut(user) {
                apply_boost(kart_cfg, state, cfg.mushroom_power, cfg.mushroom_duration);
            }
            ItemEffect::Boosted
        }
        ItemKind::Star => {
            if let Some(state) = karts.get_mut(user) {
                state.star_timer = state.star_timer.max(cfg.star_duration);
            }
            ItemEffect::Starred
        }
        ItemKind::Lightning => {
            let mut struck = 0;
            for (i, other) in karts.iter_mut().enumerate() {
                if i == user || other.is_starred() {
                    continue;
                }
                other.shrink_timer = other.shrink_timer.max(cfg.lightning_shrink);
                if apply_hit(kart_cfg, other, cfg.lightning_spin) {
                    struck += 1;
                }
            }
            ItemEffect::Struck { karts: struck }
        }
        ItemKind::Banana | ItemKind::GreenShell | ItemKind::RedShell => ItemEffect::Released(kind),
    }
}
