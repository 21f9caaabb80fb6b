// ==============================================================================
// drift.rs — DRIFT CHARGE / MINI-TURBO STATE MACHINE
// ------------------------------------------------------------------------------
//   inactive --(held, speed >= min, |steer| >= min_steer)--> active
//   active   --(released, or speed < min/2)---------------> inactive + boost
//   active   --(cancel: hit / item)-----------------------> inactive, no boost
//
// While active:
//   charge += charge_rate * dt * |steer|
//   stage   = max(stage, stage_for(charge))   // never goes back down
//
// The boost granted on release is keyed by the highest stage reached.
// ==============================================================================

use serde::Serialize;

use crate::kart_core::config::{DriftConfig, KartConfig};
use crate::kart_core::kart::{apply_boost, KartState};
use crate::kart_core::types::sign_or_zero;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftStage {
    #[default]
    None,
    Blue,
    Orange,
    Pink,
}

impl DriftStage {
    pub fn from_charge(cfg: &DriftConfig, charge: f32) -> Self {
        let [s1, s2, s3] = cfg.stage_times;
        if charge >= s3 {
            DriftStage::Pink
        } else if charge >= s2 {
            DriftStage::Orange
        } else if charge >= s1 {
            DriftStage::Blue
        } else {
            DriftStage::None
        }
    }

    /// Index into `DriftConfig::boosts`, if this stage earns anything.
    fn boost_index(self) -> Option<usize> {
        match self {
            DriftStage::None => None,
            DriftStage::Blue => Some(0),
            DriftStage::Orange => Some(1),
            DriftStage::Pink => Some(2),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DriftState {
    pub stage: DriftStage,
    pub charge: f32,
    pub active: bool,
}

impl DriftState {
    /// Advance one step. Returns the stage that was cashed in when this step
    /// ended the drift.
    pub fn update(
        &mut self,
        cfg: &DriftConfig,
        kart_cfg: &KartConfig,
        state: &mut KartState,
        steer: f32,
        drift_held: bool,
        dt: f32,
    ) -> Option<DriftStage> {
        let steer = steer.clamp(-1.0, 1.0);

        if !self.active {
            if drift_held && state.speed >= cfg.min_speed && steer.abs() >= cfg.min_steer {
                self.active = true;
                self.charge = 0.0;
                self.stage = DriftStage::None;
                state.is_drifting = true;
                state.drift_direction = sign_or_zero(steer);
            }
            return None;
        }

        if !drift_held || state.speed < cfg.min_speed * 0.5 {
            return Some(self.release(cfg, kart_cfg, state));
        }

        self.charge += cfg.charge_rate * dt * steer.abs();
        self.stage = self.stage.max(DriftStage::from_charge(cfg, self.charge));
        None
    }

    fn release(&mut self, cfg: &DriftConfig, kart_cfg: &KartConfig, state: &mut KartState) -> DriftStage {
        let reached = self.stage;
        if let Some(tier) = reached.boost_index().map(|i| cfg.boosts[i]) {
            apply_boost(kart_cfg, state, tier.power, tier.duration);
            tracing::debug!(stage = ?reached, power = tier.power, "drift boost");
        }
        self.reset(state);
        reached
    }

    /// Abort the drift without a boost.
    pub fn cancel(&mut self, state: &mut KartState) {
        if self.active {
            tracing::debug!(stage = ?self.stage, "drift cancelled");
        }
        self.reset(state);
    }

    fn reset(&mut self, state: &mut KartState) {
        self.active = false;
        self.charge = 0.0;
        self.stage = DriftStage::None;
        state.is_drifting = false;
        state.drift_direction = 0.0;
    }
}
