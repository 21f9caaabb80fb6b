//! kart_core - engine-agnostic kart movement (pure types + integrator)

pub mod types;
pub mod config;
pub mod clock;
pub mod surface;
pub mod track;
pub mod kart;
pub mod drift;
pub mod integrator;
pub mod collision;
pub mod rubber_band;
pub mod items;
pub mod ai;

#[cfg(test)]
pub(crate) mod test_support;

pub use types::*;
pub use config::{ConfigError, SimConfig};
pub use clock::FixedStepClock;
pub use surface::{SplineProvider, SurfaceQuery};
pub use track::{SplineTrack, TrackDef, TrackError};
pub use kart::{apply_boost, apply_hit, KartState};
pub use drift::{DriftStage, DriftState};
pub use integrator::{advance, StepBranch};
pub use ai::{AiDriver, CpuDifficulty};
pub use items::ItemKind;
