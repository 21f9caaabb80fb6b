//! Kart racing simulation: fixed-step kart physics on a spline corridor,
//! drift boosts, kart collisions, rubber-banding and computer drivers, plus
//! the race bookkeeping the headless server runs on top.

pub mod kart_core;
pub mod race;
pub mod spawn;
