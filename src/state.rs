use nalgebra::{UnitQuaternion, Vector3};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use kart_sim::kart_core::ai::CpuDifficulty;
use kart_sim::kart_core::clock::FixedStepClock;
use kart_sim::kart_core::config::{ConfigError, SimConfig};
use kart_sim::kart_core::drift::DriftStage;
use kart_sim::kart_core::kart::KartState;
use kart_sim::kart_core::track::SplineTrack;
use kart_sim::kart_core::types::{v_dot, v_scale, v_sub, KartInput, Vec3};
use kart_sim::race::{Race, RaceEvent};
use kart_sim::spawn::GridAllocator;

#[derive(Serialize)]
pub struct KartSnapshot {
    pub slot: usize,
    pub player_id: Option<String>,
    pub position: Vec3,
    pub prev_position: Vec3,
    pub render_position: Vec3, // blended by the clock's alpha
    pub heading: f32,
    pub speed: f32,
    pub drift_stage: DriftStage,
    pub boosting: bool,
    pub rank: usize,
    pub lap: u32,
    pub rotation: [f32; 4], // x, y, z, w
}

#[derive(Serialize)]
pub struct Snapshot<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub tick: u64,
    pub alpha: f32,
    pub karts: Vec<KartSnapshot>,
    pub events: &'a [RaceEvent],
}

/// Render orientation: +Z toward travel, +Y along the cached track normal.
pub fn kart_rotation(state: &KartState) -> UnitQuaternion<f32> {
    let up = state.track_normal;
    let travel = if state.on_anti_gravity { state.track_tangent } else { state.forward() };
    // drop the part of travel along the normal
    let dir = v_sub(travel, v_scale(up, v_dot(travel, up)));

    let dir = Vector3::new(dir[0], dir[1], dir[2]);
    let up = Vector3::new(up[0], up[1], up[2]);
    if dir.norm() < 1e-4 || up.norm() < 1e-4 {
        return UnitQuaternion::from_axis_angle(&Vector3::y_axis(), state.heading);
    }
    UnitQuaternion::face_towards(&dir, &up)
}

pub struct SharedGameState {
    pub race: Race,
    pub track: SplineTrack,
    pub clock: FixedStepClock,
    pub grid: GridAllocator,
    pub clients: HashMap<Uuid, UnboundedSender<String>>,
    pub players: HashMap<Uuid, usize>, // player -> kart slot
}

impl SharedGameState {
    pub fn new(config: SimConfig, track: SplineTrack, ai_count: usize, laps: u32) -> Result<Self, ConfigError> {
        let clock = FixedStepClock::new(&config.clock);
        let boxes = [0.25, 0.5, 0.75];
        let mut race = Race::new(config, laps)?.with_item_boxes(boxes);
        let mut grid = GridAllocator::new();

        let difficulties = [CpuDifficulty::Easy, CpuDifficulty::Medium, CpuDifficulty::Hard];
        for i in 0..ai_count {
            let slot = grid.allocate(&track);
            race.add_ai(&slot, difficulties[i % difficulties.len()]);
        }

        Ok(Self {
            race,
            track,
            clock,
            grid,
            clients: HashMap::new(),
            players: HashMap::new(),
        })
    }

    pub fn register_client(&mut self, id: Uuid, tx: UnboundedSender<String>) {
        self.clients.insert(id, tx);
    }

    /// New human kart on the next grid slot.
    pub fn join(&mut self, id: Uuid) -> usize {
        let grid_slot = self.grid.allocate(&self.track);
        let slot = self.race.add_human(&grid_slot);
        self.players.insert(id, slot);
        slot
    }

    pub fn update_input(&mut self, id: &Uuid, input: KartInput) {
        if let Some(&slot) = self.players.get(id) {
            self.race.set_input(slot, input);
        }
    }

    /// The kart stays in the race under computer control.
    pub fn disconnect(&mut self, id: &Uuid) {
        self.clients.remove(id);
        if let Some(slot) = self.players.remove(id) {
            self.race.hand_to_ai(slot, CpuDifficulty::Medium);
        }
    }

    /// Runs whatever fixed steps `now_ms` allows, then broadcasts.
    pub fn frame(&mut self, now_ms: f64) {
        let mut events = Vec::new();
        let Self { race, track, clock, .. } = self;
        clock.tick(now_ms, |dt| events.extend(race.step(dt, &*track)));

        for event in &events {
            if let RaceEvent::Finished { slot, place } = event {
                tracing::info!(slot, place, "🏁 kart finished");
            }
        }
        self.broadcast_snapshot(&events);
    }

    /// Build and send a snapshot of all karts to all clients.
    pub fn broadcast_snapshot(&mut self, events: &[RaceEvent]) {
        let owners: HashMap<usize, String> =
            self.players.iter().map(|(id, slot)| (*slot, id.to_string())).collect();

        let alpha = self.clock.alpha();
        let karts = self
            .race
            .karts
            .iter()
            .enumerate()
            .map(|(slot, kart)| KartSnapshot {
                slot,
                player_id: owners.get(&slot).cloned(),
                position: kart.position,
                prev_position: kart.prev_position,
                render_position: kart.interpolated_position(alpha),
                heading: kart.heading,
                speed: kart.speed,
                drift_stage: self.race.drifts[slot].stage,
                boosting: kart.is_boosting(),
                rank: self.race.rank(slot).unwrap_or(slot + 1),
                lap: self.race.laps[slot].completed,
                rotation: {
                    let q = kart_rotation(kart).into_inner();
                    [q.i, q.j, q.k, q.w]
                },
            })
            .collect();

        let snapshot = Snapshot {
            kind: "snapshot",
            tick: self.race.tick,
            alpha,
            karts,
            events,
        };

        let json = match serde_json::to_string(&snapshot) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("snapshot encode failed: {e}");
                return;
            }
        };

        // closed channels belong to clients that already left
        self.clients.retain(|_, tx| tx.send(json.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn seeded() -> SimConfig {
        SimConfig { seed: Some(5), ..SimConfig::default() }
    }

    #[test]
    fn flat_rotation_matches_heading() {
        let kart = KartState::new([0.0; 3], FRAC_PI_2);
        let q = kart_rotation(&kart);
        let fwd = q * Vector3::z();
        assert!((fwd.x - 1.0).abs() < 1e-4, "{fwd:?}");
        let up = q * Vector3::y();
        assert!((up.y - 1.0).abs() < 1e-4);
    }

    #[test]
    fn join_input_and_disconnect() {
        let mut game = SharedGameState::new(seeded(), SplineTrack::oval(120.0, 40.0, 14.0), 2, 3).unwrap();
        let id = Uuid::new_v4();
        let slot = game.join(id);
        assert_eq!(slot, 2);

        game.update_input(&id, KartInput { accel: 1.0, ..KartInput::IDLE });
        game.frame(0.0);
        game.frame(50.0);
        assert!(game.race.karts[slot].speed > 0.0);

        game.disconnect(&id);
        assert!(!game.race.drivers[slot].is_human());
        assert!(game.players.is_empty());
    }

    #[test]
    fn snapshot_reaches_clients() {
        let mut game = SharedGameState::new(seeded(), SplineTrack::oval(120.0, 40.0, 14.0), 1, 3).unwrap();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        game.register_client(Uuid::new_v4(), tx);
        game.frame(0.0);
        let msg = rx.try_recv().unwrap();
        let v: serde_json::Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(v["type"], "snapshot");
        assert_eq!(v["karts"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn snapshot_blends_render_position() {
        let mut game = SharedGameState::new(seeded(), SplineTrack::oval(120.0, 40.0, 14.0), 0, 3).unwrap();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        game.register_client(Uuid::new_v4(), tx);
        let id = Uuid::new_v4();
        let slot = game.join(id);

        // 12 ms: one 120 Hz step and a partial one left over
        game.frame(0.0);
        game.frame(12.0);
        while rx.try_recv().is_ok() {}
        assert!(game.clock.alpha() > 0.0);

        let kart = &mut game.race.karts[slot];
        kart.prev_position = [0.0, 0.0, 0.0];
        kart.position = [2.0, 0.0, 4.0];
        game.broadcast_snapshot(&[]);

        let v: serde_json::Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        let alpha = v["alpha"].as_f64().unwrap() as f32;
        let render = &v["karts"][slot]["render_position"];
        let x = render[0].as_f64().unwrap() as f32;
        let z = render[2].as_f64().unwrap() as f32;
        assert!((x - 2.0 * alpha).abs() < 1e-5, "{render}");
        assert!((z - 4.0 * alpha).abs() < 1e-5, "{render}");
    }
}
