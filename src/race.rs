// ==============================================================================
// race.rs — RACE ORCHESTRATION
// ==============================================================================
// Owns one slot per kart as parallel arrays (index = slot):
//
//   karts[i]       KartState      physics state
//   drifts[i]      DriftState     drift charge for that kart
//   drivers[i]     Driver         human input or computer driver
//   laps[i]        LapTracker     signed distance travelled in laps
//   held_items[i]  Option<ItemKind>
//
// step(dt) runs, in this order:
//   1) every driver decides (AI + latched human input)
//   2) items requested in (1) are used
//   3) every kart advances
//   4) kart-kart collisions, all pairs
//   5) rubber band on computer karts
//   6) laps, item boxes, ranks, finish order
//
// Every random draw comes from the single seeded generator owned here.
// ==============================================================================

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use crate::kart_core::ai::{nearest_opponent, AiContext, AiDriver, CpuDifficulty};
use crate::kart_core::collision::resolve_all;
use crate::kart_core::config::{ConfigError, SimConfig};
use crate::kart_core::drift::DriftState;
use crate::kart_core::integrator::advance;
use crate::kart_core::items::{use_item, ItemEffect, ItemKind};
use crate::kart_core::kart::{apply_hit, KartState};
use crate::kart_core::rubber_band;
use crate::kart_core::surface::{SplineProvider, SurfaceQuery};
use crate::kart_core::types::{wrap_unit, wrapped_delta, KartInput};
use crate::spawn::GridSlot;

#[derive(Debug, Clone)]
pub enum Driver {
    Human {
        input: KartInput,
        item_latched: bool, // use_item held since the last use
    },
    Ai(AiDriver),
}

impl Driver {
    pub fn is_human(&self) -> bool {
        matches!(self, Driver::Human { .. })
    }
}

/// Laps as a continuous signed distance. Starting behind the line means a
/// small negative value, so crossing it the first time completes nothing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LapTracker {
    pub distance: f32,
    pub completed: u32,
    pub finish_place: Option<usize>,
    last_t: f32,
}

impl LapTracker {
    pub fn new(start_t: f32) -> Self {
        let start_t = wrap_unit(start_t);
        Self {
            distance: wrapped_delta(0.0, start_t),
            completed: 0,
            finish_place: None,
            last_t: start_t,
        }
    }

    /// Feeds the latest progress. Returns true when a new lap was completed.
    fn update(&mut self, t: f32) -> bool {
        self.distance += wrapped_delta(self.last_t, t);
        self.last_t = t;
        let laps = self.distance.floor().max(0.0) as u32;
        if laps > self.completed {
            self.completed = laps;
            true
        } else {
            false
        }
    }

    pub fn finished(&self) -> bool {
        self.finish_place.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RaceEvent {
    ItemPicked { slot: usize, kind: ItemKind },
    ItemUsed { slot: usize, kind: ItemKind, effect: ItemEffect },
    LapCompleted { slot: usize, lap: u32 },
    Finished { slot: usize, place: usize },
}

pub struct Race {
    pub config: SimConfig,
    pub finish_laps: u32,
    pub tick: u64,

    pub karts: Vec<KartState>,
    pub drifts: Vec<DriftState>,
    pub drivers: Vec<Driver>,
    pub laps: Vec<LapTracker>,
    pub held_items: Vec<Option<ItemKind>>,
    ranks: Vec<usize>, // 1-based, by slot

    item_boxes: Vec<f32>, // spline parameters
    finishers: usize,
    rng: StdRng,
}

impl Race {
    pub fn new(config: SimConfig, finish_laps: u32) -> Result<Self, ConfigError> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            config,
            finish_laps: finish_laps.max(1),
            tick: 0,
            karts: Vec::new(),
            drifts: Vec::new(),
            drivers: Vec::new(),
            laps: Vec::new(),
            held_items: Vec::new(),
            ranks: Vec::new(),
            item_boxes: Vec::new(),
            finishers: 0,
            rng,
        })
    }

    pub fn with_item_boxes(mut self, ts: impl IntoIterator<Item = f32>) -> Self {
        self.item_boxes = ts.into_iter().map(wrap_unit).collect();
        self
    }

    // ---------------------------------------------------------
    // Roster
    // ---------------------------------------------------------
    fn push_slot(&mut self, grid: &GridSlot, driver: Driver) -> usize {
        let slot = self.karts.len();
        self.karts.push(grid.kart_state());
        self.drifts.push(DriftState::default());
        self.drivers.push(driver);
        self.laps.push(LapTracker::new(grid.t));
        self.held_items.push(None);
        self.ranks.push(slot + 1);
        slot
    }

    pub fn add_human(&mut self, grid: &GridSlot) -> usize {
        self.push_slot(grid, Driver::Human { input: KartInput::IDLE, item_latched: false })
    }

    pub fn add_ai(&mut self, grid: &GridSlot, difficulty: CpuDifficulty) -> usize {
        let driver = AiDriver::with_difficulty(&self.config.ai, difficulty);
        self.push_slot(grid, Driver::Ai(driver))
    }

    /// A human left: a computer driver takes over the kart where it is.
    pub fn hand_to_ai(&mut self, slot: usize, difficulty: CpuDifficulty) {
        if let Some(driver) = self.drivers.get_mut(slot) {
            if driver.is_human() {
                *driver = Driver::Ai(AiDriver::with_difficulty(&self.config.ai, difficulty));
                tracing::debug!(slot, "human slot handed to ai");
            }
        }
    }

    pub fn set_input(&mut self, slot: usize, new_input: KartInput) {
        if let Some(Driver::Human { input, .. }) = self.drivers.get_mut(slot) {
            *input = new_input.clamped();
        }
    }

    pub fn len(&self) -> usize {
        self.karts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.karts.is_empty()
    }

    pub fn rank(&self, slot: usize) -> Option<usize> {
        self.ranks.get(slot).copied()
    }

    /// Slots ordered by current rank.
    pub fn standings(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.karts.len()).collect();
        order.sort_by_key(|&i| self.ranks[i]);
        order
    }

    pub fn is_finished(&self) -> bool {
        !self.laps.is_empty() && self.laps.iter().all(LapTracker::finished)
    }

    // ---------------------------------------------------------
    // Item hooks for external behaviours
    // ---------------------------------------------------------
    pub fn give_item(&mut self, slot: usize, kind: ItemKind) {
        if let Some(held) = self.held_items.get_mut(slot) {
            *held = Some(kind);
        }
    }

    /// Banana / shell contact. Returns false if a star absorbed it.
    pub fn hit_kart(&mut self, slot: usize, spin_duration: f32) -> bool {
        let (Some(kart), Some(drift)) = (self.karts.get_mut(slot), self.drifts.get_mut(slot)) else {
            return false;
        };
        let hit = apply_hit(&self.config.kart, kart, spin_duration);
        if hit {
            drift.cancel(kart);
        }
        hit
    }

    // ---------------------------------------------------------
    // Fixed step
    // ---------------------------------------------------------
    pub fn step<T>(&mut self, dt: f32, track: &T) -> Vec<RaceEvent>
    where
        T: SplineProvider + SurfaceQuery + ?Sized,
    {
        let mut events = Vec::new();
        let count = self.karts.len();

        // 1) decisions, before anything moves
        let mut inputs = Vec::with_capacity(count);
        let mut wants_item = Vec::with_capacity(count);
        for i in 0..count {
            let finished = self.laps[i].finished();
            let (input, use_item) = match &mut self.drivers[i] {
                Driver::Human { input, item_latched } => {
                    let pressed = input.use_item && !*item_latched;
                    *item_latched = input.use_item;
                    let input = if finished || input.pause { KartInput::IDLE } else { *input };
                    (input, pressed && !finished)
                }
                Driver::Ai(ai) => {
                    let ctx = AiContext {
                        rank: self.ranks[i],
                        racer_count: count,
                        held_item: self.held_items[i],
                        nearest_opponent: nearest_opponent(&self.karts, i),
                        finished,
                    };
                    let d = ai.update(&self.config, &self.karts[i], &ctx, track, dt, &mut self.rng);
                    (d.input, d.use_item)
                }
            };
            inputs.push(input);
            wants_item.push(use_item);
        }

        // 2) items
        for (i, wants) in wants_item.iter().enumerate() {
            if !*wants {
                continue;
            }
            if let Some(kind) = self.held_items[i].take() {
                let effect = use_item(&self.config.items, &self.config.kart, kind, i, &mut self.karts);
                tracing::debug!(slot = i, item = %kind, "item used");
                events.push(RaceEvent::ItemUsed { slot: i, kind, effect });
            }
        }

        // 3) integrate
        for (i, input) in inputs.iter().enumerate() {
            advance(&self.config, &mut self.karts[i], &mut self.drifts[i], input, dt, track);
        }

        // 4) collisions
        resolve_all(&self.config.collision, &mut self.karts);

        // 5) rubber band, computer karts only
        for i in 0..count {
            if !self.drivers[i].is_human() {
                rubber_band::apply(
                    &self.config.rubber_band,
                    &self.config.kart,
                    &mut self.karts[i],
                    self.ranks[i],
                    count,
                );
            }
        }

        // 6) bookkeeping
        self.update_laps(&mut events);
        self.update_ranks();

        self.tick += 1;
        events
    }

    fn update_laps(&mut self, events: &mut Vec<RaceEvent>) {
        for i in 0..self.karts.len() {
            let before = self.laps[i].last_t;
            let t = self.karts[i].lap_progress;

            if self.laps[i].update(t) && !self.laps[i].finished() {
                let lap = self.laps[i].completed;
                tracing::debug!(slot = i, lap, "lap completed");
                events.push(RaceEvent::LapCompleted { slot: i, lap });

                if lap >= self.finish_laps {
                    self.finishers += 1;
                    self.laps[i].finish_place = Some(self.finishers);
                    tracing::debug!(slot = i, place = self.finishers, "finished");
                    events.push(RaceEvent::Finished { slot: i, place: self.finishers });
                }
            }

            if self.held_items[i].is_none() && crossed_any(&self.item_boxes, before, t) {
                let kind = roll_item_box(&mut self.rng, self.ranks[i], self.karts.len());
                self.held_items[i] = Some(kind);
                events.push(RaceEvent::ItemPicked { slot: i, kind });
            }
        }
    }

    /// Finishers by place, then everyone else by distance.
    fn update_ranks(&mut self) {
        let mut order: Vec<usize> = (0..self.karts.len()).collect();
        order.sort_by(|&a, &b| {
            let (la, lb) = (&self.laps[a], &self.laps[b]);
            match (la.finish_place, lb.finish_place) {
                (Some(pa), Some(pb)) => pa.cmp(&pb),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => lb.distance.total_cmp(&la.distance).then(a.cmp(&b)),
            }
        });
        for (place, slot) in order.into_iter().enumerate() {
            self.ranks[slot] = place + 1;
        }
    }
}

/// Forward crossing of any box parameter between two consecutive steps.
fn crossed_any(boxes: &[f32], from: f32, to: f32) -> bool {
    let moved = wrapped_delta(from, to);
    if moved <= 0.0 {
        return false;
    }
    boxes.iter().any(|&b| {
        let ahead = wrapped_delta(from, b);
        ahead > 0.0 && ahead <= moved
    })
}

fn roll_item_box(rng: &mut StdRng, rank: usize, count: usize) -> ItemKind {
    ItemKind::roll(rng, rank, count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kart_core::track::SplineTrack;
    use crate::kart_core::types::v_scale;
    use crate::spawn::GridAllocator;

    const DT: f32 = 1.0 / 120.0;

    fn seeded() -> SimConfig {
        SimConfig { seed: Some(7), ..SimConfig::default() }
    }

    #[test]
    fn lap_tracker_from_behind_the_line() {
        let mut lap = LapTracker::new(0.98);
        assert!(lap.distance < 0.0);
        assert!(!lap.update(0.01), "first crossing is the start");
        for t in [0.3, 0.6, 0.9] {
            assert!(!lap.update(t));
        }
        assert!(lap.update(0.02));
        assert_eq!(lap.completed, 1);
    }

    #[test]
    fn reversing_over_the_line_does_not_count() {
        let mut lap = LapTracker::new(0.1);
        lap.update(0.95);
        lap.update(0.05);
        assert_eq!(lap.completed, 0);
        assert!(lap.distance < 0.2);
    }

    #[test]
    fn item_box_crossing() {
        assert!(crossed_any(&[0.5], 0.49, 0.51));
        assert!(!crossed_any(&[0.5], 0.51, 0.49));
        assert!(crossed_any(&[0.0], 0.99, 0.01));
        assert!(!crossed_any(&[0.5], 0.1, 0.2));
    }

    #[test]
    fn rejects_bad_config() {
        let mut cfg = SimConfig::default();
        cfg.clock.max_steps = 0;
        assert!(Race::new(cfg, 3).is_err());
    }

    #[test]
    fn humans_latch_item_use() {
        let track = SplineTrack::oval(120.0, 40.0, 14.0);
        let mut grid = GridAllocator::new();
        let mut race = Race::new(seeded(), 3).unwrap();
        let slot = race.add_human(&grid.allocate(&track));
        race.give_item(slot, ItemKind::Mushroom);

        let press = KartInput { use_item: true, ..KartInput::IDLE };
        race.set_input(slot, press);
        let events = race.step(DT, &track);
        assert!(matches!(
            events.as_slice(),
            [RaceEvent::ItemUsed { kind: ItemKind::Mushroom, effect: ItemEffect::Boosted, .. }]
        ));
        assert!(race.karts[slot].is_boosting());

        // still held down: a new item is not fired
        race.give_item(slot, ItemKind::Star);
        race.step(DT, &track);
        assert_eq!(race.held_items[slot], Some(ItemKind::Star));
    }

    #[test]
    fn hit_kart_cancels_drift() {
        let track = SplineTrack::oval(120.0, 40.0, 14.0);
        let mut race = Race::new(seeded(), 3).unwrap();
        let slot = race.add_human(&GridAllocator::new().allocate(&track));
        race.karts[slot].speed = 25.0;
        race.drifts[slot].active = true;
        race.karts[slot].is_drifting = true;
        assert!(race.hit_kart(slot, 1.0));
        assert!(!race.drifts[slot].active);
        assert!(race.karts[slot].is_spinning());

        race.karts[slot].star_timer = 5.0;
        race.karts[slot].spin_timer = 0.0;
        assert!(!race.hit_kart(slot, 1.0));
        assert!(!race.hit_kart(99, 1.0));
    }

    #[test]
    fn hand_over_keeps_the_kart() {
        let track = SplineTrack::oval(120.0, 40.0, 14.0);
        let mut race = Race::new(seeded(), 3).unwrap();
        let slot = race.add_human(&GridAllocator::new().allocate(&track));
        let before = race.karts[slot].position;
        race.hand_to_ai(slot, CpuDifficulty::Hard);
        assert!(!race.drivers[slot].is_human());
        assert_eq!(race.karts[slot].position, before);
    }

    #[test]
    fn human_leader_keeps_full_speed() {
        let track = SplineTrack::oval(120.0, 40.0, 14.0);
        let mut race = Race::new(seeded(), 3).unwrap();
        let slot = race.add_human(&GridAllocator::new().allocate(&track));
        // start of the first straight, +Z
        race.karts[slot] = KartState::new([40.0, 0.0, -55.0], 0.0);
        race.karts[slot].speed = 20.0;
        race.set_input(slot, KartInput { accel: 1.0, ..KartInput::IDLE });
        for _ in 0..300 {
            race.step(DT, &track);
        }
        assert_eq!(race.rank(slot), Some(1));
        assert_eq!(race.karts[slot].speed, race.config.kart.max_speed);
    }

    #[test]
    fn rubber_band_skips_humans() {
        let track = SplineTrack::oval(120.0, 40.0, 14.0);
        let mut grid = GridAllocator::new();
        let mut race = Race::new(seeded(), 3).unwrap();
        let human = race.add_human(&grid.allocate(&track));
        let cpu = race.add_ai(&grid.allocate(&track), CpuDifficulty::Medium);

        // both finished: idle input, so only the rubber band tells them apart
        let top = race.config.kart.max_speed;
        for (slot, place, x) in [(human, 1, 37.0), (cpu, 2, 43.0)] {
            race.laps[slot].finish_place = Some(place);
            race.karts[slot] = KartState::new([x, 0.0, -40.0], 0.0);
            race.karts[slot].speed = top;
        }
        race.ranks = vec![1, 1];
        race.step(DT, &track);

        let coasted = top - race.config.kart.coast_decel * DT;
        let decay = race.config.rubber_band.decay;
        assert!((race.karts[human].speed - coasted).abs() < 1e-4);
        assert!((race.karts[cpu].speed - coasted * decay).abs() < 1e-4);
    }

    #[test]
    fn decisions_see_positions_from_before_the_step() {
        let track = SplineTrack::oval(120.0, 40.0, 14.0);
        let mut grid = GridAllocator::new();
        let mut race = Race::new(seeded(), 3).unwrap();
        let runner = race.add_human(&grid.allocate(&track));
        let cpu = race.add_ai(&grid.allocate(&track), CpuDifficulty::Hard);
        let radius = race.config.ai.green_shell_radius;

        // on the first straight (+Z), the human just inside shell range and pulling away
        race.karts[cpu] = KartState::new([40.0, 0.0, -20.0], 0.0);
        let mut ahead = KartState::new([40.0, 0.0, -20.0 + radius - 0.05], 0.0);
        ahead.speed = race.config.kart.max_speed;
        ahead.velocity = v_scale(ahead.forward(), ahead.speed);
        race.karts[runner] = ahead;
        race.set_input(runner, KartInput { accel: 1.0, ..KartInput::IDLE });
        race.give_item(cpu, ItemKind::GreenShell);

        let events = race.step(DT, &track);
        assert!(
            events.contains(&RaceEvent::ItemUsed {
                slot: cpu,
                kind: ItemKind::GreenShell,
                effect: ItemEffect::Released(ItemKind::GreenShell),
            }),
            "{events:?}"
        );
        // after moving the runner is out of range
        assert!(nearest_opponent(&race.karts, cpu).is_some_and(|d| d > radius));
    }

    #[test]
    fn ranks_follow_distance() {
        let track = SplineTrack::oval(120.0, 40.0, 14.0);
        let mut grid = GridAllocator::new();
        let mut race = Race::new(seeded(), 3).unwrap();
        for _ in 0..3 {
            race.add_human(&grid.allocate(&track));
        }
        race.laps[2].distance = 0.5;
        race.laps[0].distance = 0.2;
        race.laps[1].distance = 0.1;
        race.update_ranks();
        assert_eq!(race.standings(), vec![2, 0, 1]);
        assert_eq!(race.rank(2), Some(1));
    }
}
