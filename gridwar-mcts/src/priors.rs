//! Policy prior cache - situation-classified action weights
//!
//! Turns a (unit, state) pair into a probability distribution over that
//! unit's legal actions. Weights come from a per-situation table (built-in
//! defaults, optionally overwritten by a model refresh) plus positional
//! adjustments, then normalize to sum 1.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use gridwar_llm::{
    extract_json_object, ChannelHealth, LlmError, RefreshSchedule, TextGenerator,
};
use gridwar_sim::{stats, ActionKind, GameState, Unit, UnitAction, UnitKind};

use crate::refresh::SingleFlight;

/// Weight for an action kind the table has no entry for
const UNKNOWN_KIND_WEIGHT: f64 = 0.1;

/// Coarse tactical context of a single unit; the lookup key for priors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Situation {
    WorkerNearResource,
    WorkerIdle,
    WorkerCarrying,
    MilitaryInCombat,
    MilitaryNotInCombat,
    BaseEconomy,
    BaseLowResources,
    Barracks,
}

impl Situation {
    pub const ALL: [Situation; 8] = [
        Situation::WorkerNearResource,
        Situation::WorkerIdle,
        Situation::WorkerCarrying,
        Situation::MilitaryInCombat,
        Situation::MilitaryNotInCombat,
        Situation::BaseEconomy,
        Situation::BaseLowResources,
        Situation::Barracks,
    ];

    /// Wire name used in prompts and refresh payloads
    pub fn name(self) -> &'static str {
        match self {
            Situation::WorkerNearResource => "WORKER_NEAR_RESOURCE",
            Situation::WorkerIdle => "WORKER_IDLE",
            Situation::WorkerCarrying => "WORKER_CARRYING",
            Situation::MilitaryInCombat => "MILITARY_IN_COMBAT",
            Situation::MilitaryNotInCombat => "MILITARY_NOT_IN_COMBAT",
            Situation::BaseEconomy => "BASE_ECONOMY",
            Situation::BaseLowResources => "BASE_LOW_RESOURCES",
            Situation::Barracks => "BARRACKS",
        }
    }

    pub fn parse(s: &str) -> Option<Situation> {
        let upper = s.trim().to_ascii_uppercase();
        Situation::ALL.into_iter().find(|sit| sit.name() == upper)
    }
}

/// Classify one unit. Total: every unit maps to exactly one situation.
pub fn classify_situation(unit: &Unit, state: &GameState) -> Situation {
    let kind = unit.kind;

    if kind.is_stockpile() {
        let cheapest = stats(kind)
            .produces
            .iter()
            .map(|k| stats(*k).cost)
            .min()
            .unwrap_or(u32::MAX);
        let side = unit.owner;
        let resources = side.map(|s| state.resources(s)).unwrap_or(0);
        return if resources >= cheapest {
            Situation::BaseEconomy
        } else {
            Situation::BaseLowResources
        };
    }

    if kind == UnitKind::Barracks {
        return Situation::Barracks;
    }

    if kind.can_harvest() {
        if unit.carried > 0 {
            return Situation::WorkerCarrying;
        }
        let near = state
            .nearest_resource(unit.pos)
            .map(|r| unit.pos.manhattan(r.pos) <= 3)
            .unwrap_or(false);
        return if near {
            Situation::WorkerNearResource
        } else {
            Situation::WorkerIdle
        };
    }

    if kind.can_attack() {
        let side = unit.owner;
        let range = stats(kind).attack_range;
        let engaged = side
            .and_then(|s| state.nearest_enemy(s, unit.pos))
            .map(|e| unit.pos.manhattan(e.pos) <= range)
            .unwrap_or(false);
        return if engaged {
            Situation::MilitaryInCombat
        } else {
            Situation::MilitaryNotInCombat
        };
    }

    Situation::WorkerIdle
}

// ============================================================================
// Prior table
// ============================================================================

/// Situation -> action-kind -> relative weight
#[derive(Clone, Debug)]
pub struct PriorTable {
    table: HashMap<Situation, HashMap<ActionKind, f64>>,
}

impl Default for PriorTable {
    fn default() -> Self {
        let mut table = HashMap::new();

        table.insert(
            Situation::WorkerNearResource,
            entries(&[
                (ActionKind::Harvest, 0.6),
                (ActionKind::Move, 0.2),
                (ActionKind::Produce, 0.1),
                (ActionKind::Attack, 0.05),
                (ActionKind::None, 0.05),
            ]),
        );
        table.insert(
            Situation::WorkerIdle,
            entries(&[
                (ActionKind::Move, 0.5),
                (ActionKind::Produce, 0.2),
                (ActionKind::Harvest, 0.1),
                (ActionKind::Attack, 0.1),
                (ActionKind::None, 0.1),
            ]),
        );
        table.insert(
            Situation::WorkerCarrying,
            entries(&[
                (ActionKind::Return, 0.7),
                (ActionKind::Move, 0.2),
                (ActionKind::Attack, 0.05),
                (ActionKind::None, 0.05),
            ]),
        );
        table.insert(
            Situation::MilitaryInCombat,
            entries(&[
                (ActionKind::Attack, 0.7),
                (ActionKind::Move, 0.2),
                (ActionKind::None, 0.1),
            ]),
        );
        table.insert(
            Situation::MilitaryNotInCombat,
            entries(&[
                (ActionKind::Move, 0.6),
                (ActionKind::Attack, 0.3),
                (ActionKind::None, 0.1),
            ]),
        );
        table.insert(
            Situation::BaseEconomy,
            entries(&[(ActionKind::Produce, 0.8), (ActionKind::None, 0.2)]),
        );
        table.insert(
            Situation::BaseLowResources,
            entries(&[(ActionKind::None, 0.6), (ActionKind::Produce, 0.4)]),
        );
        table.insert(
            Situation::Barracks,
            entries(&[(ActionKind::Produce, 0.8), (ActionKind::None, 0.2)]),
        );

        Self { table }
    }
}

fn entries(pairs: &[(ActionKind, f64)]) -> HashMap<ActionKind, f64> {
    pairs.iter().copied().collect()
}

impl PriorTable {
    pub fn weight(&self, situation: Situation, kind: ActionKind) -> f64 {
        self.table
            .get(&situation)
            .and_then(|m| m.get(&kind))
            .copied()
            .unwrap_or(UNKNOWN_KIND_WEIGHT)
    }

    /// Overwrite situation entries from a refresh payload
    /// (`{"MILITARY_IN_COMBAT": {"attack": 0.7, ...}, ...}`). Unknown
    /// situation or action keys are skipped; returns how many situations
    /// were updated.
    pub fn apply_update(&mut self, payload: &Value) -> usize {
        let Some(object) = payload.as_object() else {
            return 0;
        };
        let mut updated = 0;
        for (key, weights) in object {
            let Some(situation) = Situation::parse(key) else {
                debug!("skipping unknown situation key '{key}'");
                continue;
            };
            let Some(map) = weights.as_object() else {
                continue;
            };
            let mut parsed: HashMap<ActionKind, f64> = HashMap::new();
            for (action_key, weight) in map {
                let Some(kind) = ActionKind::parse(action_key) else {
                    debug!("skipping unknown action key '{action_key}'");
                    continue;
                };
                if let Some(w) = weight.as_f64() {
                    if w.is_finite() && w >= 0.0 {
                        parsed.insert(kind, w);
                    }
                }
            }
            if !parsed.is_empty() {
                self.table.insert(situation, parsed);
                updated += 1;
            }
        }
        updated
    }
}

// ============================================================================
// Cache with scheduled refresh
// ============================================================================

/// The per-agent prior cache: table + refresh plumbing + statistics
pub struct PolicyPriorCache {
    table: PriorTable,
    schedule: RefreshSchedule,
    health: ChannelHealth,
    flight: SingleFlight<Result<Value, LlmError>>,
    consultations: u32,
    errors: u32,
}

impl PolicyPriorCache {
    pub fn new(interval_ticks: u32) -> Self {
        Self {
            table: PriorTable::default(),
            schedule: RefreshSchedule::new(interval_ticks),
            health: ChannelHealth::default(),
            flight: SingleFlight::new(),
            consultations: 0,
            errors: 0,
        }
    }

    pub fn table(&self) -> &PriorTable {
        &self.table
    }

    pub fn consultations(&self) -> u32 {
        self.consultations
    }

    pub fn errors(&self) -> u32 {
        self.errors
    }

    pub fn is_degraded(&self) -> bool {
        self.health.is_degraded()
    }

    pub fn describe(&self) -> String {
        format!(
            "priors: {} consultations, {} errors, channel {}",
            self.consultations,
            self.errors,
            self.health.describe()
        )
    }

    /// Probability distribution over `legal` for one unit.
    ///
    /// Always sums to 1 (uniform fallback when all weights vanish); an empty
    /// legal set yields an empty distribution.
    pub fn distribution(&self, unit: &Unit, state: &GameState, legal: &[UnitAction]) -> Vec<f64> {
        if legal.is_empty() {
            return Vec::new();
        }
        let situation = classify_situation(unit, state);

        let mut weights: Vec<f64> = legal
            .iter()
            .map(|action| {
                let base = self.table.weight(situation, action.kind());
                adjust_for_position(base, *action, unit, state, situation)
            })
            .collect();

        let total: f64 = weights.iter().sum();
        if total > 0.0 {
            for w in &mut weights {
                *w /= total;
            }
        } else {
            let uniform = 1.0 / legal.len() as f64;
            weights.iter_mut().for_each(|w| *w = uniform);
        }
        weights
    }

    /// Poll a finished refresh and launch a new one when the window expired.
    /// Never blocks: the call happens on a worker thread and lands on a later
    /// turn. Errors leave the table untouched.
    pub fn maybe_refresh(
        &mut self,
        generator: &Arc<dyn TextGenerator + Send + Sync>,
        state: &GameState,
    ) {
        if let Some(result) = self.flight.poll() {
            match result {
                Ok(payload) => {
                    let updated = self.table.apply_update(&payload);
                    debug!("prior refresh applied ({updated} situations)");
                    self.health.record_success();
                }
                Err(err) => {
                    warn!("prior refresh failed: {err}");
                    self.errors += 1;
                    self.health.record_failure();
                }
            }
        }

        let tick = state.tick();
        if !self.schedule.due(tick) || self.flight.in_flight() {
            return;
        }
        if !self.health.should_attempt() {
            self.schedule.mark(tick);
            return;
        }

        self.consultations += 1;
        self.schedule.mark(tick);
        let prompt = build_prior_prompt(state);
        let generator = Arc::clone(generator);
        self.flight.spawn(move || {
            generator
                .generate(&prompt)
                .and_then(|text| extract_json_object(&text))
        });
    }
}

/// Positional adjustments on top of the table weight
fn adjust_for_position(
    base: f64,
    action: UnitAction,
    unit: &Unit,
    state: &GameState,
    situation: Situation,
) -> f64 {
    match action {
        UnitAction::Move(dir) => {
            let next = unit.pos.step(dir);
            if situation == Situation::MilitaryNotInCombat {
                if let Some(side) = unit.owner {
                    if let Some(enemy) = state.nearest_enemy(side, unit.pos) {
                        if next.manhattan(enemy.pos) < unit.pos.manhattan(enemy.pos) {
                            return base * 1.5;
                        }
                    }
                }
            }
            if situation == Situation::WorkerIdle {
                if let Some(node) = state.nearest_resource(unit.pos) {
                    if next.manhattan(node.pos) < unit.pos.manhattan(node.pos) {
                        return base * 1.5;
                    }
                }
            }
            base
        }
        UnitAction::Attack(pos) => match state.unit_at(pos) {
            Some(target) if target.kind.is_stockpile() => base * 2.0,
            Some(target) if target.kind.can_harvest() => base * 1.5,
            _ => base,
        },
        UnitAction::Produce(_, kind) => {
            if kind.can_harvest() && situation == Situation::BaseEconomy {
                base * 1.2
            } else if kind.is_military() {
                base * 1.3
            } else {
                base
            }
        }
        _ => base,
    }
}

/// Ask the model for per-situation action weights
fn build_prior_prompt(state: &GameState) -> String {
    let mut p = String::new();
    p.push_str("You are providing action probability priors for an RTS game tree search.\n\n");
    p.push_str("For each situation type, give relative weights for action kinds.\n");
    p.push_str("Higher weight = the action is more likely to be good.\n\n");
    p.push_str(&format!(
        "GAME STATE:\n- Map size: {}x{}\n- Time: {}\n\n",
        state.width(),
        state.height(),
        state.tick()
    ));
    p.push_str("SITUATION TYPES:\n");
    p.push_str("- WORKER_NEAR_RESOURCE: worker within 3 cells of a resource\n");
    p.push_str("- WORKER_IDLE: worker away from resources\n");
    p.push_str("- WORKER_CARRYING: worker carrying resources back\n");
    p.push_str("- MILITARY_IN_COMBAT: combat unit with an enemy in range\n");
    p.push_str("- MILITARY_NOT_IN_COMBAT: combat unit out of range\n");
    p.push_str("- BASE_ECONOMY: base that can afford production\n");
    p.push_str("- BASE_LOW_RESOURCES: base that cannot\n");
    p.push_str("- BARRACKS: barracks building\n\n");
    p.push_str("ACTION KINDS: none, move, harvest, return, produce, attack\n\n");
    p.push_str("Reply with JSON mapping situations to action weights:\n");
    p.push_str("{\n  \"WORKER_NEAR_RESOURCE\": {\"harvest\": 0.6, \"move\": 0.2, \"none\": 0.05},\n");
    p.push_str("  \"MILITARY_IN_COMBAT\": {\"attack\": 0.7, \"move\": 0.2, \"none\": 0.1}\n}\n");
    p.push_str("\nOnly include situations you want to adjust. Weights should sum to about 1.\n");
    p
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridwar_sim::{GameMap, Side};
    use serde_json::json;

    fn state_from(text: &str) -> GameState {
        GameState::from_map(&GameMap::parse(text, 5).unwrap())
    }

    #[test]
    fn test_classification_total() {
        let state = GameState::bases_workers_8x8();
        for unit in state.units() {
            // Must not panic and must produce one of the eight situations
            let situation = classify_situation(unit, &state);
            assert!(Situation::ALL.contains(&situation));
        }
    }

    #[test]
    fn test_classify_worker_variants() {
        let near = state_from("R w b");
        let worker = near
            .units_of(Side::P0)
            .find(|u| u.kind == UnitKind::Worker)
            .unwrap();
        assert_eq!(classify_situation(worker, &near), Situation::WorkerNearResource);

        let idle = state_from("R . . . . w b");
        let worker = idle
            .units_of(Side::P0)
            .find(|u| u.kind == UnitKind::Worker)
            .unwrap();
        assert_eq!(classify_situation(worker, &idle), Situation::WorkerIdle);
    }

    #[test]
    fn test_classify_base_by_affordability() {
        // Worker costs 1: stockpile 5 affords it
        let rich = state_from("b w R");
        let base = rich
            .units_of(Side::P0)
            .find(|u| u.kind == UnitKind::Base)
            .unwrap();
        assert_eq!(classify_situation(base, &rich), Situation::BaseEconomy);

        let poor = GameState::from_map(&GameMap::parse("b w R", 0).unwrap());
        let base = poor
            .units_of(Side::P0)
            .find(|u| u.kind == UnitKind::Base)
            .unwrap();
        assert_eq!(classify_situation(base, &poor), Situation::BaseLowResources);
    }

    #[test]
    fn test_distribution_sums_to_one() {
        let state = GameState::bases_workers_8x8();
        let cache = PolicyPriorCache::new(300);
        for unit in state.units() {
            let legal = state.legal_actions(unit.id);
            let dist = cache.distribution(unit, &state, &legal);
            assert_eq!(dist.len(), legal.len());
            if !legal.is_empty() {
                let total: f64 = dist.iter().sum();
                assert!((total - 1.0).abs() < 1e-9, "sum was {total}");
                assert!(dist.iter().all(|p| *p >= 0.0));
            }
        }
    }

    #[test]
    fn test_empty_legal_set_empty_distribution() {
        let state = GameState::bases_workers_8x8();
        let cache = PolicyPriorCache::new(300);
        let resource = state.units().iter().find(|u| u.kind.is_resource()).unwrap();
        let dist = cache.distribution(resource, &state, &[]);
        assert!(dist.is_empty());
    }

    #[test]
    fn test_harvest_favoured_near_resource() {
        let state = state_from("R w b");
        let cache = PolicyPriorCache::new(300);
        let worker = state
            .units_of(Side::P0)
            .find(|u| u.kind == UnitKind::Worker)
            .unwrap();
        let legal = state.legal_actions(worker.id);
        let dist = cache.distribution(worker, &state, &legal);

        let harvest_idx = legal
            .iter()
            .position(|a| a.kind() == ActionKind::Harvest)
            .unwrap();
        let best = dist
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap()
            .0;
        assert_eq!(best, harvest_idx);
    }

    #[test]
    fn test_apply_update_skips_unknown_keys() {
        let mut table = PriorTable::default();

        let updated = table.apply_update(&json!({
            "MILITARY_IN_COMBAT": {"attack": 0.9, "teleport": 0.5, "none": 0.1},
            "SIEGE_MODE": {"attack": 1.0},
        }));

        assert_eq!(updated, 1);
        assert_eq!(table.weight(Situation::MilitaryInCombat, ActionKind::Attack), 0.9);
        // Unknown action key dropped, unknown situation ignored
        assert_eq!(
            table.weight(Situation::MilitaryInCombat, ActionKind::Move),
            UNKNOWN_KIND_WEIGHT
        );
        let untouched = PriorTable::default();
        assert_eq!(
            table.weight(Situation::BaseEconomy, ActionKind::Produce),
            untouched.weight(Situation::BaseEconomy, ActionKind::Produce)
        );
    }

    #[test]
    fn test_apply_update_non_object_is_noop() {
        let mut table = PriorTable::default();
        assert_eq!(table.apply_update(&json!([1, 2, 3])), 0);
        assert_eq!(table.apply_update(&json!("nope")), 0);
    }
}
