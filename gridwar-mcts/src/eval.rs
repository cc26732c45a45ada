//! Strategic evaluation - goal-weighted material scoring
//!
//! Maps (owner, opponent, state) to a scalar in [-1, 1]: raw material value
//! reweighted by the active strategic goals, normalized across both sides.
//! Deterministic given the state and current weights.

use gridwar_agents::TargetPriority;
use gridwar_sim::{GameState, Side, UnitKind};

/// Value per stockpiled resource
const RESOURCE: f64 = 20.0;
/// Value per resource carried by a worker
const RESOURCE_IN_WORKER: f64 = 10.0;
/// Multiplier on unit cost x sqrt(hp fraction)
const UNIT_BONUS: f64 = 40.0;
/// Scale of goal-progress bonuses
const GOAL_BONUS: f64 = 50.0;
/// Target-priority refinement weight
const TARGET_BONUS: f64 = 0.3;

/// High-level intents the model can prioritize
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StrategicGoal {
    ExpandEconomy,
    BuildArmy,
    AttackBase,
    AttackWorkers,
    Defend,
    ControlResources,
}

impl StrategicGoal {
    pub const ALL: [StrategicGoal; 6] = [
        StrategicGoal::ExpandEconomy,
        StrategicGoal::BuildArmy,
        StrategicGoal::AttackBase,
        StrategicGoal::AttackWorkers,
        StrategicGoal::Defend,
        StrategicGoal::ControlResources,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StrategicGoal::ExpandEconomy => "EXPAND_ECONOMY",
            StrategicGoal::BuildArmy => "BUILD_ARMY",
            StrategicGoal::AttackBase => "ATTACK_BASE",
            StrategicGoal::AttackWorkers => "ATTACK_WORKERS",
            StrategicGoal::Defend => "DEFEND",
            StrategicGoal::ControlResources => "CONTROL_RESOURCES",
        }
    }

    pub fn parse(s: &str) -> Option<StrategicGoal> {
        let upper = s.trim().to_ascii_uppercase();
        StrategicGoal::ALL.into_iter().find(|g| g.name() == upper)
    }
}

/// Per-side tallies collected in one pass over the units
#[derive(Debug, Default)]
struct SideTally {
    any_unit: bool,
    workers: u32,
    military: u32,
    barracks: u32,
    base_hp: f64,
    base_total_hp: f64,
    material: f64,
}

/// Goal-weighted evaluation function
#[derive(Clone, Debug)]
pub struct StrategicEvaluator {
    primary: StrategicGoal,
    secondary: StrategicGoal,
    target: Option<TargetPriority>,
    military_weight: f64,
    economy_weight: f64,
    aggression_bonus: f64,
}

impl Default for StrategicEvaluator {
    fn default() -> Self {
        let mut eval = Self {
            primary: StrategicGoal::BuildArmy,
            secondary: StrategicGoal::ExpandEconomy,
            target: None,
            military_weight: 1.0,
            economy_weight: 1.0,
            aggression_bonus: 0.0,
        };
        eval.reweight();
        eval
    }
}

impl StrategicEvaluator {
    pub fn primary_goal(&self) -> StrategicGoal {
        self.primary
    }

    pub fn secondary_goal(&self) -> StrategicGoal {
        self.secondary
    }

    /// Swap in a new goal pair and derive the unit weights from it
    pub fn set_goals(&mut self, primary: StrategicGoal, secondary: StrategicGoal) {
        self.primary = primary;
        self.secondary = secondary;
        self.reweight();
    }

    /// Orthogonal target-priority refinement
    pub fn set_target(&mut self, target: Option<TargetPriority>) {
        self.target = target;
    }

    fn reweight(&mut self) {
        self.military_weight = 1.0;
        self.economy_weight = 1.0;
        self.aggression_bonus = 0.0;

        for (goal, mult) in [(self.primary, 1.0), (self.secondary, 0.5)] {
            match goal {
                StrategicGoal::ExpandEconomy => self.economy_weight += 0.5 * mult,
                StrategicGoal::BuildArmy => self.military_weight += 0.5 * mult,
                StrategicGoal::AttackBase => self.aggression_bonus += 0.2 * mult,
                StrategicGoal::AttackWorkers => self.aggression_bonus += 0.15 * mult,
                StrategicGoal::Defend => self.military_weight += 0.3 * mult,
                StrategicGoal::ControlResources => {
                    self.economy_weight += 0.3 * mult;
                    self.aggression_bonus += 0.1 * mult;
                }
            }
        }
    }

    /// Normalized evaluation from `owner`'s perspective, in [-1, 1].
    /// Goal bonuses apply to the owner's side only; 0 when both sides are
    /// worthless.
    pub fn evaluate(&self, owner: Side, opponent: Side, state: &GameState) -> f64 {
        let s1 = self.side_score(owner, opponent, state, true);
        let s2 = self.side_score(opponent, owner, state, false);
        if s1 + s2 == 0.0 {
            return 0.0;
        }
        ((2.0 * s1 / (s1 + s2)) - 1.0).clamp(-1.0, 1.0)
    }

    fn side_score(&self, side: Side, enemy: Side, state: &GameState, with_goals: bool) -> f64 {
        let mine = tally(state, side, self.economy_weight, self.military_weight);
        if !mine.any_unit {
            return 0.0;
        }
        let theirs = tally(state, enemy, self.economy_weight, self.military_weight);

        let mut score = state.resources(side) as f64 * RESOURCE + mine.material;

        if !with_goals {
            return score;
        }

        // Aggression: reward fielding an army at all when the goals are hostile
        if self.aggression_bonus > 0.0 {
            score += mine.military as f64 * self.aggression_bonus * 10.0;
        }

        // Target-priority refinements
        match self.target {
            Some(TargetPriority::Base) if theirs.base_total_hp > 0.0 => {
                let damage_ratio = 1.0 - theirs.base_hp / theirs.base_total_hp;
                score += damage_ratio * TARGET_BONUS * 100.0;
            }
            Some(TargetPriority::Workers) => {
                let kill_ratio = (5.0 - theirs.workers as f64).max(0.0) / 5.0;
                score += kill_ratio * TARGET_BONUS * 100.0;
            }
            Some(TargetPriority::Army) => {
                let advantage = mine.military as f64 - theirs.military as f64;
                if advantage > 0.0 {
                    score += advantage * TARGET_BONUS * 20.0;
                }
            }
            _ => {}
        }

        for (goal, mult) in [(self.primary, GOAL_BONUS), (self.secondary, GOAL_BONUS * 0.5)] {
            score += match goal {
                StrategicGoal::ExpandEconomy => {
                    mine.workers as f64 * mult * 0.3 + state.resources(side) as f64 * mult * 0.1
                }
                StrategicGoal::BuildArmy => {
                    mine.military as f64 * mult * 0.4 + mine.barracks as f64 * mult * 0.5
                }
                StrategicGoal::AttackBase => {
                    let mut bonus = 0.0;
                    if theirs.base_total_hp > 0.0 {
                        bonus += (1.0 - theirs.base_hp / theirs.base_total_hp) * mult * 2.0;
                    }
                    if theirs.base_total_hp == 0.0 || theirs.base_hp <= 0.0 {
                        bonus += mult * 3.0;
                    }
                    bonus
                }
                StrategicGoal::AttackWorkers => {
                    (3.0 - theirs.workers as f64).max(0.0) * mult * 0.5
                }
                StrategicGoal::Defend => {
                    let health = if mine.base_total_hp > 0.0 {
                        mine.base_hp / mine.base_total_hp
                    } else {
                        0.0
                    };
                    health * mult + mine.military as f64 * mult * 0.2
                }
                StrategicGoal::ControlResources => {
                    controlled_resources(state, side) as f64 * mult * 0.3
                }
            };
        }

        score
    }
}

/// Unit material is cost x sqrt(hp fraction), scaled by the goal-derived
/// unit weight: economy weight for harvesters, military weight for attackers,
/// 1.0 for buildings.
fn tally(state: &GameState, side: Side, economy_weight: f64, military_weight: f64) -> SideTally {
    let mut t = SideTally::default();
    for unit in state.units_of(side) {
        t.any_unit = true;
        let cost = gridwar_sim::stats(unit.kind).cost as f64;
        let health = (unit.hp as f64 / unit.max_hp() as f64).max(0.0).sqrt();

        if unit.kind.can_harvest() {
            t.workers += 1;
            t.material += unit.carried as f64 * RESOURCE_IN_WORKER;
            t.material += UNIT_BONUS * cost * health * economy_weight;
        } else if unit.kind.is_military() {
            t.military += 1;
            t.material += UNIT_BONUS * cost * health * military_weight;
        } else {
            t.material += UNIT_BONUS * cost * health;
            if unit.kind.is_stockpile() {
                t.base_hp += unit.hp as f64;
                t.base_total_hp += unit.max_hp() as f64;
            }
            if unit.kind == UnitKind::Barracks {
                t.barracks += 1;
            }
        }
    }
    t
}

/// Distinct resource nodes within Manhattan-4 of any of this side's workers
fn controlled_resources(state: &GameState, side: Side) -> u32 {
    state
        .units()
        .iter()
        .filter(|u| u.kind.is_resource() && u.amount > 0)
        .filter(|node| {
            state
                .units_of(side)
                .any(|w| w.kind.can_harvest() && w.pos.manhattan(node.pos) <= 4)
        })
        .count() as u32
}
