//! Strategy capability and the closed set of named strategies

use gridwar_sim::{GameState, PlayerAction, Side};

use crate::defense::{CounterAttack, TurtleDefense};
use crate::economy::{BoomEconomy, Harass};
use crate::rushes::{HeavyRush, LightRush, RangedRush, WorkerRush};

/// A deterministic per-tick action generator.
///
/// Strategies are pure rules: given a state they emit production, harvest and
/// combat orders for every unit they care about. The hybrid agent owns a set
/// of these and switches between them.
pub trait GameStrategy: Send {
    fn act(&mut self, side: Side, state: &GameState) -> PlayerAction;

    /// Drop per-game bookkeeping (called on strategy switch and game reset)
    fn reset(&mut self) {}
}

/// The named strategies an LLM can pick between
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    WorkerRush,
    LightRush,
    HeavyRush,
    RangedRush,
    TurtleDefense,
    BoomEconomy,
    CounterAttack,
    Harass,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 8] = [
        StrategyKind::WorkerRush,
        StrategyKind::LightRush,
        StrategyKind::HeavyRush,
        StrategyKind::RangedRush,
        StrategyKind::TurtleDefense,
        StrategyKind::BoomEconomy,
        StrategyKind::CounterAttack,
        StrategyKind::Harass,
    ];

    /// Wire name used in prompts and responses
    pub fn name(self) -> &'static str {
        match self {
            StrategyKind::WorkerRush => "WORKER_RUSH",
            StrategyKind::LightRush => "LIGHT_RUSH",
            StrategyKind::HeavyRush => "HEAVY_RUSH",
            StrategyKind::RangedRush => "RANGED_RUSH",
            StrategyKind::TurtleDefense => "TURTLE_DEFENSE",
            StrategyKind::BoomEconomy => "BOOM_ECONOMY",
            StrategyKind::CounterAttack => "COUNTER_ATTACK",
            StrategyKind::Harass => "HARASS",
        }
    }

    pub fn parse(s: &str) -> Option<StrategyKind> {
        let upper = s.trim().to_ascii_uppercase();
        StrategyKind::ALL.into_iter().find(|k| k.name() == upper)
    }

    /// Display label used in agent names and reports
    pub fn label(self) -> &'static str {
        match self {
            StrategyKind::WorkerRush => "WorkerRush",
            StrategyKind::LightRush => "LightRush",
            StrategyKind::HeavyRush => "HeavyRush",
            StrategyKind::RangedRush => "RangedRush",
            StrategyKind::TurtleDefense => "TurtleDefense",
            StrategyKind::BoomEconomy => "BoomEconomy",
            StrategyKind::CounterAttack => "CounterAttack",
            StrategyKind::Harass => "Harass",
        }
    }

    pub fn index(self) -> usize {
        StrategyKind::ALL.iter().position(|k| *k == self).expect("member of ALL")
    }

    /// Instantiate the strategy
    pub fn build(self) -> Box<dyn GameStrategy> {
        match self {
            StrategyKind::WorkerRush => Box::new(WorkerRush::default()),
            StrategyKind::LightRush => Box::new(LightRush::default()),
            StrategyKind::HeavyRush => Box::new(HeavyRush::default()),
            StrategyKind::RangedRush => Box::new(RangedRush::default()),
            StrategyKind::TurtleDefense => Box::new(TurtleDefense::default()),
            StrategyKind::BoomEconomy => Box::new(BoomEconomy::default()),
            StrategyKind::CounterAttack => Box::new(CounterAttack::default()),
            StrategyKind::Harass => Box::new(Harass::default()),
        }
    }
}

/// What enemy category attacks should favour
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetPriority {
    Base,
    Workers,
    Army,
}

impl TargetPriority {
    pub fn name(self) -> &'static str {
        match self {
            TargetPriority::Base => "BASE",
            TargetPriority::Workers => "WORKERS",
            TargetPriority::Army => "ARMY",
        }
    }

    pub fn parse(s: &str) -> Option<TargetPriority> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BASE" => Some(TargetPriority::Base),
            "WORKERS" => Some(TargetPriority::Workers),
            "ARMY" => Some(TargetPriority::Army),
            _ => None,
        }
    }
}
