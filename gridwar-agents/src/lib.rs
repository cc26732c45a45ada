//! GRIDWAR Agents - game players
//!
//! This crate provides:
//! - The `Agent` capability every game player implements
//! - The `GameStrategy` capability for deterministic per-tick rule strategies
//! - Eight named rule strategies (rushes, defense, economy, harassment)
//! - The hybrid LLM agent: a finite state machine over rule strategies whose
//!   transitions and tactical parameters come from periodic LLM consultations
//! - Baseline opponents (random-biased sampler, scripted strategy wrappers)

pub mod baseline;
pub mod defense;
pub mod economy;
pub mod hybrid;
pub mod rushes;
pub mod strategy;
pub mod tactics;

pub use baseline::{biased_action, RandomBiased, ScriptedAgent};
pub use hybrid::{HybridAgent, HybridConfig};
pub use strategy::{GameStrategy, StrategyKind, TargetPriority};

use gridwar_sim::{GameState, PlayerAction, Side};

/// A game player: one decision per tick, resettable between games.
pub trait Agent: Send {
    /// Display name used in logs and reports
    fn name(&self) -> &str;

    /// Produce this side's joint action for the current tick. Never blocks
    /// the simulator beyond its own latency; an empty action is always legal.
    fn get_action(&mut self, side: Side, state: &GameState) -> PlayerAction;

    /// Clear per-game state before a new game
    fn reset(&mut self) {}

    /// Operator-facing statistics (consultations, errors, degraded flags)
    fn statistics(&self) -> String {
        String::new()
    }
}
