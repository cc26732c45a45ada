//! GRIDWAR MCTS - LLM-informed tree search
//!
//! This crate provides the search-based agent:
//! - Policy prior cache: situation-classified action weights, seeded with
//!   built-in defaults and refreshed from the model
//! - Strategic evaluation: goal-weighted material scoring in [-1, 1]
//! - Arena-allocated search tree with per-unit local statistics
//! - Epsilon-greedy informed search under a wall-clock budget
//! - The `SearchAgent` tying it all together with scheduled, non-blocking
//!   model refreshes

pub mod agent;
pub mod eval;
pub mod priors;
pub mod refresh;
pub mod rollout;
pub mod search;
pub mod tree;

pub use agent::SearchAgent;
pub use eval::{StrategicEvaluator, StrategicGoal};
pub use priors::{classify_situation, PolicyPriorCache, PriorTable, Situation};
pub use search::{run_search, SearchError, SearchOutcome};
pub use tree::{Candidate, Node, NodeId, Tree};

use gridwar_llm::env_ticks;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// All search and refresh knobs in one place.
///
/// Constructed explicitly in tests, or via [`SearchConfig::from_env`] in the
/// game runner (`MCTS_PRIOR_CACHE_TICKS`, `MCTS_GOAL_CACHE_TICKS`).
#[derive(Clone, Debug)]
pub struct SearchConfig {
    /// Wall-clock budget per decision, in milliseconds
    pub time_budget_ms: u64,
    /// Optional hard cap on iterations (tests, deterministic benchmarks)
    pub iteration_cap: Option<u64>,
    /// Playout lookahead in ticks
    pub lookahead: u32,
    /// Maximum tree depth before a node counts as a leaf
    pub max_depth: u32,
    /// Probability of expanding an unexpanded candidate
    pub epsilon_0: f64,
    /// Probability of descending by local per-unit value
    pub epsilon_local: f64,
    /// Global-bandit exploration: probability of a uniformly random child
    /// instead of the global-value maximizer
    pub epsilon_global: f64,
    /// How many joint-action candidates to sample per node
    pub candidate_width: usize,
    /// Ticks between policy-prior refreshes
    pub prior_interval: u32,
    /// Ticks between strategic-goal refreshes
    pub goal_interval: u32,
    /// Tick cap, used to phrase the game phase in prompts
    pub tick_cap: u32,
    /// Seed for the search RNG
    pub seed: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            time_budget_ms: 200,
            iteration_cap: None,
            lookahead: 100,
            max_depth: 10,
            epsilon_0: 0.4,
            epsilon_local: 0.3,
            epsilon_global: 0.0,
            candidate_width: 12,
            prior_interval: 300,
            goal_interval: 500,
            tick_cap: 3000,
            seed: 42,
        }
    }
}

impl SearchConfig {
    /// Default configuration with the refresh windows and tick cap read from
    /// the environment.
    pub fn from_env() -> Self {
        Self {
            prior_interval: env_ticks("MCTS_PRIOR_CACHE_TICKS", 300),
            goal_interval: env_ticks("MCTS_GOAL_CACHE_TICKS", 500),
            tick_cap: env_ticks("TICK_CAP", 3000),
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = SearchConfig::default();
        assert_eq!(config.time_budget_ms, 200);
        assert_eq!(config.lookahead, 100);
        assert_eq!(config.max_depth, 10);
        assert_eq!(config.epsilon_0, 0.4);
        assert_eq!(config.epsilon_local, 0.3);
        assert_eq!(config.epsilon_global, 0.0);
        assert_eq!(config.prior_interval, 300);
        assert_eq!(config.goal_interval, 500);
    }

    #[test]
    fn test_config_with_seed() {
        let config = SearchConfig::default().with_seed(7);
        assert_eq!(config.seed, 7);
    }
}
