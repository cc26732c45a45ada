//! Declarative tournament plans

use std::path::PathBuf;
use std::time::Duration;

use crate::ArenaError;

/// An agent under benchmark: the registry class to instantiate plus the
/// labels reports and the leaderboard key use.
#[derive(Clone, Debug)]
pub struct AgentSpec {
    /// Registry name handed to the game runner (`AGENT_CLASS`)
    pub class: String,
    /// Display name, usually model + architecture ("llama3.1:8b (Hybrid)")
    pub display: String,
    /// Architecture label ("Scripted", "Hybrid", "Search+LLM")
    pub architecture: String,
}

impl AgentSpec {
    pub fn new(
        class: impl Into<String>,
        display: impl Into<String>,
        architecture: impl Into<String>,
    ) -> Self {
        Self {
            class: class.into(),
            display: display.into(),
            architecture: architecture.into(),
        }
    }
}

/// One rung of the elimination ladder
#[derive(Clone, Debug)]
pub struct Opponent {
    pub name: String,
    /// Scoring weight: points available for beating this opponent
    pub weight: f64,
}

impl Opponent {
    pub fn new(name: impl Into<String>, weight: f64) -> Self {
        Self {
            name: name.into(),
            weight,
        }
    }
}

/// The fixed reference ladder, easiest first. Weights sum to 80; efficiency
/// bonuses can push a perfect run close to 100.
pub fn default_ladder() -> Vec<Opponent> {
    vec![
        Opponent::new("random-biased", 10.0),
        Opponent::new("worker-rush", 15.0),
        Opponent::new("light-rush", 15.0),
        Opponent::new("heavy-rush", 20.0),
        Opponent::new("ranged-rush", 20.0),
    ]
}

/// Everything the orchestrator needs to run one benchmark
#[derive(Clone, Debug)]
pub struct TournamentPlan {
    /// Agents to benchmark
    pub agents: Vec<AgentSpec>,
    /// Elimination order: the agent must beat each to reach the next
    pub opponents: Vec<Opponent>,
    /// Map identifier handed to children (path or "default")
    pub map: String,
    pub tick_cap: u32,
    pub games_per_pair: u32,
    /// Wall-clock budget per game
    pub per_game_budget: Duration,
    pub artifact_dir: PathBuf,
    /// Maximum matchups in flight (default 1: a single model backend is shared)
    pub parallelism: usize,
}

impl TournamentPlan {
    /// Fail fast on anything that would invalidate the whole run.
    /// `known_agents` comes from the caller's registry.
    pub fn validate(&self, known_agents: &[&str]) -> Result<(), ArenaError> {
        if self.agents.is_empty() {
            return Err(ArenaError::Config("no agents selected".into()));
        }
        if self.opponents.is_empty() {
            return Err(ArenaError::Config("opponent ladder is empty".into()));
        }
        for agent in &self.agents {
            if !known_agents.contains(&agent.class.as_str()) {
                return Err(ArenaError::Config(format!(
                    "unknown agent class '{}'",
                    agent.class
                )));
            }
        }
        for opponent in &self.opponents {
            if !known_agents.contains(&opponent.name.as_str()) {
                return Err(ArenaError::Config(format!(
                    "unknown opponent class '{}'",
                    opponent.name
                )));
            }
            if opponent.weight <= 0.0 {
                return Err(ArenaError::Config(format!(
                    "opponent '{}' has non-positive weight",
                    opponent.name
                )));
            }
        }
        if self.tick_cap == 0 {
            return Err(ArenaError::Config("tick cap must be positive".into()));
        }
        if self.games_per_pair == 0 {
            return Err(ArenaError::Config("games per pair must be positive".into()));
        }
        if self.per_game_budget.is_zero() {
            return Err(ArenaError::Config("per-game budget must be positive".into()));
        }
        if self.parallelism == 0 {
            return Err(ArenaError::Config("parallelism must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KNOWN: &[&str] = &[
        "random-biased",
        "worker-rush",
        "light-rush",
        "heavy-rush",
        "ranged-rush",
        "mcts-llm",
    ];

    fn plan() -> TournamentPlan {
        TournamentPlan {
            agents: vec![AgentSpec::new("mcts-llm", "m (Search+LLM)", "Search+LLM")],
            opponents: default_ladder(),
            map: "default".into(),
            tick_cap: 3000,
            games_per_pair: 1,
            per_game_budget: Duration::from_secs(900),
            artifact_dir: PathBuf::from("/tmp/arena"),
            parallelism: 1,
        }
    }

    #[test]
    fn test_valid_plan() {
        assert!(plan().validate(KNOWN).is_ok());
    }

    #[test]
    fn test_unknown_agent_rejected() {
        let mut p = plan();
        p.agents = vec![AgentSpec::new("skynet", "skynet", "AGI")];
        let err = p.validate(KNOWN).unwrap_err();
        assert!(matches!(err, ArenaError::Config(_)));
        assert!(err.to_string().contains("skynet"));
    }

    #[test]
    fn test_unknown_opponent_rejected() {
        let mut p = plan();
        p.opponents.push(Opponent::new("final-boss", 50.0));
        assert!(p.validate(KNOWN).is_err());
    }

    #[test]
    fn test_zero_values_rejected() {
        let mut p = plan();
        p.tick_cap = 0;
        assert!(p.validate(KNOWN).is_err());

        let mut p = plan();
        p.games_per_pair = 0;
        assert!(p.validate(KNOWN).is_err());

        let mut p = plan();
        p.per_game_budget = Duration::ZERO;
        assert!(p.validate(KNOWN).is_err());
    }

    #[test]
    fn test_default_ladder_ordering() {
        let ladder = default_ladder();
        assert_eq!(ladder.len(), 5);
        assert_eq!(ladder[0].name, "random-biased");
        let total: f64 = ladder.iter().map(|o| o.weight).sum();
        assert_eq!(total, 80.0);
    }
}
