//! GRIDWAR Arena - benchmark orchestration
//!
//! This crate turns a declarative matchup plan into durable artifacts:
//! - Single-elimination tournament over an ordered opponent ladder
//! - Isolated game-runner child processes with wall-clock enforcement
//! - Reference-based scoring with efficiency bonuses
//! - Atomic JSON + Markdown artifacts, resumable via a progress journal
//! - Consolidation of historical runs into one ranked leaderboard
//!
//! The arena never talks to a model itself; children do, through their own
//! environment.

pub mod child;
pub mod leaderboard;
pub mod matchup;
pub mod plan;
pub mod report;
pub mod tournament;

pub use child::{MatchExecutor, ModelEnv, ProcessExecutor};
pub use leaderboard::{consolidate, Leaderboard, LeaderboardEntry};
pub use matchup::{GameOutcome, GameVerdict, Matchup};
pub use plan::{default_ladder, AgentSpec, Opponent, TournamentPlan};
pub use report::{grade_for, BenchmarkRun, OpponentRecord, RunEntry, ARENA_VERSION};
pub use tournament::run_tournament;

use thiserror::Error;

/// Arena-level failures. Configuration errors abort before any matchup runs;
/// everything else is logged and survived.
#[derive(Debug, Error)]
pub enum ArenaError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("artifact I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("artifact encoding error: {0}")]
    Json(#[from] serde_json::Error),
}
