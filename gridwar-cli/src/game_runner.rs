//! Game runner - the child half of the orchestrator contract
//!
//! Parameters arrive through environment variables (`AGENT_CLASS`,
//! `OPPONENT_CLASS`, `MAP`, `TICK_CAP`, model configuration). The loop is
//! strictly synchronous: both sides decide every tick (consulting interval 1,
//! the contract-fair setting), then the simulator advances exactly once. A
//! slow agent slows the game down; it never loses its turn.
//!
//! The single stdout line `RESULT winner=<0|1|draw> ticks=<N> agent_side=<0|1>`
//! is the wire protocol; everything else goes to stderr.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use gridwar_sim::{GameMap, GameResult, GameState, Side};

use crate::registry;

pub fn run(seed: Option<u64>) -> Result<()> {
    let agent_class = std::env::var("AGENT_CLASS").context("AGENT_CLASS is not set")?;
    let opponent_class = std::env::var("OPPONENT_CLASS").context("OPPONENT_CLASS is not set")?;
    let map_spec = std::env::var("MAP").unwrap_or_else(|_| "default".to_string());
    let tick_cap: u32 = std::env::var("TICK_CAP")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let seed = seed.unwrap_or(42);

    let mut state = load_state(&map_spec)?;

    // The benchmarked agent always plays side 0
    let mut agent = registry::build_agent(&agent_class, seed, None)
        .with_context(|| format!("building agent '{agent_class}'"))?;
    let p2_model = std::env::var("MODEL_NAME_P2").ok();
    let mut opponent = registry::build_agent(&opponent_class, seed.wrapping_add(1), p2_model.as_deref())
        .with_context(|| format!("building opponent '{opponent_class}'"))?;

    info!(
        "game start: {} vs {} on {} (tick cap {})",
        agent.name(),
        opponent.name(),
        map_spec,
        tick_cap
    );

    while state.result() == GameResult::Ongoing && state.tick() < tick_cap {
        let ours = agent.get_action(Side::P0, &state);
        let theirs = opponent.get_action(Side::P1, &state);
        state.advance(&ours, &theirs);
    }

    let winner = match state.result() {
        GameResult::Winner(Side::P0) => "0",
        GameResult::Winner(Side::P1) => "1",
        GameResult::Ongoing | GameResult::Draw => "draw",
    };

    info!("game over: winner={winner} ticks={}", state.tick());
    let agent_stats = agent.statistics();
    if !agent_stats.is_empty() {
        info!("agent stats: {agent_stats}");
    }
    let opponent_stats = opponent.statistics();
    if !opponent_stats.is_empty() {
        info!("opponent stats: {opponent_stats}");
    }

    // The one line the orchestrator parses
    println!("RESULT winner={winner} ticks={} agent_side=0", state.tick());
    Ok(())
}

fn load_state(map_spec: &str) -> Result<GameState> {
    if map_spec == "default" {
        return Ok(GameState::bases_workers_8x8());
    }
    let map = GameMap::load(Path::new(map_spec))
        .with_context(|| format!("loading map '{map_spec}'"))?;
    Ok(GameState::from_map(&map))
}
