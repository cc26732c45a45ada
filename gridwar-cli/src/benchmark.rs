//! Benchmark command - plan assembly, prerequisite checks, tournament run

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

use gridwar_arena::{
    default_ladder, run_tournament, AgentSpec, ArenaError, BenchmarkRun, ModelEnv, Opponent,
    ProcessExecutor, TournamentPlan,
};
use gridwar_sim::GameMap;

use crate::registry;
use crate::CliError;

#[derive(Args)]
pub struct BenchmarkArgs {
    /// Games per matchup
    #[arg(long, default_value = "1")]
    pub games: u32,

    /// Comma-separated agent classes, or "all" for the LLM contestants
    #[arg(long, default_value = "all")]
    pub agents: String,

    /// Ordered comma-separated opponent ladder, entries "name" or
    /// "name:weight" (default: the built-in reference ladder)
    #[arg(long)]
    pub opponents: Option<String>,

    /// Map file, or "default" for the built-in 8x8 map
    #[arg(long, default_value = "default")]
    pub map: String,

    /// Tick cap per game
    #[arg(long, default_value = "3000")]
    pub tick_cap: u32,

    /// Wall-clock budget per game, in seconds
    #[arg(long, default_value = "900")]
    pub budget_seconds: u64,

    /// Artifact directory (also the resume journal location)
    #[arg(long, default_value = "benchmark_results")]
    pub artifacts: PathBuf,

    /// Matchups to run in parallel (keep at 1 when one model backend is shared)
    #[arg(long, default_value = "1")]
    pub parallel: usize,

    /// Override the game-runner program (default: this binary)
    #[arg(long)]
    pub runner: Option<PathBuf>,
}

pub fn run(args: BenchmarkArgs, _seed: Option<u64>) -> Result<(), CliError> {
    let plan = build_plan(&args)?;
    plan.validate(registry::KNOWN_AGENTS).map_err(config_error)?;

    check_map(&args.map)?;
    check_model_backend(&plan)?;

    let executor = build_executor(&args)?;

    print_banner(&plan);
    let run = run_tournament(&plan, &executor).map_err(|err| match err {
        ArenaError::Config(msg) => CliError::Config(msg),
        other => CliError::Other(anyhow::Error::new(other)),
    })?;
    print_results(&run);

    Ok(())
}

fn config_error(err: ArenaError) -> CliError {
    CliError::Config(err.to_string())
}

fn build_plan(args: &BenchmarkArgs) -> Result<TournamentPlan, CliError> {
    let classes: Vec<String> = if args.agents.trim() == "all" {
        registry::CONTESTANTS.iter().map(|s| s.to_string()).collect()
    } else {
        args.agents
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    };

    let agents = classes
        .iter()
        .map(|class| {
            AgentSpec::new(
                class.clone(),
                registry::display_name(class),
                registry::architecture(class),
            )
        })
        .collect();

    let opponents = match &args.opponents {
        Some(spec) => parse_opponents(spec)?,
        None => default_ladder(),
    };

    Ok(TournamentPlan {
        agents,
        opponents,
        map: args.map.clone(),
        tick_cap: args.tick_cap,
        games_per_pair: args.games,
        per_game_budget: Duration::from_secs(args.budget_seconds),
        artifact_dir: args.artifacts.clone(),
        parallelism: args.parallel,
    })
}

/// Parse "name" / "name:weight" entries, declared order = elimination order
fn parse_opponents(spec: &str) -> Result<Vec<Opponent>, CliError> {
    let mut opponents = Vec::new();
    for token in spec.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let (name, weight) = match token.split_once(':') {
            Some((name, weight)) => {
                let weight: f64 = weight
                    .parse()
                    .map_err(|_| CliError::Config(format!("bad opponent weight in '{token}'")))?;
                (name, weight)
            }
            None => (token, 10.0),
        };
        opponents.push(Opponent::new(name, weight));
    }
    if opponents.is_empty() {
        return Err(CliError::Config("empty opponent list".into()));
    }
    Ok(opponents)
}

fn check_map(map: &str) -> Result<(), CliError> {
    if map == "default" {
        return Ok(());
    }
    GameMap::load(std::path::Path::new(map))
        .map(|_| ())
        .map_err(|err| CliError::Config(format!("cannot load map '{map}': {err}")))
}

/// LLM agents need a reachable model backend before any matchup spawns
fn check_model_backend(plan: &TournamentPlan) -> Result<(), CliError> {
    let needs_model = plan
        .agents
        .iter()
        .any(|agent| registry::is_llm_class(&agent.class));
    if !needs_model {
        return Ok(());
    }

    if std::env::var("MODEL_NAME").is_err() {
        return Err(CliError::Config(
            "MODEL_NAME must be set when benchmarking LLM agents".into(),
        ));
    }

    let host =
        std::env::var("MODEL_HOST").unwrap_or_else(|_| gridwar_llm::client::DEFAULT_HOST.into());
    let probe = ureq::AgentBuilder::new()
        .timeout(Duration::from_secs(5))
        .build()
        .get(&host)
        .call();
    match probe {
        Ok(_) => Ok(()),
        Err(ureq::Error::Status(_, _)) => Ok(()), // host answered: reachable
        Err(err) => Err(CliError::Prereq(format!(
            "model backend {host} unreachable: {err}"
        ))),
    }
}

fn build_executor(args: &BenchmarkArgs) -> Result<ProcessExecutor, CliError> {
    let program = match &args.runner {
        Some(path) => path.clone(),
        None => std::env::current_exe()
            .map_err(|err| CliError::Other(anyhow::anyhow!("cannot locate own binary: {err}")))?,
    };
    let model_env = ModelEnv {
        host: std::env::var("MODEL_HOST")
            .unwrap_or_else(|_| gridwar_llm::client::DEFAULT_HOST.into()),
        model: std::env::var("MODEL_NAME").unwrap_or_else(|_| "unset".into()),
        model_p2: std::env::var("MODEL_NAME_P2").ok(),
    };
    Ok(ProcessExecutor::new(
        program,
        vec!["game-runner".to_string()],
        model_env,
    ))
}

fn print_banner(plan: &TournamentPlan) {
    println!("{}", "=".repeat(60));
    println!("GRIDWAR Benchmark v{}", gridwar_arena::ARENA_VERSION);
    println!("{}", "=".repeat(60));
    println!("Map: {}", plan.map);
    println!("Tick cap: {}", plan.tick_cap);
    println!("Games per matchup: {}", plan.games_per_pair);
    println!("Format: single elimination");
    print!("Ladder:");
    for opponent in &plan.opponents {
        print!(" {} ({} pts)", opponent.name, opponent.weight);
    }
    println!("\n");
}

fn print_results(run: &BenchmarkRun) {
    println!("{}", "=".repeat(60));
    println!("BENCHMARK RESULTS");
    println!("{}", "=".repeat(60));
    println!("{:<6}{:<35}{:<10}{}", "Rank", "Agent", "Score", "Grade");
    println!("{}", "-".repeat(60));

    let mut ranked: Vec<_> = run.entries.iter().collect();
    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    for (rank, entry) in ranked.iter().enumerate() {
        println!(
            "{:<6}{:<35}{:<10.1}{}",
            rank + 1,
            entry.display_name,
            entry.score,
            entry.grade
        );
    }
    println!();
    for entry in ranked {
        println!("{}: eliminated at {}", entry.display_name, entry.eliminated_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_opponents_with_weights() {
        let ladder = parse_opponents("random-biased:10, worker-rush:15,heavy-rush:20").unwrap();
        assert_eq!(ladder.len(), 3);
        assert_eq!(ladder[0].name, "random-biased");
        assert_eq!(ladder[0].weight, 10.0);
        assert_eq!(ladder[2].weight, 20.0);
    }

    #[test]
    fn test_parse_opponents_default_weight() {
        let ladder = parse_opponents("worker-rush").unwrap();
        assert_eq!(ladder[0].weight, 10.0);
    }

    #[test]
    fn test_parse_opponents_bad_weight() {
        assert!(matches!(
            parse_opponents("worker-rush:heavy"),
            Err(CliError::Config(_))
        ));
        assert!(matches!(parse_opponents(" , "), Err(CliError::Config(_))));
    }

    #[test]
    fn test_build_plan_all_selects_contestants() {
        let args = BenchmarkArgs {
            games: 1,
            agents: "all".into(),
            opponents: None,
            map: "default".into(),
            tick_cap: 3000,
            budget_seconds: 900,
            artifacts: PathBuf::from("/tmp/x"),
            parallel: 1,
            runner: None,
        };
        let plan = build_plan(&args).unwrap();
        assert_eq!(plan.agents.len(), registry::CONTESTANTS.len());
        assert_eq!(plan.opponents.len(), 5);
    }

    #[test]
    fn test_build_plan_explicit_agents() {
        let args = BenchmarkArgs {
            games: 3,
            agents: "worker-rush, mcts-llm".into(),
            opponents: Some("random-biased:10".into()),
            map: "default".into(),
            tick_cap: 1500,
            budget_seconds: 60,
            artifacts: PathBuf::from("/tmp/x"),
            parallel: 1,
            runner: None,
        };
        let plan = build_plan(&args).unwrap();
        assert_eq!(plan.agents.len(), 2);
        assert_eq!(plan.agents[0].class, "worker-rush");
        assert_eq!(plan.agents[0].architecture, "Scripted");
        assert_eq!(plan.games_per_pair, 3);
    }
}
