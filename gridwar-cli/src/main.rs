//! GRIDWAR CLI - benchmark arena entry point
//!
//! ## Commands
//!
//! - `benchmark`: run the elimination tournament and write result artifacts
//! - `consolidate`: fold historical runs into one leaderboard
//! - `game-runner`: child entry spoken to by the orchestrator (env contract)
//! - `proxy`: serve the local model protocol backed by a cloud provider
//!
//! Exit codes: 0 clean completion (per-matchup failures included), 2
//! configuration error, 3 missing prerequisites.

mod benchmark;
mod consolidate;
mod game_runner;
mod proxy_cmd;
mod registry;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "gridwar")]
#[command(version, about = "GRIDWAR LLM benchmark arena")]
#[command(long_about = "GRIDWAR benchmarks LLM-guided agents against a fixed ladder of \
    reference opponents in a small RTS. Scores are reference-based and comparable \
    across runs; historical results consolidate into a single leaderboard.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Random seed for reproducibility
    #[arg(long, global = true)]
    seed: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the benchmark tournament
    Benchmark(benchmark::BenchmarkArgs),

    /// Consolidate historical runs into a leaderboard
    Consolidate(consolidate::ConsolidateArgs),

    /// Play one game from environment variables (spawned by `benchmark`)
    #[command(name = "game-runner")]
    GameRunner,

    /// Serve the local model protocol backed by a hosted provider
    Proxy(proxy_cmd::ProxyArgs),
}

/// Failure classes with distinct exit codes
#[derive(Debug)]
pub enum CliError {
    /// Bad flags, unknown classes, broken plan: exit 2
    Config(String),
    /// Environment not ready (model backend unreachable): exit 3
    Prereq(String),
    /// Everything else: exit 1
    Other(anyhow::Error),
}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::Other(err)
    }
}

fn main() {
    let cli = Cli::parse();

    initialize_logging(cli.verbose);

    let code = match dispatch(cli) {
        Ok(()) => 0,
        Err(CliError::Config(msg)) => {
            tracing::error!("configuration error: {msg}");
            2
        }
        Err(CliError::Prereq(msg)) => {
            tracing::error!("missing prerequisite: {msg}");
            3
        }
        Err(CliError::Other(err)) => {
            tracing::error!("{err:#}");
            1
        }
    };
    std::process::exit(code);
}

/// Logging goes to stderr: stdout belongs to reports and, in the game
/// runner, to the RESULT wire protocol.
fn initialize_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("gridwar=debug,info")
    } else {
        EnvFilter::new("gridwar=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn dispatch(cli: Cli) -> Result<(), CliError> {
    let seed = cli.seed;

    match cli.command {
        Commands::Benchmark(args) => benchmark::run(args, seed),
        Commands::Consolidate(args) => consolidate::run(args),
        Commands::GameRunner => game_runner::run(seed).map_err(CliError::Other),
        Commands::Proxy(args) => proxy_cmd::run(args),
    }
}
