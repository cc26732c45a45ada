//! Consolidate command - historical runs to one leaderboard

use std::path::PathBuf;

use clap::Args;

use gridwar_arena::{consolidate, ArenaError};

use crate::CliError;

#[derive(Args)]
pub struct ConsolidateArgs {
    /// Directory holding benchmark_*.json run files
    #[arg(long, default_value = "benchmark_results")]
    pub dir: PathBuf,
}

pub fn run(args: ConsolidateArgs) -> Result<(), CliError> {
    if !args.dir.is_dir() {
        return Err(CliError::Config(format!(
            "artifact directory '{}' does not exist",
            args.dir.display()
        )));
    }

    let board = consolidate(&args.dir).map_err(|err| match err {
        ArenaError::Config(msg) => CliError::Config(msg),
        other => CliError::Other(anyhow::Error::new(other)),
    })?;

    println!(
        "Consolidated {} entries into {} ranked agents",
        board.history.len(),
        board.leaderboard.len()
    );
    for entry in &board.leaderboard {
        println!(
            "  {}: {:.1} ({}) [v{}]",
            entry.display_name, entry.score, entry.grade, entry.arena_version
        );
    }
    println!("Written: {}", args.dir.join("leaderboard.json").display());
    println!("Written: {}", args.dir.join("leaderboard.md").display());

    Ok(())
}
