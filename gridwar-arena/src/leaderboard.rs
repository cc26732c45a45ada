//! Leaderboard consolidation - best score per agent across historical runs
//!
//! Reads every `benchmark_*.json` in a directory, keeps the single best entry
//! per (display name, architecture) key, and writes `leaderboard.json` plus a
//! rich `leaderboard.md`. Unreadable or incomplete run files are logged and
//! skipped, never fatal. The outputs do not match the input pattern, so
//! consolidation is idempotent.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::report::{write_atomic, BenchmarkRun, OpponentRecord, ARENA_VERSION};
use crate::ArenaError;

/// One run's result for one agent, annotated with its provenance
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub display_name: String,
    pub agent_architecture: String,
    pub score: f64,
    pub grade: String,
    pub arena_version: String,
    pub eliminated_at: String,
    /// Run timestamp (RFC-3339), used for tie-breaking
    pub date: String,
    pub map: String,
    pub games_per_matchup: u32,
    pub opponents: BTreeMap<String, OpponentRecord>,
    pub source_file: String,
}

/// The consolidated output: ranked best entries plus the full history
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Leaderboard {
    pub generated: String,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub history: Vec<LeaderboardEntry>,
}

/// Consolidate all runs under `dir` and write `leaderboard.{json,md}`.
pub fn consolidate(dir: &Path) -> Result<Leaderboard, ArenaError> {
    let history = load_history(dir)?;
    info!("loaded {} entries from {}", history.len(), dir.display());

    let leaderboard = rank(best_per_key(&history));

    let board = Leaderboard {
        generated: OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default(),
        leaderboard,
        history,
    };

    let json = serde_json::to_vec_pretty(&board)?;
    write_atomic(&dir.join("leaderboard.json"), &json)?;
    write_atomic(&dir.join("leaderboard.md"), render_markdown(&board).as_bytes())?;
    Ok(board)
}

/// Parse every matching run file, tolerating bad ones
fn load_history(dir: &Path) -> Result<Vec<LeaderboardEntry>, ArenaError> {
    let mut files: Vec<_> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("benchmark_") && n.ends_with(".json"))
                .unwrap_or(false)
        })
        .collect();
    files.sort();

    let mut history = Vec::new();
    for path in files {
        let source_file = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) => {
                warn!("skipping unreadable {}: {err}", path.display());
                continue;
            }
        };
        let run: BenchmarkRun = match serde_json::from_str(&text) {
            Ok(run) => run,
            Err(err) => {
                warn!("skipping malformed {}: {err}", path.display());
                continue;
            }
        };
        for entry in run.entries {
            history.push(LeaderboardEntry {
                display_name: entry.display_name,
                agent_architecture: entry.agent_architecture,
                score: entry.score,
                grade: entry.grade,
                arena_version: run.arena_version.clone(),
                eliminated_at: entry.eliminated_at,
                date: run.generated.clone(),
                map: run.map.clone(),
                games_per_matchup: run.games_per_matchup,
                opponents: entry.opponents,
                source_file: source_file.clone(),
            });
        }
    }
    Ok(history)
}

/// Highest score per (display name, architecture); ties go to the newer run
fn best_per_key(history: &[LeaderboardEntry]) -> Vec<LeaderboardEntry> {
    let mut best: HashMap<(String, String), &LeaderboardEntry> = HashMap::new();
    for entry in history {
        let key = (entry.display_name.clone(), entry.agent_architecture.clone());
        let replace = match best.get(&key) {
            Some(current) => {
                entry.score > current.score
                    || (entry.score == current.score && entry.date > current.date)
            }
            None => true,
        };
        if replace {
            best.insert(key, entry);
        }
    }
    best.into_values().cloned().collect()
}

/// Score descending, then name ascending
fn rank(mut entries: Vec<LeaderboardEntry>) -> Vec<LeaderboardEntry> {
    entries.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.display_name.cmp(&b.display_name))
    });
    entries
}

fn render_markdown(board: &Leaderboard) -> String {
    let mut md = String::new();
    md.push_str("# GRIDWAR Leaderboard\n\n");
    md.push_str("Best benchmark score per agent across all runs.\n\n");
    md.push_str(&format!("*Generated: {}*\n\n", board.generated));

    md.push_str("## Rankings\n\n");
    md.push_str("| Rank | Agent | Score | Grade | Arena | Eliminated at |\n");
    md.push_str("|------|-------|-------|-------|-------|---------------|\n");
    for (rank, entry) in board.leaderboard.iter().enumerate() {
        let version_label = if entry.arena_version == ARENA_VERSION {
            format!("v{}", entry.arena_version)
        } else {
            format!("v{} (not comparable)", entry.arena_version)
        };
        md.push_str(&format!(
            "| {} | {} | **{:.1}** | {} | {} | {} |\n",
            rank + 1,
            entry.display_name,
            entry.score,
            entry.grade,
            version_label,
            entry.eliminated_at
        ));
    }

    md.push_str("\n## Detailed Breakdown\n\n");
    for entry in &board.leaderboard {
        md.push_str(&format!(
            "### {} - {:.1} pts ({})\n\n",
            entry.display_name, entry.score, entry.grade
        ));
        md.push_str(&format!("- **Date:** {}\n", &entry.date));
        md.push_str(&format!("- **Arena version:** v{}\n", entry.arena_version));
        md.push_str(&format!("- **Map:** `{}`\n", entry.map));
        md.push_str(&format!("- **Games per matchup:** {}\n", entry.games_per_matchup));
        md.push_str(&format!("- **Source:** `{}`\n\n", entry.source_file));

        if !entry.opponents.is_empty() {
            md.push_str("| Opponent | W | D | L | Weighted Pts |\n");
            md.push_str("|----------|---|---|---|-------------|\n");
            for (name, record) in &entry.opponents {
                md.push_str(&format!(
                    "| {} | {} | {} | {} | {:.1} |\n",
                    name, record.wins, record.draws, record.losses, record.weighted_points
                ));
            }
            md.push('\n');
        }
    }

    md.push_str("## Grade Scale\n\n");
    md.push_str("| Grade | Score Range |\n|-------|-------------|\n");
    md.push_str("| A+ | 90-100 |\n| A | 80-89 |\n| B | 70-79 |\n| C | 60-69 |\n| D | 40-59 |\n| F | 0-39 |\n\n");

    md.push_str("## Version Notes\n\n");
    md.push_str(&format!(
        "Current arena version is v{ARENA_VERSION}. Scores from other versions use \
         different opponent sets or weights and are **not directly comparable**; \
         they are marked in the rankings above.\n"
    ));
    md
}
