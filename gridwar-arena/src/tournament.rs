//! Tournament orchestration - single elimination over the opponent ladder
//!
//! Each agent climbs the ladder in declared order; a matchup that is not a
//! win (majority win for multi-game pairs) eliminates it and later opponents
//! record no outcome. Every terminal outcome is journalled before elimination
//! state advances, so a restarted run skips matchups it already played.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write as IoWrite};
use std::path::Path;
use std::sync::Mutex;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Map;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::child::MatchExecutor;
use crate::matchup::{GameOutcome, GameVerdict, Matchup};
use crate::plan::{AgentSpec, TournamentPlan};
use crate::report::{
    grade_for, write_atomic, BenchmarkRun, OpponentRecord, RunEntry, ARENA_VERSION,
};
use crate::ArenaError;

const JOURNAL_FILE: &str = "progress.jsonl";

/// One terminal matchup outcome, appended to the progress journal
#[derive(Clone, Debug, Serialize, Deserialize)]
struct ProgressRecord {
    agent: String,
    opponent: String,
    game_index: u32,
    map: String,
    tick_cap: u32,
    outcome: GameOutcome,
}

/// Append-only journal shared by concurrently running ladders
struct Journal {
    file: Mutex<File>,
}

impl Journal {
    fn open(path: &Path) -> Result<Self, ArenaError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    fn append(&self, record: &ProgressRecord) {
        let line = match serde_json::to_string(record) {
            Ok(line) => line,
            Err(err) => {
                warn!("could not encode progress record: {err}");
                return;
            }
        };
        let mut file = self.file.lock().expect("journal lock");
        if let Err(err) = writeln!(file, "{line}").and_then(|_| file.flush()) {
            warn!("could not append progress record: {err}");
        }
    }
}

/// Reload journalled outcomes matching this plan's map and tick cap
fn load_journal(path: &Path, plan: &TournamentPlan) -> HashMap<(String, String, u32), GameOutcome> {
    let mut completed = HashMap::new();
    let Ok(file) = File::open(path) else {
        return completed;
    };
    for line in BufReader::new(file).lines() {
        let Ok(line) = line else { break };
        match serde_json::from_str::<ProgressRecord>(&line) {
            Ok(record) if record.map == plan.map && record.tick_cap == plan.tick_cap => {
                completed.insert(
                    (record.agent, record.opponent, record.game_index),
                    record.outcome,
                );
            }
            Ok(_) => {}
            Err(err) => warn!("skipping corrupt journal line: {err}"),
        }
    }
    completed
}

/// Run the whole plan and persist the result bundle.
///
/// Per-matchup failures (timeouts, crashes) become outcomes, not errors; the
/// only hard failures are configuration and artifact-directory problems.
pub fn run_tournament(
    plan: &TournamentPlan,
    executor: &dyn MatchExecutor,
) -> Result<BenchmarkRun, ArenaError> {
    fs::create_dir_all(&plan.artifact_dir)?;
    let logs_dir = plan.artifact_dir.join("logs");
    fs::create_dir_all(&logs_dir)?;

    let journal_path = plan.artifact_dir.join(JOURNAL_FILE);
    let completed = load_journal(&journal_path, plan);
    if !completed.is_empty() {
        info!("resuming: {} journalled matchups will be skipped", completed.len());
    }
    let journal = Journal::open(&journal_path)?;

    let entries: Vec<RunEntry> = if plan.parallelism > 1 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(plan.parallelism)
            .build()
            .map_err(|err| ArenaError::Config(err.to_string()))?;
        pool.install(|| {
            plan.agents
                .par_iter()
                .map(|agent| run_ladder(agent, plan, executor, &completed, &journal, &logs_dir))
                .collect()
        })
    } else {
        plan.agents
            .iter()
            .map(|agent| run_ladder(agent, plan, executor, &completed, &journal, &logs_dir))
            .collect()
    };

    let run = BenchmarkRun {
        arena_version: ARENA_VERSION.to_string(),
        generated: OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default(),
        map: plan.map.clone(),
        tick_cap: plan.tick_cap,
        games_per_matchup: plan.games_per_pair,
        entries,
        extra: Map::new(),
    };

    write_artifacts(plan, &run);
    Ok(run)
}

/// Climb the elimination ladder for one agent
fn run_ladder(
    agent: &AgentSpec,
    plan: &TournamentPlan,
    executor: &dyn MatchExecutor,
    completed: &HashMap<(String, String, u32), GameOutcome>,
    journal: &Journal,
    logs_dir: &Path,
) -> RunEntry {
    let mut opponents = BTreeMap::new();
    let mut score = 0.0;
    let mut eliminated_at = "cleared all".to_string();

    for opponent in &plan.opponents {
        let mut wins = 0u32;
        let mut draws = 0u32;
        let mut losses = 0u32;
        let mut points = 0.0;

        for game_index in 0..plan.games_per_pair {
            let key = (agent.class.clone(), opponent.name.clone(), game_index);
            let outcome = match completed.get(&key) {
                Some(outcome) => {
                    info!(
                        "{} vs {} game {}: journalled, skipping",
                        agent.class, opponent.name, game_index
                    );
                    outcome.clone()
                }
                None => {
                    let matchup = Matchup {
                        agent: agent.class.clone(),
                        opponent: opponent.name.clone(),
                        opponent_weight: opponent.weight,
                        map: plan.map.clone(),
                        tick_cap: plan.tick_cap,
                        budget: plan.per_game_budget,
                        game_index,
                    };
                    let log = logs_dir.join(format!(
                        "{}_vs_{}_g{}.stderr.log",
                        slug(&agent.class),
                        slug(&opponent.name),
                        game_index
                    ));
                    let outcome = executor.run(&matchup, &log);
                    journal.append(&ProgressRecord {
                        agent: agent.class.clone(),
                        opponent: opponent.name.clone(),
                        game_index,
                        map: plan.map.clone(),
                        tick_cap: plan.tick_cap,
                        outcome: outcome.clone(),
                    });
                    outcome
                }
            };

            info!(
                "{} vs {} game {}: {:?} in {} ticks",
                agent.class, opponent.name, game_index, outcome.verdict, outcome.ticks
            );
            match outcome.verdict {
                GameVerdict::Win => wins += 1,
                GameVerdict::Draw => draws += 1,
                GameVerdict::Loss | GameVerdict::Timeout | GameVerdict::Crash => losses += 1,
            }
            points += outcome.game_score(plan.tick_cap);
        }

        let weighted = points / plan.games_per_pair as f64 * opponent.weight;
        score += weighted;
        opponents.insert(
            opponent.name.clone(),
            OpponentRecord {
                wins,
                draws,
                losses,
                weighted_points: weighted,
                extra: Map::new(),
            },
        );

        // Advance only on a (majority) win
        if wins * 2 <= plan.games_per_pair {
            eliminated_at = opponent.name.clone();
            break;
        }
    }

    RunEntry {
        display_name: agent.display.clone(),
        agent_architecture: agent.architecture.clone(),
        opponents,
        score,
        grade: grade_for(score).to_string(),
        eliminated_at,
        extra: Map::new(),
    }
}

/// Persist the JSON bundle and the human report. Write failures are logged,
/// never fatal: the run result is already computed.
fn write_artifacts(plan: &TournamentPlan, run: &BenchmarkRun) {
    let stamp_format = format_description!("[year]-[month]-[day]_[hour]-[minute]-[second]");
    let stamp = OffsetDateTime::now_utc()
        .format(&stamp_format)
        .unwrap_or_else(|_| "unknown".to_string());

    let json_path = plan.artifact_dir.join(format!("benchmark_{stamp}.json"));
    match serde_json::to_vec_pretty(run) {
        Ok(bytes) => {
            if let Err(err) = write_atomic(&json_path, &bytes) {
                warn!("failed to write {}: {err}", json_path.display());
            } else {
                info!("results saved to {}", json_path.display());
            }
        }
        Err(err) => warn!("failed to encode benchmark run: {err}"),
    }

    let md_path = plan.artifact_dir.join(format!("benchmark_{stamp}.md"));
    if let Err(err) = write_atomic(&md_path, run.to_markdown().as_bytes()) {
        warn!("failed to write {}: {err}", md_path.display());
    }
}

fn slug(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
