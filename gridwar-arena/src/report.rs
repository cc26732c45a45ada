//! Benchmark run artifacts - JSON schema, markdown report, atomic writes

use std::collections::BTreeMap;
use std::path::Path;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::ArenaError;

/// Version stamp carried by every artifact. Runs from different versions are
/// never directly compared.
pub const ARENA_VERSION: &str = "2.0";

/// Backoff before the single artifact-write retry
const WRITE_RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// Per-opponent aggregate within one run entry
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OpponentRecord {
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    pub weighted_points: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One benchmarked agent's results
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunEntry {
    pub display_name: String,
    pub agent_architecture: String,
    pub opponents: BTreeMap<String, OpponentRecord>,
    pub score: f64,
    pub grade: String,
    /// Name of the opponent that stopped the run, or "cleared all"
    pub eliminated_at: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A complete benchmark run artifact
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BenchmarkRun {
    pub arena_version: String,
    /// RFC-3339 timestamp
    pub generated: String,
    pub map: String,
    pub tick_cap: u32,
    pub games_per_matchup: u32,
    pub entries: Vec<RunEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Letter grade from the fixed score bands
pub fn grade_for(score: f64) -> &'static str {
    if score >= 90.0 {
        "A+"
    } else if score >= 80.0 {
        "A"
    } else if score >= 70.0 {
        "B"
    } else if score >= 60.0 {
        "C"
    } else if score >= 40.0 {
        "D"
    } else {
        "F"
    }
}

impl BenchmarkRun {
    /// Human-readable report for one run
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        md.push_str("# GRIDWAR Benchmark Run\n\n");
        md.push_str(&format!("*Generated: {}*\n\n", self.generated));
        md.push_str(&format!(
            "- **Arena version:** v{}\n- **Map:** `{}`\n- **Tick cap:** {}\n- **Games per matchup:** {}\n\n",
            self.arena_version, self.map, self.tick_cap, self.games_per_matchup
        ));

        md.push_str("## Rankings\n\n");
        md.push_str("| Rank | Agent | Score | Grade | Eliminated at |\n");
        md.push_str("|------|-------|-------|-------|---------------|\n");
        let mut ranked: Vec<&RunEntry> = self.entries.iter().collect();
        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.display_name.cmp(&b.display_name))
        });
        for (rank, entry) in ranked.iter().enumerate() {
            md.push_str(&format!(
                "| {} | {} | **{:.1}** | {} | {} |\n",
                rank + 1,
                entry.display_name,
                entry.score,
                entry.grade,
                entry.eliminated_at
            ));
        }

        md.push_str("\n## Detailed Breakdown\n\n");
        for entry in ranked {
            md.push_str(&format!(
                "### {} - {:.1} pts ({})\n\n",
                entry.display_name, entry.score, entry.grade
            ));
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

        md.push_str("## Grade Scale\n\n");
        md.push_str("| Grade | Score |\n|-------|-------|\n");
        md.push_str("| A+ | 90-100 |\n| A | 80-89 |\n| B | 70-79 |\n| C | 60-69 |\n| D | 40-59 |\n| F | 0-39 |\n");
        md
    }
}

/// Write bytes under a temp name in the target directory, then atomically
/// rename into place. One retry with a short backoff; the caller logs and
/// continues on final failure.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), ArenaError> {
    match try_write_atomic(path, contents) {
        Ok(()) => Ok(()),
        Err(first) => {
            warn!("artifact write failed, retrying: {first}");
            thread::sleep(WRITE_RETRY_BACKOFF);
            try_write_atomic(path, contents)
        }
    }
}

fn try_write_atomic(path: &Path, contents: &[u8]) -> Result<(), ArenaError> {
    let dir = path
        .parent()
        .ok_or_else(|| ArenaError::Config(format!("artifact path has no parent: {}", path.display())))?;
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    std::io::Write::write_all(&mut file, contents)?;
    file.persist(path)
        .map_err(|persist| ArenaError::Io(persist.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_run() -> BenchmarkRun {
        let mut opponents = BTreeMap::new();
        opponents.insert(
            "random-biased".to_string(),
            OpponentRecord {
                wins: 1,
                draws: 0,
                losses: 0,
                weighted_points: 12.0,
                extra: Map::new(),
            },
        );
        BenchmarkRun {
            arena_version: ARENA_VERSION.to_string(),
            generated: "2026-08-01T10:00:00Z".to_string(),
            map: "default".to_string(),
            tick_cap: 1500,
            games_per_matchup: 1,
            entries: vec![RunEntry {
                display_name: "llama3.1:8b (Search+LLM)".to_string(),
                agent_architecture: "Search+LLM".to_string(),
                opponents,
                score: 12.0,
                grade: grade_for(12.0).to_string(),
                eliminated_at: "worker-rush".to_string(),
                extra: Map::new(),
            }],
            extra: Map::new(),
        }
    }

    #[test]
    fn test_grade_bands() {
        assert_eq!(grade_for(95.0), "A+");
        assert_eq!(grade_for(90.0), "A+");
        assert_eq!(grade_for(85.0), "A");
        assert_eq!(grade_for(72.0), "B");
        assert_eq!(grade_for(60.0), "C");
        assert_eq!(grade_for(41.5), "D");
        assert_eq!(grade_for(12.0), "F");
        assert_eq!(grade_for(0.0), "F");
    }

    #[test]
    fn test_round_trip_preserves_unknown_fields() {
        let raw = json!({
            "arena_version": "2.0",
            "generated": "2026-08-01T10:00:00Z",
            "map": "default",
            "tick_cap": 1500,
            "games_per_matchup": 1,
            "entries": [{
                "display_name": "m",
                "agent_architecture": "Hybrid",
                "opponents": {
                    "random-biased": {"wins": 1, "draws": 0, "losses": 0,
                                       "weighted_points": 12.0, "avg_latency_ms": 8}
                },
                "score": 12.0,
                "grade": "F",
                "eliminated_at": "cleared all",
                "notes": "first run"
            }],
            "head_to_head": []
        });

        let run: BenchmarkRun = serde_json::from_value(raw.clone()).unwrap();
        let back = serde_json::to_value(&run).unwrap();
        assert_eq!(back, raw);
    }

    #[test]
    fn test_markdown_contains_rankings_and_grades() {
        let md = sample_run().to_markdown();
        assert!(md.contains("## Rankings"));
        assert!(md.contains("llama3.1:8b (Search+LLM)"));
        assert!(md.contains("| F |") || md.contains(" F "));
        assert!(md.contains("Grade Scale"));
    }

    #[test]
    fn test_write_atomic_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("benchmark_test.json");
        write_atomic(&path, b"{\"ok\": true}").unwrap();
        let read = std::fs::read_to_string(&path).unwrap();
        assert_eq!(read, "{\"ok\": true}");

        // No stray temp files left behind
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path() != path)
            .collect();
        assert!(leftovers.is_empty());
    }
}
