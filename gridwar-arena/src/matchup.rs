//! Matchups and their outcomes

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A planned game: immutable once scheduled
#[derive(Clone, Debug)]
pub struct Matchup {
    pub agent: String,
    pub opponent: String,
    pub opponent_weight: f64,
    pub map: String,
    pub tick_cap: u32,
    /// Wall-clock budget for the child process
    pub budget: Duration,
    pub game_index: u32,
}

/// How a matchup ended, from the benchmarked agent's perspective
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameVerdict {
    Win,
    Draw,
    Loss,
    Timeout,
    Crash,
}

/// Outcome record produced by one matchup
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameOutcome {
    pub verdict: GameVerdict,
    pub ticks: u32,
    /// Winning side (0/1), absent on draw/timeout/crash
    pub winner_side: Option<u8>,
    /// Populated for crashes: exit status and last stderr line
    pub crash_reason: Option<String>,
}

impl GameOutcome {
    pub fn timeout(tick_cap: u32) -> Self {
        Self {
            verdict: GameVerdict::Timeout,
            ticks: tick_cap,
            winner_side: None,
            crash_reason: None,
        }
    }

    pub fn crash(reason: impl Into<String>) -> Self {
        Self {
            verdict: GameVerdict::Crash,
            ticks: 0,
            winner_side: None,
            crash_reason: Some(reason.into()),
        }
    }

    /// Per-game score in [0, 1.2]: win 1.0 plus an efficiency bonus for fast
    /// wins (+0.2 under half the cap, +0.1 under three quarters), draw 0.5,
    /// anything else 0.
    pub fn game_score(&self, tick_cap: u32) -> f64 {
        match self.verdict {
            GameVerdict::Win => {
                let cap = tick_cap.max(1) as f64;
                let ticks = self.ticks as f64;
                let bonus: f64 = if ticks < cap * 0.5 {
                    0.2
                } else if ticks < cap * 0.75 {
                    0.1
                } else {
                    0.0
                };
                (1.0 + bonus).min(1.2)
            }
            GameVerdict::Draw => 0.5,
            GameVerdict::Loss | GameVerdict::Timeout | GameVerdict::Crash => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn win(ticks: u32) -> GameOutcome {
        GameOutcome {
            verdict: GameVerdict::Win,
            ticks,
            winner_side: Some(0),
            crash_reason: None,
        }
    }

    #[test]
    fn test_efficiency_bonus_bands() {
        // Cap 1500: <750 gets +0.2, <1125 gets +0.1, above that nothing
        assert_eq!(win(100).game_score(1500), 1.2);
        assert_eq!(win(749).game_score(1500), 1.2);
        assert_eq!(win(800).game_score(1500), 1.1);
        assert_eq!(win(1200).game_score(1500), 1.0);
    }

    #[test]
    fn test_non_win_scores() {
        let draw = GameOutcome {
            verdict: GameVerdict::Draw,
            ticks: 1500,
            winner_side: None,
            crash_reason: None,
        };
        assert_eq!(draw.game_score(1500), 0.5);
        assert_eq!(GameOutcome::timeout(1500).game_score(1500), 0.0);
        assert_eq!(GameOutcome::crash("exit code 1").game_score(1500), 0.0);
    }

    #[test]
    fn test_verdict_serializes_lowercase() {
        let json = serde_json::to_string(&GameVerdict::Timeout).unwrap();
        assert_eq!(json, "\"timeout\"");
        let back: GameVerdict = serde_json::from_str("\"crash\"").unwrap();
        assert_eq!(back, GameVerdict::Crash);
    }
}
