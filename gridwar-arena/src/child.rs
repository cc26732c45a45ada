//! Child-process game execution
//!
//! Each matchup runs in an isolated child speaking a line-oriented contract:
//! parameters go in through environment variables, the terminal result comes
//! back as a single `RESULT winner=<0|1|draw> ticks=<N> agent_side=<0|1>`
//! line on stdout. Stderr is captured and archived, never parsed.
//!
//! Wall-clock enforcement escalates: graceful signal, two-second grace
//! window, force kill. The child is always reaped.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::matchup::{GameOutcome, GameVerdict, Matchup};

/// Poll interval while waiting on a child
const WAIT_POLL: Duration = Duration::from_millis(50);
/// Grace window between the polite signal and the hard kill
const KILL_GRACE: Duration = Duration::from_secs(2);

/// Executes one matchup and yields its outcome. The process-backed
/// implementation is the production path; tests substitute canned outcomes.
pub trait MatchExecutor: Send + Sync {
    fn run(&self, matchup: &Matchup, stderr_log: &Path) -> GameOutcome;
}

/// Model configuration passed through to children
#[derive(Clone, Debug)]
pub struct ModelEnv {
    pub host: String,
    pub model: String,
    /// Optional different model for the opponent side
    pub model_p2: Option<String>,
}

/// Spawns the game-runner binary per matchup
pub struct ProcessExecutor {
    /// Program to invoke (the arena binary itself, in production)
    pub program: PathBuf,
    /// Leading arguments (the game-runner subcommand)
    pub args: Vec<String>,
    pub model_env: ModelEnv,
}

impl ProcessExecutor {
    pub fn new(program: PathBuf, args: Vec<String>, model_env: ModelEnv) -> Self {
        Self {
            program,
            args,
            model_env,
        }
    }
}

impl MatchExecutor for ProcessExecutor {
    fn run(&self, matchup: &Matchup, stderr_log: &Path) -> GameOutcome {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .env("AGENT_CLASS", &matchup.agent)
            .env("OPPONENT_CLASS", &matchup.opponent)
            .env("MAP", &matchup.map)
            .env("TICK_CAP", matchup.tick_cap.to_string())
            .env("MODEL_HOST", &self.model_env.host)
            .env("MODEL_NAME", &self.model_env.model)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(p2) = &self.model_env.model_p2 {
            command.env("MODEL_NAME_P2", p2);
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => {
                warn!("failed to spawn game runner: {err}");
                return GameOutcome::crash(format!("spawn failed: {err}"));
            }
        };

        let stdout_reader = drain(child.stdout.take());
        let stderr_reader = drain(child.stderr.take());

        let deadline = Instant::now() + matchup.budget;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break Some(status),
                Ok(None) => {
                    if Instant::now() >= deadline {
                        terminate_with_grace(&mut child);
                        break None;
                    }
                    thread::sleep(WAIT_POLL);
                }
                Err(err) => {
                    warn!("wait on game runner failed: {err}");
                    terminate_with_grace(&mut child);
                    break None;
                }
            }
        };

        let stdout_text = stdout_reader.join().unwrap_or_default();
        let stderr_text = stderr_reader.join().unwrap_or_default();
        if let Err(err) = std::fs::write(stderr_log, &stderr_text) {
            warn!("could not archive stderr to {}: {err}", stderr_log.display());
        }

        let Some(status) = status else {
            debug!(
                "{} vs {} game {}: wall-clock budget elapsed",
                matchup.agent, matchup.opponent, matchup.game_index
            );
            return GameOutcome::timeout(matchup.tick_cap);
        };

        match parse_result_line(&stdout_text) {
            Some(result) if status.success() => result.into_outcome(),
            _ => {
                let last_err = stderr_text.lines().last().unwrap_or("").trim().to_string();
                GameOutcome::crash(format!("{status}; {last_err}"))
            }
        }
    }
}

/// Read a child stream to completion on its own thread
fn drain(stream: Option<impl Read + Send + 'static>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut text = String::new();
        if let Some(mut stream) = stream {
            let _ = stream.read_to_string(&mut text);
        }
        text
    })
}

/// Graceful signal, grace window, force kill; always reaps.
fn terminate_with_grace(child: &mut Child) {
    #[cfg(unix)]
    {
        // SAFETY: sending SIGTERM to our own child's pid
        unsafe {
            libc::kill(child.id() as libc::pid_t, libc::SIGTERM);
        }
        let grace_deadline = Instant::now() + KILL_GRACE;
        while Instant::now() < grace_deadline {
            if matches!(child.try_wait(), Ok(Some(_))) {
                return;
            }
            thread::sleep(WAIT_POLL);
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}

/// Parsed terminal-result marker
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResultLine {
    /// Winning side, `None` for a draw
    pub winner: Option<u8>,
    pub ticks: u32,
    pub agent_side: u8,
}

impl ResultLine {
    fn into_outcome(self) -> GameOutcome {
        let verdict = match self.winner {
            None => GameVerdict::Draw,
            Some(side) if side == self.agent_side => GameVerdict::Win,
            Some(_) => GameVerdict::Loss,
        };
        GameOutcome {
            verdict,
            ticks: self.ticks,
            winner_side: self.winner,
            crash_reason: None,
        }
    }
}

/// Find and parse the terminal-result marker in captured stdout.
/// `RESULT winner=<0|1|draw> ticks=<N> agent_side=<0|1>`
pub fn parse_result_line(stdout: &str) -> Option<ResultLine> {
    for line in stdout.lines().rev() {
        let Some(rest) = line.trim().strip_prefix("RESULT ") else {
            continue;
        };
        let mut winner: Option<Option<u8>> = None;
        let mut ticks: Option<u32> = None;
        let mut agent_side: Option<u8> = None;
        for token in rest.split_whitespace() {
            let Some((key, value)) = token.split_once('=') else {
                continue;
            };
            match key {
                "winner" => {
                    winner = match value {
                        "draw" => Some(None),
                        "0" => Some(Some(0)),
                        "1" => Some(Some(1)),
                        _ => None,
                    }
                }
                "ticks" => ticks = value.parse().ok(),
                "agent_side" => {
                    agent_side = match value {
                        "0" => Some(0),
                        "1" => Some(1),
                        _ => None,
                    }
                }
                _ => {}
            }
        }
        if let (Some(winner), Some(ticks), Some(agent_side)) = (winner, ticks, agent_side) {
            return Some(ResultLine {
                winner,
                ticks,
                agent_side,
            });
        }
    }
    None
}
