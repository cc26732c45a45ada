//! Tick-interval gating for LLM refresh calls
//!
//! Consumers call `due` at the top of their turn and `mark` once a call is
//! issued; the schedule guarantees at most one call per window regardless of
//! how often the turn loop runs.

/// Interval-based refresh gate over game ticks
#[derive(Clone, Copy, Debug)]
pub struct RefreshSchedule {
    interval: u32,
    last: Option<u32>,
}

impl RefreshSchedule {
    pub fn new(interval: u32) -> Self {
        Self {
            interval: interval.max(1),
            last: None,
        }
    }

    pub fn interval(&self) -> u32 {
        self.interval
    }

    /// The first call is always due; later ones once a full window passed
    pub fn due(&self, tick: u32) -> bool {
        match self.last {
            None => true,
            Some(last) => tick >= last.saturating_add(self.interval),
        }
    }

    pub fn mark(&mut self, tick: u32) {
        self.last = Some(tick);
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// Read a tick-count override from the environment, falling back to `default`
/// when the variable is absent or not a positive integer.
pub fn env_ticks(var: &str, default: u32) -> u32 {
    std::env::var(var)
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}
