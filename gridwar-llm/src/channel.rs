//! Degraded-channel tracking
//!
//! Every LLM consumer owns a `ChannelHealth`. After N consecutive failures
//! the channel degrades and the consumer stops calling, living off its cached
//! defaults; a periodic probe is still let through so a recovered backend
//! re-enables the channel with a single success.

/// Lifecycle of an LLM consumer's channel
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelState {
    /// No call has succeeded yet
    Initial,
    /// Last calls are healthy
    Ready,
    /// Too many consecutive failures; calls suspended
    Degraded,
}

/// How many suppressed attempts pass between probes while degraded
const PROBE_EVERY: u32 = 4;

/// Consecutive-failure state machine shared by all LLM consumers
#[derive(Clone, Debug)]
pub struct ChannelHealth {
    state: ChannelState,
    threshold: u32,
    consecutive_failures: u32,
    suppressed: u32,
    total_successes: u64,
    total_failures: u64,
}

impl Default for ChannelHealth {
    fn default() -> Self {
        Self::new(3)
    }
}

impl ChannelHealth {
    pub fn new(threshold: u32) -> Self {
        Self {
            state: ChannelState::Initial,
            threshold: threshold.max(1),
            consecutive_failures: 0,
            suppressed: 0,
            total_successes: 0,
            total_failures: 0,
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn is_degraded(&self) -> bool {
        self.state == ChannelState::Degraded
    }

    /// Whether the consumer should issue a call right now. While degraded
    /// only every few attempts go through as a probe.
    pub fn should_attempt(&mut self) -> bool {
        if self.state != ChannelState::Degraded {
            return true;
        }
        self.suppressed += 1;
        if self.suppressed >= PROBE_EVERY {
            self.suppressed = 0;
            true
        } else {
            false
        }
    }

    pub fn record_success(&mut self) {
        self.total_successes += 1;
        self.consecutive_failures = 0;
        self.suppressed = 0;
        self.state = ChannelState::Ready;
    }

    pub fn record_failure(&mut self) {
        self.total_failures += 1;
        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.threshold {
            self.state = ChannelState::Degraded;
        }
    }

    pub fn total_successes(&self) -> u64 {
        self.total_successes
    }

    pub fn total_failures(&self) -> u64 {
        self.total_failures
    }

    /// Operator-facing summary for statistics strings
    pub fn describe(&self) -> String {
        let label = match self.state {
            ChannelState::Initial => "initial",
            ChannelState::Ready => "ready",
            ChannelState::Degraded => "DEGRADED",
        };
        format!(
            "{} ({} ok, {} err)",
            label, self.total_successes, self.total_failures
        )
    }
}
