//! Single-flight background work
//!
//! Model refreshes must never stall a turn: the call runs on a worker thread
//! and its result is picked up on a later turn. At most one worker is in
//! flight per consumer; a worker still running when the agent is dropped is
//! simply abandoned (its read timeout bounds its lifetime and its result is
//! discarded).

use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

/// One background computation at a time, polled without blocking
pub struct SingleFlight<T: Send + 'static> {
    rx: Option<Receiver<T>>,
}

impl<T: Send + 'static> SingleFlight<T> {
    pub fn new() -> Self {
        Self { rx: None }
    }

    pub fn in_flight(&self) -> bool {
        self.rx.is_some()
    }

    /// Launch `work` on a worker thread unless one is already running
    pub fn spawn(&mut self, work: impl FnOnce() -> T + Send + 'static) {
        if self.rx.is_some() {
            return;
        }
        let (tx, rx) = mpsc::sync_channel(1);
        thread::spawn(move || {
            let _ = tx.send(work());
        });
        self.rx = Some(rx);
    }

    /// Take the finished result, if any. A worker that died without sending
    /// clears the slot and yields nothing.
    pub fn poll(&mut self) -> Option<T> {
        let outcome = match &self.rx {
            Some(rx) => rx.try_recv(),
            None => return None,
        };
        match outcome {
            Ok(value) => {
                self.rx = None;
                Some(value)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.rx = None;
                None
            }
        }
    }
}

impl<T: Send + 'static> Default for SingleFlight<T> {
    fn default() -> Self {
        Self::new()
    }
}
