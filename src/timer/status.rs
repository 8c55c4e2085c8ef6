//! Point-in-time view of a timer

use serde::{Deserialize, Serialize};

use super::TimerMode;

/// Snapshot returned by [`PausableTimer::status`](super::PausableTimer::status)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerStatus {
    pub mode: TimerMode,
    pub interval_ms: u64,
    pub repeats: bool,
    /// Paused with a catch-up wake-up pending
    pub resuming: bool,
    pub remaining_at_pause_ms: Option<u64>,
    pub last_remainder_ms: u64,
    /// Time until the next expected fire while running or resuming
    pub next_fire_in_ms: Option<u64>,
    pub fire_count: u64,
    pub compensated_fires: u64,
    pub callback_failures: u64,
}

impl TimerStatus {
    /// Whether the timer can still fire
    pub fn is_live(&self) -> bool {
        self.mode == TimerMode::Running || self.resuming
    }
}
