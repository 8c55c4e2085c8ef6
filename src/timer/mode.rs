//! Lifecycle states of a pausable timer

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a [`PausableTimer`](super::PausableTimer) is in its lifecycle.
///
/// ```text
/// Idle --start--> Running --pause--> Paused --resume--> Paused (resuming) --catch-up--> Running
/// Running --one-shot fire--> Expired
/// any --invalidate--> Invalidated
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerMode {
    /// Constructed, not yet started.
    Idle,
    /// Main wake-up armed.
    Running,
    /// Stopped mid-interval. Also covers the resuming window, while the
    /// catch-up wake-up is pending.
    Paused,
    /// A non-repeating timer delivered its only fire.
    Expired,
    /// Terminal; nothing fires any more.
    Invalidated,
}

impl TimerMode {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TimerMode::Expired | TimerMode::Invalidated)
    }
}

impl fmt::Display for TimerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimerMode::Idle => "idle",
            TimerMode::Running => "running",
            TimerMode::Paused => "paused",
            TimerMode::Expired => "expired",
            TimerMode::Invalidated => "invalidated",
        };
        f.write_str(name)
    }
}
