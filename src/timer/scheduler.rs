//! Scheduling capability the timer registers its wake-ups with

use std::{fmt, time::Duration};

/// Work delivered by a scheduler when a wake-up comes due
pub type Task = Box<dyn FnMut() + Send + 'static>;

/// Opaque identifier of a registered wake-up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScheduleHandle(u64);

impl ScheduleHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ScheduleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Registers and cancels one-shot and repeating wake-ups.
///
/// Deliveries for a single scheduler must be sequential. `cancel` is
/// idempotent: cancelling a handle that already fired or was already
/// cancelled does nothing.
pub trait Scheduler: Send + Sync {
    /// Runs `task` once after `delay`.
    fn schedule_once(&self, delay: Duration, task: Task) -> ScheduleHandle;

    /// Runs `task` every `interval`, first after one full interval.
    fn schedule_repeating(&self, interval: Duration, task: Task) -> ScheduleHandle;

    /// Stops a wake-up from firing again.
    fn cancel(&self, handle: ScheduleHandle);
}
