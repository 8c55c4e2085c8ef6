//! Coalesced-fire detection policy

use std::time::Duration;

/// How `pause()` treats a catch-up wake-up that appears to have been lost.
///
/// When a pause interrupts a resume whose catch-up is still registered, the
/// remaining time is compared with the remainder recorded by the previous
/// pause. A catch-up that was delivered on time would have left the remainder
/// shrinking; a larger remainder means its deadline passed and the cycle
/// wrapped without the fire being delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoalescePolicy {
    /// Never compensate.
    Disabled,
    /// Fire once when the new remainder exceeds the previous one by more
    /// than `tolerance`.
    Compensate { tolerance: Duration },
}

impl CoalescePolicy {
    pub(crate) fn should_compensate(&self, remaining: Duration, last_remainder: Duration) -> bool {
        match self {
            CoalescePolicy::Disabled => false,
            CoalescePolicy::Compensate { tolerance } => {
                remaining > last_remainder.saturating_add(*tolerance)
            }
        }
    }
}

impl Default for CoalescePolicy {
    fn default() -> Self {
        CoalescePolicy::Compensate {
            tolerance: Duration::ZERO,
        }
    }
}
