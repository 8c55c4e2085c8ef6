//! Error types surfaced by the timer and its control surface

use std::fmt;

use thiserror::Error;

use crate::timer::TimerMode;

/// Boxed error carried by [`TimerError::CallbackFailure`]
pub type CallbackError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Public timer operations, used to describe rejected calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Start,
    Pause,
    Resume,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Start => "start",
            Operation::Pause => "pause",
            Operation::Resume => "resume",
        };
        f.write_str(name)
    }
}

/// Errors produced by [`PausableTimer`](crate::timer::PausableTimer)
#[derive(Debug, Error)]
pub enum TimerError {
    /// A constructor argument was rejected.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The operation is not permitted in the timer's current mode.
    #[error("cannot {operation} a timer that is {mode}")]
    InvalidState { operation: Operation, mode: TimerMode },

    /// The user callback returned an error or panicked during a fire.
    #[error("timer callback failed: {0}")]
    CallbackFailure(#[source] CallbackError),
}

impl TimerError {
    /// Whether this error describes a rejected state transition
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, TimerError::InvalidState { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_state_names_operation_and_mode() {
        let err = TimerError::InvalidState {
            operation: Operation::Pause,
            mode: TimerMode::Idle,
        };
        assert_eq!(err.to_string(), "cannot pause a timer that is idle");
        assert!(err.is_invalid_state());
    }

    #[test]
    fn callback_failure_keeps_source() {
        let source: CallbackError = anyhow::anyhow!("disk full").into();
        let err = TimerError::CallbackFailure(source);
        assert_eq!(err.to_string(), "timer callback failed: disk full");
        assert!(std::error::Error::source(&err).is_some());
        assert!(!err.is_invalid_state());
    }
}
