//! Pausable Timer - an interval timer that can be paused without losing its
//! place in the current interval
//! 
//! The core lives in [`timer`]: [`PausableTimer`] fires a callback every
//! interval (or once), and on resume schedules a catch-up for exactly the
//! part of the interval that was left when it was paused. The remaining
//! modules wrap one timer in a small HTTP control daemon.

pub mod config;
pub mod error;
pub mod timer;
pub mod state;
pub mod api;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use error::{Operation, TimerError};
pub use timer::{
    CoalescePolicy, Clock, ManualClock, ManualScheduler, MonotonicClock, PausableTimer,
    Scheduler, TimerMode, TimerStatus, TokioScheduler,
};
pub use state::AppState;
pub use api::create_router;
pub use utils::signals::shutdown_signal;
