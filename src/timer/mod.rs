//! Pausable interval timer
//!
//! The timer depends on two injected capabilities: a [`Clock`] for monotonic
//! time and a [`Scheduler`] that delivers wake-ups. [`TokioScheduler`] with
//! [`MonotonicClock`] runs it on a tokio runtime. [`ManualScheduler`] with a
//! [`ManualClock`] runs it in virtual time.

pub mod callback;
pub mod clock;
pub mod manual;
pub mod mode;
pub mod pausable;
pub mod policy;
pub mod scheduler;
pub mod status;
pub mod tokio_scheduler;

// Re-export main types
pub use callback::{Callback, ErrorReporter};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use manual::ManualScheduler;
pub use mode::TimerMode;
pub use pausable::{PausableTimer, TimerBuilder};
pub use policy::CoalescePolicy;
pub use scheduler::{ScheduleHandle, Scheduler, Task};
pub use status::TimerStatus;
pub use tokio_scheduler::TokioScheduler;
