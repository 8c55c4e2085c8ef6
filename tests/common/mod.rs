//! Shared test infrastructure for pausable-timer integration tests

#![allow(dead_code)] // Items used across multiple test files; Rust analyzes per-file

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use pausable_timer::{
    timer::TimerBuilder, CoalescePolicy, ManualClock, ManualScheduler, PausableTimer, TimerError,
};

pub fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

/// Virtual-time harness: a manual scheduler plus a log of fire times
pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub scheduler: Arc<ManualScheduler>,
    pub fires: Arc<Mutex<Vec<Duration>>>,
    pub failures: Arc<Mutex<Vec<String>>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_granularity(Duration::ZERO)
    }

    /// One-shot wake-ups shorter than `granularity` are lost by the scheduler
    pub fn with_granularity(granularity: Duration) -> Self {
        let clock = Arc::new(ManualClock::new());
        let scheduler = Arc::new(ManualScheduler::new(Arc::clone(&clock)).with_granularity(granularity));
        Self {
            clock,
            scheduler,
            fires: Arc::new(Mutex::new(Vec::new())),
            failures: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Builder with a callback recording the virtual time of each fire
    pub fn builder(&self, interval: Duration) -> TimerBuilder {
        let fires = Arc::clone(&self.fires);
        let clock = Arc::clone(&self.clock);
        let failures = Arc::clone(&self.failures);
        PausableTimer::builder(interval)
            .callback(move || {
                fires.lock().unwrap().push(clock.elapsed());
                Ok(())
            })
            .on_error(move |err: TimerError| failures.lock().unwrap().push(err.to_string()))
    }

    pub fn timer(&self, interval: Duration, repeats: bool) -> PausableTimer {
        self.build(self.builder(interval).repeats(repeats))
    }

    pub fn timer_with_policy(&self, interval: Duration, policy: CoalescePolicy) -> PausableTimer {
        self.build(self.builder(interval).coalesce_policy(policy))
    }

    pub fn build(&self, builder: TimerBuilder) -> PausableTimer {
        builder
            .build(self.scheduler.clone(), self.clock.clone())
            .expect("valid timer")
    }

    pub fn advance(&self, millis: u64) {
        self.scheduler.advance(ms(millis));
    }

    pub fn now(&self) -> Duration {
        self.clock.elapsed()
    }

    pub fn fire_times(&self) -> Vec<Duration> {
        self.fires.lock().unwrap().clone()
    }

    pub fn fire_count(&self) -> usize {
        self.fires.lock().unwrap().len()
    }

    pub fn failures(&self) -> Vec<String> {
        self.failures.lock().unwrap().clone()
    }
}
