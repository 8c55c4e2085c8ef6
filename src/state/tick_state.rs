//! Tick bookkeeping for the timer callback

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One delivered fire, as published on the tick channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickEvent {
    pub sequence: u64,
    pub fired_at: DateTime<Utc>,
}

/// Running totals of fires seen by the callback
#[derive(Debug, Clone)]
pub struct TickState {
    pub count: u64,
    pub last_tick: Option<DateTime<Utc>>,
}

impl TickState {
    /// Create an empty tick state
    pub fn new() -> Self {
        Self {
            count: 0,
            last_tick: None,
        }
    }

    /// Record a fire and return the event describing it
    pub fn record(&mut self) -> TickEvent {
        let fired_at = Utc::now();
        self.count += 1;
        self.last_tick = Some(fired_at);
        TickEvent {
            sequence: self.count,
            fired_at,
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Time of the most recent fire, if any
    pub fn last_tick(&self) -> Option<DateTime<Utc>> {
        self.last_tick
    }
}

impl Default for TickState {
    fn default() -> Self {
        Self::new()
    }
}
