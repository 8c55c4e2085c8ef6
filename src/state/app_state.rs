//! Main application state management

use std::{
    sync::{Arc, Mutex},
    time::Instant,
};
use anyhow::anyhow;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use crate::{
    config::Config,
    error::TimerError,
    timer::{Clock, PausableTimer, Scheduler, TimerStatus},
};
use super::{TickEvent, TickState};

/// Main application state that owns the timer and tracks its fires
#[derive(Debug)]
pub struct AppState {
    /// The timer controlled through the API
    pub timer: PausableTimer,
    /// Fires observed by the timer callback
    pub ticks: Arc<Mutex<TickState>>,
    /// Callback failures reported by the timer
    pub errors: Arc<Mutex<Vec<String>>>,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
    /// Last action tracking
    pub last_action: Mutex<Option<String>>,
    pub last_action_time: Mutex<Option<DateTime<Utc>>>,
    /// Channel publishing every fire
    pub tick_tx: broadcast::Sender<TickEvent>,
}

impl AppState {
    /// Create the application state and its timer (not yet started)
    pub fn new(
        config: &Config,
        scheduler: Arc<dyn Scheduler>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, TimerError> {
        let (tick_tx, _) = broadcast::channel(100);
        let ticks = Arc::new(Mutex::new(TickState::new()));
        let errors = Arc::new(Mutex::new(Vec::new()));

        let callback_ticks = Arc::clone(&ticks);
        let callback_tx = tick_tx.clone();
        let reported_errors = Arc::clone(&errors);

        let timer = PausableTimer::builder(config.interval())
            .repeats(config.repeats())
            .callback(move || {
                let event = callback_ticks
                    .lock()
                    .map_err(|e| anyhow!("Failed to lock tick state: {}", e))?
                    .record();

                // Nobody listening is fine; the ledger already has it.
                if callback_tx.send(event).is_err() {
                    debug!("No tick subscribers");
                }
                Ok(())
            })
            .on_error(move |err| {
                error!("{}", err);
                if let Ok(mut errors) = reported_errors.lock() {
                    errors.push(err.to_string());
                }
            })
            .build(scheduler, clock)?;

        Ok(Self {
            timer,
            ticks,
            errors,
            start_time: Instant::now(),
            port: config.port,
            host: config.host.clone(),
            last_action: Mutex::new(None),
            last_action_time: Mutex::new(None),
            tick_tx,
        })
    }

    /// Apply a timer operation, track it as the last action and return the new status
    pub fn control<F>(&self, action: &str, operation: F) -> Result<TimerStatus, TimerError>
    where
        F: FnOnce(&PausableTimer) -> Result<(), TimerError>,
    {
        operation(&self.timer)?;

        if let Ok(mut last_action) = self.last_action.lock() {
            *last_action = Some(action.to_string());
        }
        if let Ok(mut last_time) = self.last_action_time.lock() {
            *last_time = Some(Utc::now());
        }

        Ok(self.timer.status())
    }

    pub fn start(&self) -> Result<TimerStatus, TimerError> {
        info!("Starting timer");
        self.control("start", PausableTimer::start)
    }

    pub fn pause(&self) -> Result<TimerStatus, TimerError> {
        info!("Pausing timer");
        self.control("pause", PausableTimer::pause)
    }

    pub fn resume(&self) -> Result<TimerStatus, TimerError> {
        info!("Resuming timer");
        self.control("resume", PausableTimer::resume)
    }

    pub fn invalidate(&self) -> TimerStatus {
        info!("Invalidating timer");
        let result = self.control("invalidate", |timer| {
            timer.invalidate();
            Ok(())
        });
        result.unwrap_or_else(|_| self.timer.status())
    }

    /// Get current tick state
    pub fn get_tick_state(&self) -> Result<TickState, String> {
        self.ticks
            .lock()
            .map(|ticks| ticks.clone())
            .map_err(|e| format!("Failed to lock tick state: {}", e))
    }

    /// Get the callback failures reported so far
    pub fn get_errors(&self) -> Result<Vec<String>, String> {
        self.errors
            .lock()
            .map(|errors| errors.clone())
            .map_err(|e| format!("Failed to lock error list: {}", e))
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }

    /// Get last action information
    pub fn get_last_action(&self) -> (Option<String>, Option<DateTime<Utc>>) {
        let last_action = self.last_action.lock().ok().and_then(|a| a.clone());
        let last_action_time = self.last_action_time.lock().ok().and_then(|t| *t);
        (last_action, last_action_time)
    }
}
