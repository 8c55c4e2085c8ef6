//! Interval timer that keeps its place in the current interval across pauses

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    thread::{self, ThreadId},
    time::{Duration, Instant},
};
use tracing::{debug, info, trace, warn};

use super::{
    callback::{self, Callback, ErrorReporter},
    clock::Clock,
    mode::TimerMode,
    policy::CoalescePolicy,
    scheduler::{ScheduleHandle, Scheduler, Task},
    status::TimerStatus,
};
use crate::error::{Operation, TimerError};

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Position inside the current cycle of a run that has lasted `elapsed`
fn cycle_position(elapsed: Duration, interval: Duration) -> Duration {
    let nanos = elapsed.as_nanos() % interval.as_nanos();
    Duration::new((nanos / NANOS_PER_SEC) as u64, (nanos % NANOS_PER_SEC) as u32)
}

fn as_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// A wake-up registered by the timer. Deliveries carrying another
/// generation are stale and ignored.
#[derive(Debug, Clone, Copy)]
struct Armed {
    handle: ScheduleHandle,
    generation: u64,
}

#[derive(Debug)]
struct TimerCore {
    mode: TimerMode,
    /// Anchor of the current run, set by `start()`, `resume()` and the catch-up fire.
    started_at: Option<Instant>,
    /// Part of the cycle already behind us at `started_at`.
    phase_offset: Duration,
    paused_at: Option<Instant>,
    remaining_at_pause: Duration,
    last_remainder: Duration,
    main: Option<Armed>,
    catch_up: Option<Armed>,
    generation: u64,
    fire_count: u64,
    compensated_fires: u64,
    callback_failures: u64,
    /// Thread currently running the callback, if any.
    firing_on: Option<ThreadId>,
    /// Compensation fires owed by a `pause()` issued from inside the callback.
    deferred_fires: u64,
}

impl TimerCore {
    fn new(interval: Duration) -> Self {
        Self {
            mode: TimerMode::Idle,
            started_at: None,
            phase_offset: Duration::ZERO,
            paused_at: None,
            remaining_at_pause: Duration::ZERO,
            last_remainder: interval,
            main: None,
            catch_up: None,
            generation: 0,
            fire_count: 0,
            compensated_fires: 0,
            callback_failures: 0,
            firing_on: None,
            deferred_fires: 0,
        }
    }

    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    fn is_resuming(&self) -> bool {
        self.mode == TimerMode::Paused && self.catch_up.is_some()
    }

    fn since_anchor(&self, now: Instant) -> Duration {
        self.started_at
            .map(|anchor| now.saturating_duration_since(anchor))
            .unwrap_or_default()
    }

    /// Time covered by the current run, including the part of the cycle
    /// already behind us when it was anchored
    fn run_elapsed(&self, now: Instant) -> Duration {
        self.phase_offset + self.since_anchor(now)
    }

    /// A one-shot never wraps: past its deadline the whole interval is used up.
    fn elapsed_in_cycle(&self, now: Instant, interval: Duration, repeats: bool) -> Duration {
        let elapsed = self.run_elapsed(now);
        if repeats {
            cycle_position(elapsed, interval)
        } else {
            elapsed.min(interval)
        }
    }
}

struct Shared {
    interval: Duration,
    repeats: bool,
    policy: CoalescePolicy,
    scheduler: Arc<dyn Scheduler>,
    clock: Arc<dyn Clock>,
    core: Mutex<TimerCore>,
    callback: Mutex<Option<Callback>>,
    reporter: ErrorReporter,
}

impl Shared {
    fn core(&self) -> MutexGuard<'_, TimerCore> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_callback(&self) -> MutexGuard<'_, Option<Callback>> {
        self.callback.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes the callback slot so no fire is in flight while the caller
    /// changes state. Returns `None` on the thread running this timer's
    /// callback, which already holds the slot.
    ///
    /// Lock order is always callback slot, then core.
    fn enter(&self) -> Option<MutexGuard<'_, Option<Callback>>> {
        if self.core().firing_on == Some(thread::current().id()) {
            return None;
        }
        Some(self.lock_callback())
    }

    fn wake_up<F>(self: &Arc<Self>, on_fire: F) -> Task
    where
        F: Fn(&Arc<Self>) + Send + 'static,
    {
        let shared = Arc::downgrade(self);
        Box::new(move || {
            if let Some(shared) = shared.upgrade() {
                on_fire(&shared);
            }
        })
    }

    /// Registers the main wake-up, replacing any previous one.
    fn arm_main(self: &Arc<Self>, core: &mut TimerCore) {
        if let Some(previous) = core.main.take() {
            self.scheduler.cancel(previous.handle);
        }

        let generation = core.next_generation();
        let task = self.wake_up(move |shared| shared.on_main_fire(generation));
        let handle = if self.repeats {
            self.scheduler.schedule_repeating(self.interval, task)
        } else {
            self.scheduler.schedule_once(self.interval, task)
        };
        core.main = Some(Armed { handle, generation });
    }

    fn arm_catch_up(self: &Arc<Self>, core: &mut TimerCore, delay: Duration) {
        if let Some(previous) = core.catch_up.take() {
            self.scheduler.cancel(previous.handle);
        }

        let generation = core.next_generation();
        let task = self.wake_up(move |shared| shared.on_catch_up_fire(generation));
        let handle = self.scheduler.schedule_once(delay, task);
        core.catch_up = Some(Armed { handle, generation });
    }

    fn on_main_fire(self: &Arc<Self>, generation: u64) {
        let mut slot = self.lock_callback();
        {
            let mut core = self.core();
            let armed = core.main.map(|armed| armed.generation);
            if core.mode != TimerMode::Running || armed != Some(generation) {
                trace!("Ignoring stale main wake-up (generation {})", generation);
                return;
            }

            core.fire_count += 1;
            if !self.repeats {
                core.main = None;
                core.started_at = None;
                core.mode = TimerMode::Expired;
                info!("One-shot timer fired, timer expired");
            } else {
                trace!("Timer fired ({} so far)", core.fire_count);
            }
            core.firing_on = Some(thread::current().id());
        }

        self.run_callback(&mut slot);
    }

    fn on_catch_up_fire(self: &Arc<Self>, generation: u64) {
        let mut slot = self.lock_callback();
        {
            let mut core = self.core();
            let armed = core.catch_up.map(|armed| armed.generation);
            if core.mode != TimerMode::Paused || armed != Some(generation) {
                trace!("Ignoring stale catch-up wake-up (generation {})", generation);
                return;
            }

            // Delivered, so there is nothing left to cancel.
            core.catch_up = None;
            if self.repeats {
                self.arm_main(&mut core);
                core.started_at = Some(self.clock.now());
                core.phase_offset = Duration::ZERO;
                core.mode = TimerMode::Running;
                info!("Catch-up fired, back on a {:?} cadence", self.interval);
            } else {
                core.started_at = None;
                core.mode = TimerMode::Expired;
                info!("Catch-up fired, one-shot timer expired");
            }
            core.fire_count += 1;
            core.last_remainder = self.interval;
            core.firing_on = Some(thread::current().id());
        }

        self.run_callback(&mut slot);
    }

    /// Invokes the callback outside the state lock, then any fire a nested
    /// `pause()` deferred to it. Failures are counted and handed to the
    /// reporter; they never change the timer's mode.
    ///
    /// The caller holds the callback slot and has set `firing_on`.
    fn run_callback(&self, slot: &mut Option<Callback>) {
        loop {
            let outcome = slot.as_mut().map_or(Ok(()), callback::invoke);
            let again = {
                let mut core = self.core();
                if outcome.is_err() {
                    core.callback_failures += 1;
                }
                let again = core.deferred_fires > 0;
                core.deferred_fires = core.deferred_fires.saturating_sub(1);
                again
            };

            if let Err(err) = outcome {
                (self.reporter)(err);
            }
            if !again {
                break;
            }
        }

        self.core().firing_on = None;
    }
}

/// Builder for [`PausableTimer`]
pub struct TimerBuilder {
    interval: Duration,
    repeats: bool,
    callback: Option<Callback>,
    policy: CoalescePolicy,
    reporter: ErrorReporter,
}

impl TimerBuilder {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            repeats: true,
            callback: None,
            policy: CoalescePolicy::default(),
            reporter: callback::log_error(),
        }
    }

    /// Fire every interval (default) or only once
    pub fn repeats(mut self, repeats: bool) -> Self {
        self.repeats = repeats;
        self
    }

    pub fn callback<F>(mut self, callback: F) -> Self
    where
        F: FnMut() -> anyhow::Result<()> + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
        self
    }

    pub fn coalesce_policy(mut self, policy: CoalescePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Where callback failures go; defaults to an `error!` log line
    pub fn on_error<F>(mut self, reporter: F) -> Self
    where
        F: Fn(TimerError) + Send + Sync + 'static,
    {
        self.reporter = Arc::new(reporter);
        self
    }

    pub fn build(
        self,
        scheduler: Arc<dyn Scheduler>,
        clock: Arc<dyn Clock>,
    ) -> Result<PausableTimer, TimerError> {
        if self.interval.is_zero() {
            return Err(TimerError::InvalidArgument("interval must be greater than zero"));
        }

        debug!(
            "Created timer: interval={:?}, repeats={}, policy={:?}",
            self.interval, self.repeats, self.policy
        );

        Ok(PausableTimer {
            shared: Arc::new(Shared {
                interval: self.interval,
                repeats: self.repeats,
                policy: self.policy,
                scheduler,
                clock,
                core: Mutex::new(TimerCore::new(self.interval)),
                callback: Mutex::new(self.callback),
                reporter: self.reporter,
            }),
        })
    }
}

impl fmt::Debug for TimerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerBuilder")
            .field("interval", &self.interval)
            .field("repeats", &self.repeats)
            .field("has_callback", &self.callback.is_some())
            .field("policy", &self.policy)
            .finish()
    }
}

/// Fires a callback every `interval` and can be paused without losing its
/// place in the current interval.
///
/// Pausing records how much of the interval is still outstanding; resuming
/// schedules a one-shot catch-up for exactly that remainder, after which the
/// regular cadence restarts. Dropping the timer invalidates it.
pub struct PausableTimer {
    shared: Arc<Shared>,
}

impl PausableTimer {
    pub fn builder(interval: Duration) -> TimerBuilder {
        TimerBuilder::new(interval)
    }

    /// Positional constructor; see [`PausableTimer::builder`] for the rest of
    /// the knobs.
    pub fn new(
        interval: Duration,
        callback: Option<Callback>,
        repeats: bool,
        scheduler: Arc<dyn Scheduler>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, TimerError> {
        let mut builder = TimerBuilder::new(interval).repeats(repeats);
        builder.callback = callback;
        builder.build(scheduler, clock)
    }

    /// Arms the main wake-up. Only valid once, from `Idle`.
    pub fn start(&self) -> Result<(), TimerError> {
        let mut core = self.shared.core();
        if core.mode != TimerMode::Idle {
            return Err(TimerError::InvalidState {
                operation: Operation::Start,
                mode: core.mode,
            });
        }

        self.shared.arm_main(&mut core);
        core.started_at = Some(self.shared.clock.now());
        core.phase_offset = Duration::ZERO;
        core.mode = TimerMode::Running;

        info!("Timer started with a {:?} interval", self.shared.interval);
        Ok(())
    }

    /// Stops firing and records the remainder of the current interval.
    ///
    /// Valid while running and while a resume is still waiting for its
    /// catch-up. In the latter case a remainder larger than the previous one
    /// means the catch-up deadline passed undelivered, and the callback is
    /// fired once before the catch-up is cancelled. For a one-shot timer that
    /// fire is its only one, so the timer expires instead of pausing.
    ///
    /// Returns only once no fire is in flight. Called from the timer's own
    /// callback, the compensation fire runs after that callback returns.
    pub fn pause(&self) -> Result<(), TimerError> {
        let shared = &self.shared;
        let mut slot = shared.enter();
        let (compensate, expired, stale_catch_up) = {
            let mut core = shared.core();
            if core.mode != TimerMode::Running && !core.is_resuming() {
                return Err(TimerError::InvalidState {
                    operation: Operation::Pause,
                    mode: core.mode,
                });
            }

            if let Some(main) = core.main.take() {
                shared.scheduler.cancel(main.handle);
            }

            let now = shared.clock.now();
            let elapsed = core.elapsed_in_cycle(now, shared.interval, shared.repeats);
            let remaining = shared.interval - elapsed;
            // A lost catch-up shows as a wrapped cycle, one-shot or not.
            let wrapped = shared.interval - cycle_position(core.run_elapsed(now), shared.interval);

            // Taking the slot disarms the catch-up; the scheduler is told after compensating.
            let stale_catch_up = core.catch_up.take();
            let compensate = stale_catch_up.is_some()
                && shared.policy.should_compensate(wrapped, core.last_remainder);
            if compensate {
                core.fire_count += 1;
                core.compensated_fires += 1;
                if slot.is_some() {
                    core.firing_on = Some(thread::current().id());
                } else {
                    core.deferred_fires += 1;
                }
            }

            debug!(
                "Pause: elapsed {:?} in cycle, remaining {:?}, previous remainder {:?}",
                elapsed, remaining, core.last_remainder
            );
            core.last_remainder = remaining;

            // The compensation fire was a one-shot's only fire.
            let expired = compensate && !shared.repeats;
            if expired {
                core.started_at = None;
                core.paused_at = None;
                core.mode = TimerMode::Expired;
            } else {
                core.paused_at = Some(now);
                core.remaining_at_pause = remaining;
                core.mode = TimerMode::Paused;
            }
            (compensate, expired, stale_catch_up)
        };

        if compensate {
            warn!("Catch-up wake-up was not delivered before pause, compensating with one fire");
            if let Some(slot) = slot.as_mut() {
                shared.run_callback(slot);
            }
        }
        if let Some(catch_up) = stale_catch_up {
            shared.scheduler.cancel(catch_up.handle);
        }

        if expired {
            info!("One-shot timer expired on its compensation fire");
        } else {
            info!("Timer paused");
        }
        Ok(())
    }

    /// Schedules a catch-up for the remainder recorded by `pause()`. The timer
    /// stays paused until the catch-up fires.
    pub fn resume(&self) -> Result<(), TimerError> {
        let mut core = self.shared.core();
        if core.mode != TimerMode::Paused || core.catch_up.is_some() {
            return Err(TimerError::InvalidState {
                operation: Operation::Resume,
                mode: core.mode,
            });
        }

        let remaining = core.remaining_at_pause;
        core.started_at = Some(self.shared.clock.now());
        core.phase_offset = self.shared.interval - remaining;
        core.paused_at = None;
        self.shared.arm_catch_up(&mut core, remaining);

        info!("Timer resuming, next fire in {:?}", remaining);
        Ok(())
    }

    /// Cancels everything and makes the timer terminal. Always succeeds, and
    /// waits for a fire in flight on another thread to finish first.
    pub fn invalidate(&self) {
        let _slot = self.shared.enter();
        let (main, catch_up) = {
            let mut core = self.shared.core();
            if core.mode == TimerMode::Invalidated {
                return;
            }

            info!("Timer invalidated (was {})", core.mode);
            core.mode = TimerMode::Invalidated;
            core.started_at = None;
            core.paused_at = None;
            (core.main.take(), core.catch_up.take())
        };

        for armed in main.into_iter().chain(catch_up) {
            self.shared.scheduler.cancel(armed.handle);
        }
    }

    pub fn mode(&self) -> TimerMode {
        self.shared.core().mode
    }

    pub fn interval(&self) -> Duration {
        self.shared.interval
    }

    pub fn repeats(&self) -> bool {
        self.shared.repeats
    }

    /// Fires so far, compensation included
    pub fn fire_count(&self) -> u64 {
        self.shared.core().fire_count
    }

    /// Remainder recorded by the last `pause()`, until `resume()` consumes it
    pub fn remaining_at_pause(&self) -> Option<Duration> {
        let core = self.shared.core();
        (core.mode == TimerMode::Paused && !core.is_resuming()).then_some(core.remaining_at_pause)
    }

    pub fn is_resuming(&self) -> bool {
        self.shared.core().is_resuming()
    }

    pub fn status(&self) -> TimerStatus {
        let core = self.shared.core();
        let now = self.shared.clock.now();
        let resuming = core.is_resuming();

        let next_fire_in = match core.mode {
            TimerMode::Running => {
                let elapsed = core.elapsed_in_cycle(now, self.shared.interval, self.shared.repeats);
                Some(self.shared.interval - elapsed)
            }
            TimerMode::Paused if resuming => {
                Some(core.remaining_at_pause.saturating_sub(core.since_anchor(now)))
            }
            _ => None,
        };

        TimerStatus {
            mode: core.mode,
            interval_ms: as_millis(self.shared.interval),
            repeats: self.shared.repeats,
            resuming,
            remaining_at_pause_ms: (core.mode == TimerMode::Paused && !resuming)
                .then(|| as_millis(core.remaining_at_pause)),
            last_remainder_ms: as_millis(core.last_remainder),
            next_fire_in_ms: next_fire_in.map(as_millis),
            fire_count: core.fire_count,
            compensated_fires: core.compensated_fires,
            callback_failures: core.callback_failures,
        }
    }
}

impl Drop for PausableTimer {
    fn drop(&mut self) {
        self.invalidate();
    }
}

impl fmt::Debug for PausableTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PausableTimer")
            .field("interval", &self.shared.interval)
            .field("repeats", &self.shared.repeats)
            .field("mode", &self.mode())
            .finish()
    }
}
