//! Deterministic virtual-time scheduler
//!
//! [`ManualScheduler`] owns a [`ManualClock`] and only delivers wake-ups when
//! [`ManualScheduler::advance`] moves that clock past their deadlines. It can
//! also reproduce schedulers that lose one-shot wake-ups whose delay falls
//! inside a single scheduling tick, which is how coalesced fires are exercised.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};
use tracing::{debug, trace};

use super::{
    clock::{Clock, ManualClock},
    scheduler::{ScheduleHandle, Scheduler, Task},
};

struct Entry {
    id: u64,
    due: Instant,
    period: Option<Duration>,
    /// Taken out while the task runs.
    task: Option<Task>,
}

#[derive(Default)]
struct Queue {
    next_id: u64,
    entries: Vec<Entry>,
    dropped: usize,
    delivered: usize,
}

/// Virtual-time [`Scheduler`] for tests and simulations
pub struct ManualScheduler {
    clock: Arc<ManualClock>,
    granularity: Duration,
    queue: Mutex<Queue>,
}

impl ManualScheduler {
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            clock,
            granularity: Duration::ZERO,
            queue: Mutex::new(Queue::default()),
        }
    }

    /// Drops every one-shot wake-up whose delay is shorter than `granularity`.
    pub fn with_granularity(mut self, granularity: Duration) -> Self {
        self.granularity = granularity;
        self
    }

    pub fn clock(&self) -> &Arc<ManualClock> {
        &self.clock
    }

    /// Wake-ups still registered
    pub fn pending(&self) -> usize {
        self.queue().entries.len()
    }

    /// One-shot wake-ups swallowed because of the tick granularity
    pub fn dropped(&self) -> usize {
        self.queue().dropped
    }

    /// Total deliveries so far
    pub fn delivered(&self) -> usize {
        self.queue().delivered
    }

    /// Moves the clock forward by `by`, delivering every wake-up that comes
    /// due on the way in deadline order.
    pub fn advance(&self, by: Duration) {
        let target = self.clock.now() + by;

        while let Some((id, due, mut task)) = self.take_next_due(target) {
            self.clock.advance_to(due);
            trace!("Delivering wake-up #{} at {:?}", id, self.clock.elapsed());
            task();
            self.restore(id, task);
        }

        self.clock.advance_to(target);
    }

    fn queue(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_next_due(&self, target: Instant) -> Option<(u64, Instant, Task)> {
        let mut queue = self.queue();
        let index = queue
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.task.is_some() && entry.due <= target)
            .min_by_key(|(_, entry)| (entry.due, entry.id))
            .map(|(index, _)| index)?;

        queue.delivered += 1;
        let entry = &mut queue.entries[index];
        let (id, due, period) = (entry.id, entry.due, entry.period);
        match period {
            Some(period) => {
                entry.due = due + period;
                let task = entry.task.take()?;
                Some((id, due, task))
            }
            None => {
                let entry = queue.entries.swap_remove(index);
                entry.task.map(|task| (id, due, task))
            }
        }
    }

    /// Puts a repeating task back unless it was cancelled while running.
    fn restore(&self, id: u64, task: Task) {
        let mut queue = self.queue();
        if let Some(entry) = queue.entries.iter_mut().find(|entry| entry.id == id) {
            entry.task = Some(task);
        }
    }

    fn insert(&self, delay: Duration, period: Option<Duration>, task: Task) -> ScheduleHandle {
        let due = self.clock.now() + delay;
        let mut queue = self.queue();
        let id = queue.next_id;
        queue.next_id += 1;

        if period.is_none() && delay < self.granularity {
            queue.dropped += 1;
            debug!(
                "Dropping one-shot #{} with delay {:?} below tick granularity {:?}",
                id, delay, self.granularity
            );
        } else {
            queue.entries.push(Entry {
                id,
                due,
                period,
                task: Some(task),
            });
        }

        ScheduleHandle::new(id)
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_once(&self, delay: Duration, task: Task) -> ScheduleHandle {
        self.insert(delay, None, task)
    }

    fn schedule_repeating(&self, interval: Duration, task: Task) -> ScheduleHandle {
        self.insert(interval, Some(interval), task)
    }

    fn cancel(&self, handle: ScheduleHandle) {
        self.queue().entries.retain(|entry| entry.id != handle.id());
    }
}
