//! Scheduler backed by tokio tasks and timers

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};
use futures::future::{BoxFuture, FutureExt};
use tokio::{
    runtime::Handle,
    task::JoinHandle,
    time::{interval_at, sleep_until, Instant, MissedTickBehavior},
};
use tracing::{debug, trace};

use super::scheduler::{ScheduleHandle, Scheduler, Task};

#[derive(Debug, Default)]
struct Registry {
    next_id: AtomicU64,
    tasks: Mutex<HashMap<u64, JoinHandle<()>>>,
}

impl Registry {
    fn forget(&self, id: u64) {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }
}

/// Scheduler that runs every wake-up as its own tokio task.
///
/// Cancelling aborts the task. Dropping the scheduler aborts everything
/// still outstanding.
#[derive(Debug)]
pub struct TokioScheduler {
    runtime: Handle,
    registry: Arc<Registry>,
}

impl TokioScheduler {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            registry: Arc::new(Registry::default()),
        }
    }

    /// Scheduler bound to the runtime of the calling context.
    ///
    /// Panics when called outside a tokio runtime, like [`Handle::current`].
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// Number of wake-ups that have not yet finished or been cancelled
    pub fn outstanding(&self) -> usize {
        self.registry
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn register<F>(&self, make_future: F) -> ScheduleHandle
    where
        F: FnOnce(u64) -> BoxFuture<'static, ()>,
    {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        let mut tasks = self
            .registry
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Held across spawn so a short-lived task cannot unregister before it is registered.
        let join = self.runtime.spawn(make_future(id));
        tasks.insert(id, join);
        ScheduleHandle::new(id)
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_once(&self, delay: Duration, mut task: Task) -> ScheduleHandle {
        let registry = Arc::clone(&self.registry);
        let deadline = Instant::now() + delay;
        let handle = self.register(move |id| {
            async move {
                sleep_until(deadline).await;
                registry.forget(id);
                task();
            }
            .boxed()
        });
        trace!("Scheduled one-shot {} after {:?}", handle, delay);
        handle
    }

    fn schedule_repeating(&self, period: Duration, mut task: Task) -> ScheduleHandle {
        let first = Instant::now() + period;
        let handle = self.register(move |_| {
            async move {
                let mut ticks = interval_at(first, period);
                ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    ticks.tick().await;
                    task();
                }
            }
            .boxed()
        });
        trace!("Scheduled repeating {} every {:?}", handle, period);
        handle
    }

    fn cancel(&self, handle: ScheduleHandle) {
        let removed = self
            .registry
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handle.id());

        if let Some(join) = removed {
            join.abort();
            debug!("Cancelled wake-up {}", handle);
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        let mut tasks = self
            .registry
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for (_, join) in tasks.drain() {
            join.abort();
        }
    }
}
