//! Expiry Scheduler Module
//!
//! Runs delayed removal actions as tokio tasks and lets the cache cancel them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::timer::{TimerHandle, TimerState};
use crate::error::{CacheError, Result};

// == Timer Set ==
struct Timer {
    state: Arc<TimerState>,
    task: JoinHandle<()>,
}

/// Live timer tasks of one scheduler, keyed by timer id.
#[derive(Default)]
pub(crate) struct TimerSet {
    tasks: Mutex<HashMap<u64, Timer>>,
    closed: AtomicBool,
}

impl TimerSet {
    /// Stops the task of a timer whose handle won the cancel race.
    pub(crate) fn abort(&self, id: u64) {
        if let Some(timer) = self.tasks.lock().remove(&id) {
            timer.task.abort();
        }
    }

    fn finish(&self, id: u64) {
        self.tasks.lock().remove(&id);
    }
}

impl std::fmt::Debug for TimerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerSet")
            .field("timers", &self.tasks.lock().len())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

// == Shutdown Summary ==
/// Outcome of [`ExpiryScheduler::shutdown`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownSummary {
    /// Timers cancelled before they fired
    pub cancelled: usize,
    /// Callbacks already running that finished within the grace period
    pub drained: usize,
    /// Callbacks still running when the grace period ran out
    pub forced: usize,
}

// == Expiry Scheduler ==
/// Schedules one-shot actions on a tokio runtime.
///
/// Each scheduler owns its own set of timers; two schedulers on the same
/// runtime never observe or cancel each other's timers.
#[derive(Debug)]
pub struct ExpiryScheduler {
    runtime: Handle,
    timers: Arc<TimerSet>,
    next_id: AtomicU64,
}

impl ExpiryScheduler {
    // == Constructors ==
    /// Creates a scheduler that spawns its timers on `runtime`.
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            timers: Arc::new(TimerSet::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Creates a scheduler bound to the runtime of the calling context.
    ///
    /// # Panics
    /// Panics when called outside of a tokio runtime.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    // == Schedule ==
    /// Runs `action` once `delay` has elapsed, unless the returned handle
    /// cancels it first.
    ///
    /// Fails with [`CacheError::ShutDown`] once [`shutdown`](Self::shutdown)
    /// has started.
    pub fn schedule<F>(&self, delay: Duration, action: F) -> Result<TimerHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let state = TimerState::new();

        let task_state = Arc::clone(&state);
        let task_timers = Arc::downgrade(&self.timers);

        // Insert under the lock so the task cannot finish before it is tracked.
        let mut tasks = self.timers.tasks.lock();
        if self.timers.closed.load(Ordering::Acquire) {
            warn!(timer_id = id, "Rejected timer: scheduler is shut down");
            return Err(CacheError::ShutDown);
        }

        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;

            if task_state.try_fire() {
                action();
            }

            if let Some(timers) = task_timers.upgrade() {
                timers.finish(id);
            }
        });

        tasks.insert(
            id,
            Timer {
                state: Arc::clone(&state),
                task,
            },
        );
        drop(tasks);

        debug!(timer_id = id, delay_ms = delay.as_millis() as u64, "Timer scheduled");
        Ok(TimerHandle::new(id, state, Arc::downgrade(&self.timers)))
    }

    // == Pending ==
    /// Number of timers that have neither fired nor been cancelled.
    pub fn pending(&self) -> usize {
        self.timers
            .tasks
            .lock()
            .values()
            .filter(|timer| timer.state.is_pending())
            .count()
    }

    /// True once shutdown has started.
    pub fn is_closed(&self) -> bool {
        self.timers.closed.load(Ordering::Acquire)
    }

    // == Shutdown ==
    /// Stops accepting timers, cancels every pending one, and waits up to
    /// `grace` for callbacks that are already running.
    pub async fn shutdown(&self, grace: Duration) -> ShutdownSummary {
        let timers: Vec<Timer> = {
            let mut tasks = self.timers.tasks.lock();
            self.timers.closed.store(true, Ordering::Release);
            tasks.drain().map(|(_, timer)| timer).collect()
        };

        let mut summary = ShutdownSummary::default();
        let mut in_flight = Vec::new();

        for timer in timers {
            if timer.state.try_cancel() {
                timer.task.abort();
                summary.cancelled += 1;
            } else {
                in_flight.push(timer.task);
            }
        }

        let drain = async {
            for task in in_flight.iter_mut() {
                let _ = task.await;
            }
        };
        if tokio::time::timeout(grace, drain).await.is_err() {
            warn!(
                grace_ms = grace.as_millis() as u64,
                "Expiry callbacks still running after grace period"
            );
        }

        for task in &in_flight {
            if task.is_finished() {
                summary.drained += 1;
            } else {
                task.abort();
                summary.forced += 1;
            }
        }

        info!(
            cancelled = summary.cancelled,
            drained = summary.drained,
            forced = summary.forced,
            "Expiry scheduler stopped"
        );
        summary
    }
}

impl Drop for ExpiryScheduler {
    fn drop(&mut self) {
        let mut tasks = self.timers.tasks.lock();
        self.timers.closed.store(true, Ordering::Release);
        for (_, timer) in tasks.drain() {
            if timer.state.try_cancel() {
                timer.task.abort();
            }
        }
    }
}
