//! In-flight background task tracking.
//!
//! # Responsibility
//! - Aggregate task outcomes into one `SyncStatus`.
//! - Remember which collections still hold records that failed to push.
//!
//! # Invariants
//! - Status is `Syncing` while any registered task has not finished.
//! - Once idle, status is `Error` if any task of the last busy period failed
//!   or a collection is still waiting to be resent.
//! - A task started before the latest foreground load (an older epoch) only
//!   releases its slot; its outcome and retry marks are ignored.
//! - A task slot is always released, even when the task panics.

use crate::model::collection::CollectionKind;
use std::collections::BTreeSet;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Sync status exposed to presentation code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Idle,
    Syncing,
    Error,
}

impl SyncStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Syncing => "syncing",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Default)]
struct TrackerState {
    queued: usize,
    running: usize,
    epoch: u64,
    /// Some current-epoch task failed since the tracker was last idle.
    period_failed: bool,
    last_failed: bool,
    retry: BTreeSet<CollectionKind>,
}

impl TrackerState {
    fn in_flight(&self) -> usize {
        self.queued + self.running
    }

    fn complete(&mut self, epoch: u64, failed: bool) {
        if epoch == self.epoch {
            self.period_failed |= failed;
        }
        if self.in_flight() == 0 {
            self.last_failed = self.period_failed;
        }
    }
}

#[derive(Debug, Default)]
pub struct TaskTracker {
    state: Mutex<TrackerState>,
    changed: Condvar,
}

impl TaskTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a task before it is queued, so status flips to `Syncing`
    /// synchronously.
    pub fn register(self: &Arc<Self>) -> QueuedTask {
        let mut state = self.lock();
        if state.in_flight() == 0 {
            state.period_failed = false;
        }
        state.queued += 1;
        QueuedTask {
            tracker: Arc::clone(self),
            epoch: state.epoch,
            started: false,
        }
    }

    pub fn status(&self) -> SyncStatus {
        let state = self.lock();
        if state.in_flight() > 0 {
            SyncStatus::Syncing
        } else if state.last_failed || !state.retry.is_empty() {
            SyncStatus::Error
        } else {
            SyncStatus::Idle
        }
    }

    pub fn in_flight(&self) -> usize {
        self.lock().in_flight()
    }

    /// Records the outcome of a load that ran on the caller's thread.
    ///
    /// Starts a new epoch: tasks registered earlier no longer affect status.
    pub fn record_outcome(&self, failed: bool) {
        let mut state = self.lock();
        state.epoch += 1;
        state.period_failed = failed;
        state.last_failed = failed;
        drop(state);
        self.changed.notify_all();
    }

    /// Collections whose last push left at least one record unsynced.
    pub fn retry_set(&self) -> BTreeSet<CollectionKind> {
        self.lock().retry.clone()
    }

    /// Updates the retry set after a push touched `attempted`.
    pub fn settle_collections(&self, attempted: &[CollectionKind], failed: &BTreeSet<CollectionKind>) {
        settle(&mut self.lock().retry, attempted, failed);
    }

    pub fn clear_retry(&self) {
        self.lock().retry.clear();
    }

    /// Blocks until no task is in flight or `timeout` elapses.
    ///
    /// Returns `true` when idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        while state.in_flight() > 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            state = match self.changed.wait_timeout(state, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        true
    }
}

fn settle(
    retry: &mut BTreeSet<CollectionKind>,
    attempted: &[CollectionKind],
    failed: &BTreeSet<CollectionKind>,
) {
    for kind in attempted {
        if failed.contains(kind) {
            retry.insert(*kind);
        } else {
            retry.remove(kind);
        }
    }
}

/// A registered task waiting for a worker.
pub struct QueuedTask {
    tracker: Arc<TaskTracker>,
    epoch: u64,
    started: bool,
}

impl QueuedTask {
    pub fn start(mut self) -> RunningTask {
        {
            let mut state = self.tracker.lock();
            state.queued -= 1;
            state.running += 1;
        }
        self.started = true;
        RunningTask {
            tracker: Arc::clone(&self.tracker),
            epoch: self.epoch,
            finished: false,
        }
    }
}

impl Drop for QueuedTask {
    fn drop(&mut self) {
        if self.started {
            return;
        }
        // Never reached a worker: count as a failed task.
        let mut state = self.tracker.lock();
        state.queued -= 1;
        state.complete(self.epoch, true);
        drop(state);
        self.tracker.changed.notify_all();
    }
}

/// A task holding a running slot until it finishes or is dropped.
pub struct RunningTask {
    tracker: Arc<TaskTracker>,
    epoch: u64,
    finished: bool,
}

impl RunningTask {
    /// Updates the retry set, unless a foreground load superseded this task.
    pub fn settle_collections(&self, attempted: &[CollectionKind], failed: &BTreeSet<CollectionKind>) {
        let mut state = self.tracker.lock();
        if state.epoch == self.epoch {
            settle(&mut state.retry, attempted, failed);
        }
    }

    pub fn finish(mut self, failed: bool) {
        self.release(failed);
    }

    fn release(&mut self, failed: bool) {
        if self.finished {
            return;
        }
        self.finished = true;
        let mut state = self.tracker.lock();
        state.running -= 1;
        state.complete(self.epoch, failed);
        drop(state);
        self.tracker.changed.notify_all();
    }
}

impl Drop for RunningTask {
    fn drop(&mut self) {
        self.release(true);
    }
}
