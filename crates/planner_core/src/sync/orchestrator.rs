//! Sync orchestrator: the single writer of one user's `PlannerState`.
//!
//! # Responsibility
//! - Own the in-memory state for one authenticated session.
//! - Write every accepted state through to the local cache before returning.
//! - Push changes to the remote store in the background and aggregate the
//!   outcome into a sync status.
//!
//! # Invariants
//! - After `mutate` returns, `state()` and the cache both hold the new state
//!   (unless the cache medium rejected the write, which is reported).
//! - Remote failures only ever degrade `sync_status`; they never block or
//!   fail a mutation.
//! - Load results replace the state wholesale; there is no merge.
//! - Background pushes are never cancelled; overlapping pushes resolve by
//!   last-write-wins on the remote store.
//! - Background work runs on a fixed worker pool in submission order; a
//!   `force_refresh` supersedes the status of every task queued before it.

use super::gateway::RemoteGateway;
use super::loader::{AggregateLoader, LoadOutcome, LoadReport};
use super::push::{run_push, PushPlan};
use super::tracker::{SyncStatus, TaskTracker};
use super::worker::{Job, WorkerPool};
use crate::cache::{CacheError, LocalCacheStore};
use crate::model::collection::CollectionKind;
use crate::model::state::PlannerState;
use log::{error, info, warn};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default number of background workers.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The session was closed (sign-out or identity change).
    SessionClosed,
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SessionClosed => write!(f, "planner session is closed"),
        }
    }
}

impl Error for SyncError {}

pub type SyncResult<T> = Result<T, SyncError>;

/// Lifecycle phase of an orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Bootstrapping,
    Ready,
    Closed,
}

/// Result of the synchronous part of `mutate`.
#[derive(Debug, Default)]
pub struct MutateOutcome {
    /// Set when the cache medium rejected the write.
    pub cache_error: Option<CacheError>,
    /// Collections handed to the background push, in push order.
    pub pushed: Vec<CollectionKind>,
}

/// Result of the synchronous part of `delete_record`.
#[derive(Debug, Default)]
pub struct DeleteOutcome {
    /// Whether the record was present locally.
    pub removed: bool,
    pub cache_error: Option<CacheError>,
}

/// Read model handed to presentation code.
#[derive(Debug, Clone, Copy)]
pub struct PlannerView<'a> {
    pub state: &'a PlannerState,
    pub sync_status: SyncStatus,
}

struct PendingRefresh {
    receiver: Receiver<LoadOutcome>,
    /// Mutation generation at the time the refresh started.
    generation: u64,
}

/// Owner of one user's planner state for the lifetime of a session.
pub struct SyncOrchestrator {
    user_id: String,
    phase: SessionPhase,
    state: PlannerState,
    cache: LocalCacheStore,
    gateway: Arc<dyn RemoteGateway>,
    tracker: Arc<TaskTracker>,
    workers: WorkerPool,
    pending_refresh: Option<PendingRefresh>,
    generation: u64,
    last_load_report: Option<LoadReport>,
}

impl SyncOrchestrator {
    /// Starts a session for `user_id`.
    ///
    /// With a cached snapshot the session is ready immediately and an
    /// authoritative reload runs in the background. Without one, this call
    /// blocks until the first load completes.
    pub fn bootstrap(
        user_id: impl Into<String>,
        cache: LocalCacheStore,
        gateway: Arc<dyn RemoteGateway>,
        max_in_flight: usize,
    ) -> Self {
        let user_id = user_id.into();
        let mut orchestrator = Self {
            user_id,
            phase: SessionPhase::Bootstrapping,
            state: PlannerState::default(),
            cache,
            gateway,
            tracker: Arc::new(TaskTracker::new()),
            workers: WorkerPool::new(max_in_flight),
            pending_refresh: None,
            generation: 0,
            last_load_report: None,
        };

        match orchestrator.cache.read(&orchestrator.user_id) {
            Some(cached) => {
                info!(
                    "event=bootstrap module=sync status=ok source=cache records={}",
                    cached.record_count()
                );
                orchestrator.state = cached;
                orchestrator.phase = SessionPhase::Ready;
                orchestrator.queue_refresh();
            }
            None => {
                info!("event=bootstrap module=sync status=start source=remote");
                let outcome = AggregateLoader::new(Arc::clone(&orchestrator.gateway))
                    .load_all(&orchestrator.user_id);
                orchestrator.tracker.record_outcome(outcome.report.is_degraded());
                orchestrator.apply_load(outcome);
                orchestrator.phase = SessionPhase::Ready;
            }
        }
        orchestrator
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Current in-memory state. Call `poll` first to pick up background reloads.
    pub fn state(&self) -> &PlannerState {
        &self.state
    }

    pub fn sync_status(&self) -> SyncStatus {
        self.tracker.status()
    }

    pub fn cache(&self) -> &LocalCacheStore {
        &self.cache
    }

    /// Report of the most recently applied load.
    pub fn last_load_report(&self) -> Option<&LoadReport> {
        self.last_load_report.as_ref()
    }

    /// Number of background tasks not yet finished.
    pub fn in_flight(&self) -> usize {
        self.tracker.in_flight()
    }

    /// Collections holding records whose last push failed.
    pub fn pending_retry(&self) -> BTreeSet<CollectionKind> {
        self.tracker.retry_set()
    }

    /// Applies a finished background reload, if any. Returns whether the
    /// state was replaced.
    pub fn poll(&mut self) -> bool {
        let Some(pending) = self.pending_refresh.take() else {
            return false;
        };
        match pending.receiver.try_recv() {
            Ok(outcome) if pending.generation == self.generation => {
                self.apply_load(outcome);
                true
            }
            Ok(_) => {
                info!(
                    "event=refresh_apply module=sync status=skipped reason=superseded_by_mutation"
                );
                false
            }
            Err(TryRecvError::Empty) => {
                self.pending_refresh = Some(pending);
                false
            }
            Err(TryRecvError::Disconnected) => {
                warn!("event=refresh_apply module=sync status=error error_code=refresh_task_lost");
                false
            }
        }
    }

    /// Polls and returns the presentation read model.
    pub fn view(&mut self) -> PlannerView<'_> {
        self.poll();
        PlannerView {
            state: &self.state,
            sync_status: self.tracker.status(),
        }
    }

    /// Replaces the whole state with `next`.
    ///
    /// The in-memory and cache updates complete before this returns; the
    /// remote push runs in the background.
    pub fn mutate(&mut self, next: PlannerState) -> SyncResult<MutateOutcome> {
        self.ensure_open()?;
        self.poll();

        let changed = next.changed_collections(&self.state);
        let retry = self.tracker.retry_set();
        let mut dirty = changed.into_iter().collect::<BTreeSet<_>>();
        dirty.extend(retry);

        for (kind, id) in next.duplicate_ids() {
            warn!(
                "event=mutate module=sync status=degraded reason=duplicate_id collection={} record_id={}",
                kind, id
            );
        }

        let plan = PushPlan {
            user_id: self.user_id.clone(),
            collections: CollectionKind::PUSH_ORDER
                .into_iter()
                .filter(|kind| dirty.contains(kind) && !next.records(*kind).is_empty())
                .map(|kind| (kind, next.records(kind).to_vec()))
                .collect(),
            budgets: (dirty.contains(&CollectionKind::Budgets) && !next.budgets.is_empty())
                .then(|| next.budgets.clone()),
        };

        self.state = next;
        self.generation += 1;
        let cache_error = self.write_cache();

        let pushed = plan.kinds();
        // Emptied collections have nothing to upsert; drop any stale retry.
        let emptied = dirty
            .iter()
            .copied()
            .filter(|kind| !pushed.contains(kind))
            .collect::<Vec<_>>();
        self.tracker.settle_collections(&emptied, &BTreeSet::new());
        if !plan.is_empty() {
            self.queue_push(plan);
        }

        Ok(MutateOutcome {
            cache_error,
            pushed,
        })
    }

    /// Removes one record locally and deletes it remotely in the background.
    ///
    /// Budgets are not addressable by record id; use `mutate` instead.
    pub fn delete_record(&mut self, kind: CollectionKind, id: &str) -> SyncResult<DeleteOutcome> {
        self.ensure_open()?;
        if !kind.is_record_collection() {
            return Ok(DeleteOutcome::default());
        }
        self.poll();

        let removed = self.state.remove_record(kind, id);
        self.generation += 1;
        let cache_error = if removed { self.write_cache() } else { None };
        self.queue_delete(kind, id.to_string());

        Ok(DeleteOutcome {
            removed,
            cache_error,
        })
    }

    /// Reloads every collection from the remote store and replaces the state.
    pub fn force_refresh(&mut self) -> SyncResult<LoadReport> {
        self.ensure_open()?;
        // Supersedes any background load still running.
        self.pending_refresh = None;

        let outcome = AggregateLoader::new(Arc::clone(&self.gateway)).load_all(&self.user_id);
        let report = outcome.report.clone();
        self.tracker.record_outcome(report.is_degraded());
        self.apply_load(outcome);
        Ok(report)
    }

    /// Blocks until background tasks finish, then polls. Returns `true` when idle.
    pub fn wait_for_idle(&mut self, timeout: Duration) -> bool {
        let idle = self.tracker.wait_idle(timeout);
        self.poll();
        idle
    }

    /// Ends the session. In-flight pushes keep running to completion.
    pub fn close(&mut self) {
        if self.phase == SessionPhase::Closed {
            return;
        }
        self.phase = SessionPhase::Closed;
        self.pending_refresh = None;
        info!(
            "event=session_close module=sync status=ok in_flight={}",
            self.tracker.in_flight()
        );
    }

    /// Closes the session and hands back the cache store for the next one.
    pub fn shutdown(mut self) -> LocalCacheStore {
        self.close();
        self.cache
    }

    fn ensure_open(&self) -> SyncResult<()> {
        if self.phase == SessionPhase::Closed {
            return Err(SyncError::SessionClosed);
        }
        Ok(())
    }

    fn apply_load(&mut self, outcome: LoadOutcome) {
        self.state = outcome.state;
        // The remote copy is now the local copy; nothing is left to resend.
        self.tracker.clear_retry();
        self.write_cache();
        self.last_load_report = Some(outcome.report);
    }

    fn write_cache(&mut self) -> Option<CacheError> {
        self.cache.write(&self.user_id, &self.state).err()
    }

    fn queue_refresh(&mut self) {
        let (sender, receiver) = mpsc::channel();
        let queued = self.tracker.register();
        let loader = AggregateLoader::new(Arc::clone(&self.gateway));
        let user_id = self.user_id.clone();

        let job: Job = Box::new(move || {
            let running = queued.start();
            let outcome = loader.load_all(&user_id);
            let degraded = outcome.report.is_degraded();
            // The orchestrator may already be gone; the outcome is then moot.
            let _ = sender.send(outcome);
            running.finish(degraded);
        });

        if self.workers.submit(job).is_err() {
            error!("event=refresh_submit module=sync status=error error_code=no_worker");
            return;
        }
        self.pending_refresh = Some(PendingRefresh {
            receiver,
            generation: self.generation,
        });
    }

    fn queue_push(&mut self, plan: PushPlan) {
        let queued = self.tracker.register();
        let gateway = Arc::clone(&self.gateway);
        let attempted = plan.kinds();
        let unsent = attempted.clone();

        let job: Job = Box::new(move || {
            let running = queued.start();
            let started_at = Instant::now();
            let report = run_push(gateway.as_ref(), &plan);
            running.settle_collections(&attempted, &report.failed_collections());
            info!(
                "event=push_task module=sync status={} duration_ms={}",
                if report.has_failures() { "error" } else { "ok" },
                started_at.elapsed().as_millis()
            );
            running.finish(report.has_failures());
        });

        if self.workers.submit(job).is_err() {
            error!("event=push_submit module=sync status=error error_code=no_worker");
            self.tracker
                .settle_collections(&unsent, &unsent.iter().copied().collect());
        }
    }

    fn queue_delete(&mut self, kind: CollectionKind, id: String) {
        let queued = self.tracker.register();
        let gateway = Arc::clone(&self.gateway);

        let job: Job = Box::new(move || {
            let running = queued.start();
            let failed = match gateway.delete(kind, &id) {
                Ok(()) => {
                    info!(
                        "event=record_delete module=sync status=ok collection={} record_id={}",
                        kind, id
                    );
                    false
                }
                Err(err) => {
                    warn!(
                        "event=record_delete module=sync status=error collection={} record_id={} error_code={} retryable={}",
                        kind, id, err.code, err.retryable
                    );
                    true
                }
            };
            running.finish(failed);
        });

        if self.workers.submit(job).is_err() {
            error!("event=delete_submit module=sync status=error error_code=no_worker");
        }
    }
}
