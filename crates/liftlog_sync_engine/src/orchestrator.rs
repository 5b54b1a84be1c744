//! Sync orchestrator: exclusive lifecycle, trigger queue, pipelines.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use liftlog_model::SyncMetadata;
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::pull::{PullPipeline, PullReport};
use crate::push::{PushPipeline, PushReport};
use crate::store::{ConnectivityProbe, LocalStore, RemoteStore};

/// The orchestrator's lifecycle state.
///
/// One sync runs at a time. Triggers arriving mid-sync are queued and
/// serviced from `Draining` before the orchestrator returns to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No sync in flight.
    Idle,
    /// A triggered sync cycle is executing.
    Running,
    /// The in-flight trigger finished and queued triggers are being
    /// serviced.
    Draining,
}

/// What caused a sync to be requested. Carried in log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    /// Explicit user action.
    Manual,
    /// The app returned to the foreground.
    Foreground,
    /// Network connectivity was restored.
    ConnectivityRestored,
    /// The periodic timer fired.
    Periodic,
    /// Dequeued after an in-flight sync completed.
    Queued,
}

/// Cumulative counters across sync cycles.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Cycles that ran to completion.
    pub cycles_completed: u64,
    /// Records upserted remotely.
    pub records_pushed: u64,
    /// Remote rows applied locally.
    pub records_pulled: u64,
    /// Per-record push failures (records left pending).
    pub push_failures: u64,
    /// Local rows removed by deletion reconciliation.
    pub deletions_pulled: u64,
    /// Message of the most recent cycle failure, cleared on success.
    pub last_error: Option<String>,
}

/// Result of one completed sync cycle.
#[derive(Debug, Clone)]
pub struct SyncReport {
    /// Push pass counters.
    pub push: PushReport,
    /// Pull pass counters.
    pub pull: PullReport,
    /// When the cycle completed; also the new `last_sync_at`.
    pub completed_at: DateTime<Utc>,
    /// Wall-clock duration of the cycle.
    pub duration: Duration,
}

struct Lifecycle {
    state: SyncState,
    queue: VecDeque<String>,
}

impl Lifecycle {
    fn new() -> Self {
        Self {
            state: SyncState::Idle,
            queue: VecDeque::new(),
        }
    }

    fn enqueue(&mut self, user_id: &str, capacity: usize) -> SyncResult<()> {
        if self.queue.iter().any(|queued| queued == user_id) {
            debug!(user_id, "sync already queued, deduplicating");
            return Ok(());
        }
        if self.queue.len() >= capacity {
            return Err(SyncError::QueueFull { capacity });
        }
        debug!(user_id, "sync in flight, queueing trigger");
        self.queue.push_back(user_id.to_string());
        Ok(())
    }
}

/// Owns the exclusive sync lifecycle: single active sync, FIFO queue for
/// concurrent requests, push-then-pull sequencing, metadata updates.
pub struct SyncOrchestrator<R, L, C> {
    config: SyncConfig,
    local: Arc<L>,
    connectivity: Arc<C>,
    push: PushPipeline<R, L>,
    pull: PullPipeline<R, L>,
    lifecycle: Mutex<Lifecycle>,
    stats: RwLock<SyncStats>,
    last_report: RwLock<Option<SyncReport>>,
}

impl<R: RemoteStore, L: LocalStore, C: ConnectivityProbe> SyncOrchestrator<R, L, C> {
    /// Creates an orchestrator over the given stores.
    pub fn new(config: SyncConfig, remote: Arc<R>, local: Arc<L>, connectivity: Arc<C>) -> Self {
        Self {
            config,
            push: PushPipeline::new(Arc::clone(&remote), Arc::clone(&local)),
            pull: PullPipeline::new(remote, Arc::clone(&local)),
            local,
            connectivity,
            lifecycle: Mutex::new(Lifecycle::new()),
            stats: RwLock::new(SyncStats::default()),
            last_report: RwLock::new(None),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SyncState {
        self.lifecycle.lock().state
    }

    /// Cumulative sync statistics.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Report of the most recent completed cycle.
    pub fn last_report(&self) -> Option<SyncReport> {
        self.last_report.read().clone()
    }

    /// Requests a sync of `user_id`'s data.
    ///
    /// No connectivity is a silent no-op; the caller retries via the usual
    /// triggers once reconnected. If a sync is in flight the request is
    /// queued (deduplicated by user id) and serviced after it completes.
    pub async fn trigger(&self, user_id: &str) -> SyncResult<()> {
        self.trigger_from(user_id, TriggerSource::Manual).await
    }

    /// App-returned-to-foreground trigger.
    pub async fn on_foreground(&self, user_id: &str) -> SyncResult<()> {
        self.trigger_from(user_id, TriggerSource::Foreground).await
    }

    /// Connectivity-restored trigger.
    pub async fn on_connectivity_restored(&self, user_id: &str) -> SyncResult<()> {
        self.trigger_from(user_id, TriggerSource::ConnectivityRestored)
            .await
    }

    /// Requests a sync, recording what caused it.
    pub async fn trigger_from(&self, user_id: &str, source: TriggerSource) -> SyncResult<()> {
        if !self.connectivity.is_connected() {
            debug!(user_id, ?source, "sync skipped: offline");
            return Ok(());
        }

        {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.state != SyncState::Idle {
                return lifecycle.enqueue(user_id, self.config.max_queued_triggers);
            }
            lifecycle.state = SyncState::Running;
        }

        // From here every path must restore the lifecycle: run_cycle
        // returns a Result rather than unwinding, and drain_queue ends in
        // Idle once the queue is empty.
        let outcome = self.run_cycle(user_id, source).await;
        self.drain_queue().await;
        outcome
    }

    /// Resets the incremental cursor so the next pull treats every remote
    /// row as changed, then triggers. Used for first-login full hydration.
    pub async fn force_full_sync(&self, user_id: &str) -> SyncResult<()> {
        let mut metadata = self.local.metadata().await?;
        metadata.reset();
        self.local.put_metadata(metadata).await?;
        info!(user_id, "forcing full sync");
        self.trigger_from(user_id, TriggerSource::Manual).await
    }

    async fn run_cycle(&self, user_id: &str, source: TriggerSource) -> SyncResult<()> {
        let started = Instant::now();
        info!(user_id, ?source, "sync cycle started");

        match self.run_pipelines(user_id, started).await {
            Ok(report) => {
                {
                    let mut stats = self.stats.write();
                    stats.cycles_completed += 1;
                    stats.records_pushed += report.push.pushed;
                    stats.push_failures += report.push.failed;
                    stats.records_pulled += report.pull.applied;
                    stats.deletions_pulled += report.pull.deleted_locally;
                    stats.last_error = None;
                }
                info!(
                    user_id,
                    pushed = report.push.pushed,
                    push_failures = report.push.failed,
                    pulled = report.pull.applied,
                    deleted_locally = report.pull.deleted_locally,
                    duration_ms = report.duration.as_millis() as u64,
                    "sync cycle completed"
                );
                *self.last_report.write() = Some(report);
                Ok(())
            }
            Err(error) => {
                self.stats.write().last_error = Some(error.to_string());
                warn!(user_id, %error, "sync cycle failed");
                Err(error)
            }
        }
    }

    async fn run_pipelines(&self, user_id: &str, started: Instant) -> SyncResult<SyncReport> {
        let push = self.push.push(user_id).await?;
        let since = self.local.metadata().await?.last_sync_at;
        let pull = self.pull.pull(user_id, since).await?;

        // The cursor only advances when both stages ran to completion, so
        // a failed cycle re-fetches the same incremental window next time.
        let completed_at = Utc::now();
        self.local
            .put_metadata(SyncMetadata::completed(user_id, completed_at))
            .await?;

        Ok(SyncReport {
            push,
            pull,
            completed_at,
            duration: started.elapsed(),
        })
    }

    /// Services queued triggers, then returns the orchestrator to `Idle`.
    /// Failures of queued cycles are logged, not surfaced: their callers
    /// already returned when the trigger was enqueued.
    async fn drain_queue(&self) {
        loop {
            let next = {
                let mut lifecycle = self.lifecycle.lock();
                match lifecycle.queue.pop_front() {
                    Some(user_id) => {
                        lifecycle.state = SyncState::Draining;
                        Some(user_id)
                    }
                    None => {
                        lifecycle.state = SyncState::Idle;
                        None
                    }
                }
            };
            let Some(user_id) = next else { return };

            // Short pause so bursts of triggers do not thrash the stores.
            tokio::time::sleep(self.config.drain_delay).await;

            if !self.connectivity.is_connected() {
                debug!(user_id = %user_id, "queued sync skipped: connectivity lost");
                continue;
            }
            if let Err(error) = self.run_cycle(&user_id, TriggerSource::Queued).await {
                warn!(user_id = %user_id, %error, "queued sync failed");
            }
        }
    }
}

impl<R, L, C> SyncOrchestrator<R, L, C>
where
    R: RemoteStore + 'static,
    L: LocalStore + 'static,
    C: ConnectivityProbe + 'static,
{
    /// Starts a periodic sync driver for `user_id`.
    ///
    /// The returned handle stops the driver when cancelled or dropped.
    pub fn start_periodic(self: &Arc<Self>, user_id: &str) -> PeriodicSync {
        let orchestrator = Arc::clone(self);
        let user_id = user_id.to_string();
        let interval = self.config.periodic_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately; the first sync should
            // wait a full interval.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(error) = orchestrator
                    .trigger_from(&user_id, TriggerSource::Periodic)
                    .await
                {
                    warn!(user_id = %user_id, %error, "periodic sync failed");
                }
            }
        });

        PeriodicSync { handle }
    }
}

/// Handle for a running periodic sync driver.
pub struct PeriodicSync {
    handle: JoinHandle<()>,
}

impl PeriodicSync {
    /// Stops the periodic driver. An in-flight cycle is not interrupted
    /// mid-await by the cancel itself; it simply stops being re-driven.
    pub fn cancel(&self) {
        self.handle.abort();
    }
}

impl Drop for PeriodicSync {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
