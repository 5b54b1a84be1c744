//! Push pipeline: uploads pending local changes in dependency order.

use std::sync::Arc;

use chrono::Utc;
use liftlog_model::{EntityKind, RemoteRecord, SyncRecord};
use tracing::{debug, warn};

use crate::error::SyncResult;
use crate::store::{LocalStore, RemoteStore};

/// Counters from one push pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushReport {
    /// Records upserted remotely and marked synced locally.
    pub pushed: u64,
    /// Tombstones whose remote deletion was confirmed and whose local row
    /// was removed.
    pub deleted: u64,
    /// Records the remote store rejected. They stay pending and are
    /// retried on the next sync.
    pub failed: u64,
}

impl PushReport {
    fn absorb(&mut self, outcome: PushOutcome) {
        match outcome {
            PushOutcome::Pushed => self.pushed += 1,
            PushOutcome::Deleted => self.deleted += 1,
            PushOutcome::Failed => self.failed += 1,
        }
    }
}

enum PushOutcome {
    Pushed,
    Deleted,
    Failed,
}

/// Walks pending local changes in topological order and uploads them.
pub struct PushPipeline<R, L> {
    remote: Arc<R>,
    local: Arc<L>,
}

impl<R: RemoteStore, L: LocalStore> PushPipeline<R, L> {
    /// Creates a push pipeline over the given stores.
    pub fn new(remote: Arc<R>, local: Arc<L>) -> Self {
        Self { remote, local }
    }

    /// Pushes all pending local changes for `user_id`.
    ///
    /// Entity types are processed in [`EntityKind::PUSH_ORDER`] so a parent
    /// row always reaches the remote store before rows referencing it. A
    /// single record's remote failure never aborts the batch or later
    /// entity types; local store failures are fatal to the pass.
    pub async fn push(&self, user_id: &str) -> SyncResult<PushReport> {
        let mut report = PushReport::default();

        for kind in EntityKind::PUSH_ORDER {
            let pending = self.local.pending_records(kind).await?;
            if pending.is_empty() {
                continue;
            }
            debug!(user_id, kind = %kind, pending = pending.len(), "pushing pending records");

            for record in &pending {
                report.absorb(self.push_record(kind, record).await?);
            }
        }

        Ok(report)
    }

    /// Pushes one record. Remote rejections are isolated into
    /// `PushOutcome::Failed`; only local store errors escape as `Err`.
    async fn push_record(&self, kind: EntityKind, record: &SyncRecord) -> SyncResult<PushOutcome> {
        if record.deleted {
            if let Err(error) = self.remote.delete(kind.table(), &record.id).await {
                warn!(kind = %kind, id = %record.id, %error, "remote delete failed, tombstone kept");
                return Ok(PushOutcome::Failed);
            }
            // The tombstone is only dropped once the remote delete landed.
            self.local.remove(kind, &record.id).await?;
            debug!(kind = %kind, id = %record.id, "tombstone propagated");
            Ok(PushOutcome::Deleted)
        } else {
            let outgoing = RemoteRecord::from_local(record, Utc::now());
            if let Err(error) = self.remote.upsert(kind.table(), outgoing).await {
                warn!(kind = %kind, id = %record.id, %error, "remote upsert failed, record stays pending");
                return Ok(PushOutcome::Failed);
            }
            self.local.mark_synced(kind, &record.id).await?;
            Ok(PushOutcome::Pushed)
        }
    }
}
