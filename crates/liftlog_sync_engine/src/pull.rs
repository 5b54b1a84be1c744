//! Pull pipeline: reconciles remote deletions and merges remote changes.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use liftlog_model::{EntityKind, SyncRecord};
use tracing::{debug, warn};

use crate::conflict::{ConflictResolver, Resolution};
use crate::error::SyncResult;
use crate::store::{LocalStore, RemoteStore};

/// Counters from one pull pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PullReport {
    /// Remote rows accepted and upserted locally.
    pub applied: u64,
    /// Remote rows declined because a pending local edit is newer.
    pub kept_local: u64,
    /// Local rows removed because they no longer exist remotely,
    /// cascaded children included.
    pub deleted_locally: u64,
}

/// Walks remote entities in dependency order, reconciling deletions and
/// merging incoming rows through the conflict resolver.
pub struct PullPipeline<R, L> {
    remote: Arc<R>,
    local: Arc<L>,
    resolver: ConflictResolver,
}

impl<R: RemoteStore, L: LocalStore> PullPipeline<R, L> {
    /// Creates a pull pipeline over the given stores.
    pub fn new(remote: Arc<R>, local: Arc<L>) -> Self {
        Self {
            remote,
            local,
            resolver: ConflictResolver,
        }
    }

    /// Pulls remote state for `user_id`, fetching rows changed after
    /// `since` (all rows when `None`).
    ///
    /// Local foreign-key enforcement is off for the whole pass:
    /// reconciliation and the fixed-order upserts can be transiently
    /// inconsistent even though the end state is not. It is re-enabled on
    /// every exit path, errors included.
    pub async fn pull(
        &self,
        user_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> SyncResult<PullReport> {
        self.local.set_fk_enforcement(false).await?;
        let outcome = self.pull_inner(user_id, since).await;
        let restored = self.local.set_fk_enforcement(true).await;
        if let Err(error) = &restored {
            warn!(%error, "failed to re-enable foreign-key enforcement");
        }
        let report = outcome?;
        restored?;
        Ok(report)
    }

    async fn pull_inner(
        &self,
        user_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> SyncResult<PullReport> {
        let mut report = PullReport::default();

        for kind in EntityKind::PULL_ORDER {
            report.deleted_locally += self.reconcile_deletions(kind, user_id).await?;

            let changed = self
                .remote
                .select_changed(kind.table(), user_id, since)
                .await?;
            if changed.is_empty() {
                continue;
            }
            debug!(user_id, kind = %kind, changed = changed.len(), "merging remote rows");

            for remote_row in changed {
                let local_row = self.local.get(kind, &remote_row.id).await?;
                match self.resolver.resolve(local_row.as_ref(), &remote_row) {
                    Resolution::AcceptRemote => {
                        self.local
                            .upsert(kind, SyncRecord::from_remote(&remote_row))
                            .await?;
                        report.applied += 1;
                    }
                    Resolution::KeepLocal => report.kept_local += 1,
                }
            }
        }

        Ok(report)
    }

    /// Removes local rows that are absent from the remote id-set.
    ///
    /// The remote store emits no deletion events; absence is the only
    /// signal. Rows with a pending local change are exempt, they may be
    /// mid-upload.
    async fn reconcile_deletions(&self, kind: EntityKind, user_id: &str) -> SyncResult<u64> {
        let remote_ids: HashSet<String> = self
            .remote
            .select_ids(kind.table(), user_id)
            .await?
            .into_iter()
            .collect();
        let local_ids = self.local.synced_ids(kind).await?;

        let mut removed = 0;
        for id in local_ids {
            if remote_ids.contains(&id) {
                continue;
            }
            debug!(kind = %kind, id = %id, "row deleted remotely, removing locally");
            removed += self.remove_cascading(kind, &id).await?;
        }
        Ok(removed)
    }

    /// Depth-first cascade: dependents go first so no child ever points at
    /// a missing parent once enforcement is back on.
    async fn remove_cascading(&self, kind: EntityKind, id: &str) -> SyncResult<u64> {
        let mut removed = 0;
        for child in kind.children() {
            let Some(parent_field) = child.parent_field() else {
                continue;
            };
            for child_id in self
                .local
                .referencing_ids(child, parent_field, id)
                .await?
            {
                removed += Box::pin(self.remove_cascading(child, &child_id)).await?;
            }
        }
        self.local.remove(kind, id).await?;
        Ok(removed + 1)
    }
}
