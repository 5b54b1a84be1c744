//! Store trait seams for the sync engine.
//!
//! The engine never touches a database or the network directly. It consumes
//! the local embedded store and the remote authoritative store through these
//! traits, which the application wires to its repository layer and API
//! client. `crate::memory` provides in-memory implementations for tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use liftlog_model::{EntityKind, RemoteRecord, SyncMetadata, SyncRecord};

use crate::error::SyncResult;

/// The local embedded store: the device's durable offline cache.
///
/// Implementations are expected to keep indexes on `(user_id)` and
/// `(pending_sync)` so the pending scans stay cheap.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// All rows of `kind` with an unsynced local change
    /// (`pending_sync = true`), tombstones included.
    async fn pending_records(&self, kind: EntityKind) -> SyncResult<Vec<SyncRecord>>;

    /// Ids of all rows of `kind` with no unsynced local change
    /// (`pending_sync = false`). Pending rows are excluded because they may
    /// be mid-upload and must not be reconciled as remote deletions.
    async fn synced_ids(&self, kind: EntityKind) -> SyncResult<Vec<String>>;

    /// Ids of rows of `kind` whose `parent_field` column equals
    /// `parent_id`. Used to cascade deletions through the dependency graph.
    async fn referencing_ids(
        &self,
        kind: EntityKind,
        parent_field: &str,
        parent_id: &str,
    ) -> SyncResult<Vec<String>>;

    /// Fetches a single row by id.
    async fn get(&self, kind: EntityKind, id: &str) -> SyncResult<Option<SyncRecord>>;

    /// Inserts or replaces a row.
    async fn upsert(&self, kind: EntityKind, record: SyncRecord) -> SyncResult<()>;

    /// Clears the row's `pending_sync` flag after a successful push.
    async fn mark_synced(&self, kind: EntityKind, id: &str) -> SyncResult<()>;

    /// Hard-deletes a single row. Does not cascade; the pull pipeline walks
    /// the dependency graph itself.
    async fn remove(&self, kind: EntityKind, id: &str) -> SyncResult<()>;

    /// Toggles foreign-key constraint enforcement.
    ///
    /// A store-global setting, not per-transaction. The pull pipeline pairs
    /// every disable with a re-enable on all exit paths.
    async fn set_fk_enforcement(&self, enabled: bool) -> SyncResult<()>;

    /// Reads the sync metadata record.
    async fn metadata(&self) -> SyncResult<SyncMetadata>;

    /// Replaces the sync metadata record.
    async fn put_metadata(&self, metadata: SyncMetadata) -> SyncResult<()>;
}

/// The remote authoritative store, consumed as an opaque networked CRUD
/// API.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Inserts or replaces a record by id.
    async fn upsert(&self, table: &str, record: RemoteRecord) -> SyncResult<()>;

    /// Deletes a record by id. Deleting an absent id is not an error.
    async fn delete(&self, table: &str, id: &str) -> SyncResult<()>;

    /// Id-only projection of all of the user's rows in `table`.
    async fn select_ids(&self, table: &str, user_id: &str) -> SyncResult<Vec<String>>;

    /// The user's rows in `table` with `updated_at > since`, or all of
    /// them when `since` is `None`.
    async fn select_changed(
        &self,
        table: &str,
        user_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> SyncResult<Vec<RemoteRecord>>;
}

/// Reports whether the device currently has network connectivity.
///
/// Expected to be a cheap, non-blocking read of platform state.
pub trait ConnectivityProbe: Send + Sync {
    /// True when the device is online.
    fn is_connected(&self) -> bool;
}
