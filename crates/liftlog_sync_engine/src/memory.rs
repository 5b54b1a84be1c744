//! In-memory store implementations for tests and examples.
//!
//! These mirror the trait contracts closely enough to exercise every
//! pipeline path: fault injection per record id, whole-store outages,
//! foreign-key validation on the remote side, and bookkeeping the tests
//! assert on (FK toggle pairing, concurrent-call high-water mark).

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use liftlog_model::{EntityKind, RemoteRecord, SyncMetadata, SyncRecord};
use parking_lot::RwLock;

use crate::error::{SyncError, SyncResult};
use crate::store::{ConnectivityProbe, LocalStore, RemoteStore};

/// An in-memory local store.
pub struct MemoryLocalStore {
    rows: RwLock<HashMap<EntityKind, BTreeMap<String, SyncRecord>>>,
    metadata: RwLock<SyncMetadata>,
    fk_enforcement: AtomicBool,
    fk_toggles: AtomicU64,
    fail_writes: AtomicBool,
}

impl Default for MemoryLocalStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLocalStore {
    /// Creates an empty store with foreign-key enforcement on.
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
            metadata: RwLock::new(SyncMetadata::default()),
            fk_enforcement: AtomicBool::new(true),
            fk_toggles: AtomicU64::new(0),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Seeds a row directly, bypassing the sync bookkeeping.
    pub fn insert(&self, kind: EntityKind, record: SyncRecord) {
        self.rows
            .write()
            .entry(kind)
            .or_default()
            .insert(record.id.clone(), record);
    }

    /// Reads a row without going through the async trait.
    pub fn record(&self, kind: EntityKind, id: &str) -> Option<SyncRecord> {
        self.rows.read().get(&kind)?.get(id).cloned()
    }

    /// All rows of a kind, ordered by id.
    pub fn snapshot(&self, kind: EntityKind) -> BTreeMap<String, SyncRecord> {
        self.rows.read().get(&kind).cloned().unwrap_or_default()
    }

    /// Current foreign-key enforcement state.
    pub fn fk_enforcement_enabled(&self) -> bool {
        self.fk_enforcement.load(Ordering::SeqCst)
    }

    /// Number of `set_fk_enforcement` calls seen. A completed pull pass
    /// contributes an even count.
    pub fn fk_toggle_count(&self) -> u64 {
        self.fk_toggles.load(Ordering::SeqCst)
    }

    /// Makes every subsequent write fail with a local store error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> SyncResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(SyncError::local("injected write failure"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl LocalStore for MemoryLocalStore {
    async fn pending_records(&self, kind: EntityKind) -> SyncResult<Vec<SyncRecord>> {
        Ok(self
            .rows
            .read()
            .get(&kind)
            .map(|rows| {
                rows.values()
                    .filter(|record| record.pending_sync)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn synced_ids(&self, kind: EntityKind) -> SyncResult<Vec<String>> {
        Ok(self
            .rows
            .read()
            .get(&kind)
            .map(|rows| {
                rows.values()
                    .filter(|record| !record.pending_sync)
                    .map(|record| record.id.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn referencing_ids(
        &self,
        kind: EntityKind,
        parent_field: &str,
        parent_id: &str,
    ) -> SyncResult<Vec<String>> {
        Ok(self
            .rows
            .read()
            .get(&kind)
            .map(|rows| {
                rows.values()
                    .filter(|record| record.fk(parent_field) == Some(parent_id))
                    .map(|record| record.id.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get(&self, kind: EntityKind, id: &str) -> SyncResult<Option<SyncRecord>> {
        Ok(self.record(kind, id))
    }

    async fn upsert(&self, kind: EntityKind, record: SyncRecord) -> SyncResult<()> {
        self.check_writable()?;
        self.insert(kind, record);
        Ok(())
    }

    async fn mark_synced(&self, kind: EntityKind, id: &str) -> SyncResult<()> {
        self.check_writable()?;
        let mut rows = self.rows.write();
        let record = rows
            .get_mut(&kind)
            .and_then(|rows| rows.get_mut(id))
            .ok_or_else(|| SyncError::local(format!("no such row to mark synced: {id}")))?;
        record.pending_sync = false;
        Ok(())
    }

    async fn remove(&self, kind: EntityKind, id: &str) -> SyncResult<()> {
        self.check_writable()?;
        if let Some(rows) = self.rows.write().get_mut(&kind) {
            rows.remove(id);
        }
        Ok(())
    }

    async fn set_fk_enforcement(&self, enabled: bool) -> SyncResult<()> {
        self.fk_toggles.fetch_add(1, Ordering::SeqCst);
        self.fk_enforcement.store(enabled, Ordering::SeqCst);
        Ok(())
    }

    async fn metadata(&self) -> SyncResult<SyncMetadata> {
        Ok(self.metadata.read().clone())
    }

    async fn put_metadata(&self, metadata: SyncMetadata) -> SyncResult<()> {
        self.check_writable()?;
        *self.metadata.write() = metadata;
        Ok(())
    }
}

/// An in-memory remote store.
#[derive(Default)]
pub struct MemoryRemoteStore {
    tables: RwLock<HashMap<String, BTreeMap<String, RemoteRecord>>>,
    reject_ids: RwLock<HashSet<String>>,
    unreachable: AtomicBool,
    enforce_fk: AtomicBool,
    call_delay: RwLock<Option<Duration>>,
    active_calls: AtomicUsize,
    max_active_calls: AtomicUsize,
}

impl MemoryRemoteStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a record directly.
    pub fn seed(&self, table: &str, record: RemoteRecord) {
        self.tables
            .write()
            .entry(table.to_string())
            .or_default()
            .insert(record.id.clone(), record);
    }

    /// Removes a record directly, simulating a deletion by another device.
    pub fn remove(&self, table: &str, id: &str) {
        if let Some(rows) = self.tables.write().get_mut(table) {
            rows.remove(id);
        }
    }

    /// Reads a record without going through the async trait.
    pub fn record(&self, table: &str, id: &str) -> Option<RemoteRecord> {
        self.tables.read().get(table)?.get(id).cloned()
    }

    /// Rejects every upsert or delete of the given record id.
    pub fn reject_id(&self, id: &str) {
        self.reject_ids.write().insert(id.to_string());
    }

    /// Clears a rejection set with [`Self::reject_id`].
    pub fn accept_id(&self, id: &str) {
        self.reject_ids.write().remove(id);
    }

    /// Makes every call fail as unreachable.
    pub fn fail_all(&self, fail: bool) {
        self.unreachable.store(fail, Ordering::SeqCst);
    }

    /// Rejects upserts whose foreign-key fields point at absent parents,
    /// the way the real backend does.
    pub fn enforce_foreign_keys(&self) {
        self.enforce_fk.store(true, Ordering::SeqCst);
    }

    /// Adds latency to every call, so tests can observe overlap.
    pub fn set_call_delay(&self, delay: Duration) {
        *self.call_delay.write() = Some(delay);
    }

    /// High-water mark of concurrently executing calls.
    pub fn max_active_calls(&self) -> usize {
        self.max_active_calls.load(Ordering::SeqCst)
    }

    async fn begin_call(&self) -> SyncResult<CallGuard<'_>> {
        let guard = CallGuard::enter(self);
        let delay = *self.call_delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(SyncError::remote_unavailable("remote store unreachable"));
        }
        Ok(guard)
    }

    fn check_accepts(&self, id: &str) -> SyncResult<()> {
        if self.reject_ids.read().contains(id) {
            Err(SyncError::remote_rejected(format!("record rejected: {id}")))
        } else {
            Ok(())
        }
    }

    fn check_foreign_keys(&self, table: &str, record: &RemoteRecord) -> SyncResult<()> {
        if !self.enforce_fk.load(Ordering::SeqCst) {
            return Ok(());
        }
        let Some(kind) = EntityKind::PULL_ORDER
            .into_iter()
            .find(|kind| kind.table() == table)
        else {
            return Ok(());
        };
        let (Some(parent), Some(field)) = (kind.parent(), kind.parent_field()) else {
            return Ok(());
        };
        let Some(parent_id) = record.fields.get(field).and_then(|value| value.as_str()) else {
            return Ok(());
        };
        let tables = self.tables.read();
        let exists = tables
            .get(parent.table())
            .is_some_and(|rows| rows.contains_key(parent_id));
        if exists {
            Ok(())
        } else {
            Err(SyncError::remote_rejected(format!(
                "foreign key violation: {table}.{field} -> {parent_id}"
            )))
        }
    }
}

struct CallGuard<'a> {
    store: &'a MemoryRemoteStore,
}

impl<'a> CallGuard<'a> {
    fn enter(store: &'a MemoryRemoteStore) -> Self {
        let active = store.active_calls.fetch_add(1, Ordering::SeqCst) + 1;
        store.max_active_calls.fetch_max(active, Ordering::SeqCst);
        Self { store }
    }
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        self.store.active_calls.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn upsert(&self, table: &str, record: RemoteRecord) -> SyncResult<()> {
        let _guard = self.begin_call().await?;
        self.check_accepts(&record.id)?;
        self.check_foreign_keys(table, &record)?;
        self.seed(table, record);
        Ok(())
    }

    async fn delete(&self, table: &str, id: &str) -> SyncResult<()> {
        let _guard = self.begin_call().await?;
        self.check_accepts(id)?;
        self.remove(table, id);
        Ok(())
    }

    async fn select_ids(&self, table: &str, user_id: &str) -> SyncResult<Vec<String>> {
        let _guard = self.begin_call().await?;
        Ok(self
            .tables
            .read()
            .get(table)
            .map(|rows| {
                rows.values()
                    .filter(|record| record.user_id == user_id)
                    .map(|record| record.id.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn select_changed(
        &self,
        table: &str,
        user_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> SyncResult<Vec<RemoteRecord>> {
        let _guard = self.begin_call().await?;
        Ok(self
            .tables
            .read()
            .get(table)
            .map(|rows| {
                rows.values()
                    .filter(|record| record.user_id == user_id)
                    .filter(|record| since.is_none_or(|cutoff| record.updated_at > cutoff))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// A connectivity probe backed by a settable flag.
pub struct StaticConnectivity {
    connected: AtomicBool,
}

impl StaticConnectivity {
    /// Creates a probe in the given state.
    pub fn new(connected: bool) -> Self {
        Self {
            connected: AtomicBool::new(connected),
        }
    }

    /// Flips the connectivity state.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }
}

impl Default for StaticConnectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ConnectivityProbe for StaticConnectivity {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
