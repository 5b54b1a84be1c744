//! Row shapes shared by every entity type.
//!
//! Local rows carry sync bookkeeping (`pending_sync`, `deleted`) alongside
//! the domain fields. Remote rows carry a server-assigned `updated_at` and
//! no tombstone flag: remote deletion is represented by absence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Domain payload of a record, keyed by column name.
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// A row in the local store.
///
/// Lifecycle: created with `pending_sync = true`; local mutation re-stamps
/// `modified_at` and re-sets `pending_sync`; a successful push clears
/// `pending_sync`; soft deletion sets `deleted = true, pending_sync = true`
/// and the row is retained until the push confirms the remote deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRecord {
    /// Unique identifier, stable across the local and remote stores.
    pub id: String,
    /// Owning user.
    pub user_id: String,
    /// Domain fields, including any foreign-key columns.
    pub fields: Fields,
    /// Local creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Local-clock timestamp of the last local write.
    pub modified_at: DateTime<Utc>,
    /// Whether the row has an unsynced local change.
    pub pending_sync: bool,
    /// Local tombstone awaiting propagation of the deletion.
    pub deleted: bool,
}

impl SyncRecord {
    /// Creates a new locally-authored record with a generated id.
    pub fn new(user_id: impl Into<String>, fields: Fields) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), user_id, fields)
    }

    /// Creates a new locally-authored record with an explicit id.
    pub fn with_id(
        id: impl Into<String>,
        user_id: impl Into<String>,
        fields: Fields,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            user_id: user_id.into(),
            fields,
            created_at: now,
            modified_at: now,
            pending_sync: true,
            deleted: false,
        }
    }

    /// Builds a local row from a pulled remote row.
    ///
    /// The result is clean: no pending change, no tombstone. Accepting a
    /// remote row over a pending local one therefore discards the local
    /// edit wholesale.
    pub fn from_remote(remote: &RemoteRecord) -> Self {
        Self {
            id: remote.id.clone(),
            user_id: remote.user_id.clone(),
            fields: remote.fields.clone(),
            created_at: remote.created_at,
            modified_at: remote.updated_at,
            pending_sync: false,
            deleted: false,
        }
    }

    /// Records a local mutation: re-stamps `modified_at`, marks pending.
    pub fn touch(&mut self) {
        self.modified_at = Utc::now();
        self.pending_sync = true;
    }

    /// Soft-deletes the row. It stays in the local store as a tombstone
    /// until a push confirms the remote deletion.
    pub fn mark_deleted(&mut self) {
        self.deleted = true;
        self.touch();
    }

    /// Reads a foreign-key value out of the domain fields.
    pub fn fk(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(|value| value.as_str())
    }
}

/// A row in the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    /// Unique identifier, stable across the local and remote stores.
    pub id: String,
    /// Owning user.
    pub user_id: String,
    /// Domain fields, including any foreign-key columns.
    pub fields: Fields,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Server-assigned timestamp of the last accepted write.
    pub updated_at: DateTime<Utc>,
}

impl RemoteRecord {
    /// Builds the outgoing remote row for a push, stamping `updated_at`.
    pub fn from_local(local: &SyncRecord, stamped_at: DateTime<Utc>) -> Self {
        Self {
            id: local.id.clone(),
            user_id: local.user_id.clone(),
            fields: local.fields.clone(),
            created_at: local.created_at,
            updated_at: stamped_at,
        }
    }
}
