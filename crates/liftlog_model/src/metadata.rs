//! Sync metadata: the incremental-sync cursor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Single fixed-identity record tracking the last successful sync.
///
/// `last_sync_at = None` forces a full pull: every remote row is treated as
/// changed. Mutated only by the orchestrator at the end of a successful
/// cycle, or reset to `None` to force a full resync.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncMetadata {
    /// Timestamp of the last fully successful sync cycle.
    pub last_sync_at: Option<DateTime<Utc>>,
    /// The user whose data was last synchronized.
    pub user_id: Option<String>,
}

impl SyncMetadata {
    /// Metadata recorded after a successful cycle for `user_id`.
    pub fn completed(user_id: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            last_sync_at: Some(at),
            user_id: Some(user_id.into()),
        }
    }

    /// Clears the cursor so the next pull fetches every remote row.
    pub fn reset(&mut self) {
        self.last_sync_at = None;
    }

    /// Whether the next pull must treat all remote rows as changed.
    pub fn is_full_sync(&self) -> bool {
        self.last_sync_at.is_none()
    }
}
