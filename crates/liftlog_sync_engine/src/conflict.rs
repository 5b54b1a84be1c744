//! Write-write conflict resolution.

use liftlog_model::{RemoteRecord, SyncRecord};
use tracing::debug;

/// Outcome of resolving an incoming remote row against the local copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Replace the local row wholesale with the remote version.
    AcceptRemote,
    /// Leave the local row untouched; its pending edit will be pushed on a
    /// later sync and then win remotely.
    KeepLocal,
}

/// Decides, per record, whether an incoming remote version overwrites the
/// local row.
///
/// Last-writer-wins at record granularity: accepting remote discards the
/// entire local row, not just the conflicting fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictResolver;

impl ConflictResolver {
    /// Resolves `remote` against the local row, if one exists.
    ///
    /// - no local row: accept remote (plain insert);
    /// - local row without a pending edit: accept remote unconditionally,
    ///   the local copy is stale by definition;
    /// - local row with a pending edit: accept remote only when its
    ///   `updated_at` is strictly newer than the local `modified_at`.
    pub fn resolve(&self, local: Option<&SyncRecord>, remote: &RemoteRecord) -> Resolution {
        let Some(local) = local else {
            return Resolution::AcceptRemote;
        };

        if !local.pending_sync {
            return Resolution::AcceptRemote;
        }

        if remote.updated_at > local.modified_at {
            debug!(
                id = %remote.id,
                local_modified_at = %local.modified_at,
                remote_updated_at = %remote.updated_at,
                "conflict: remote is newer, discarding pending local edit"
            );
            Resolution::AcceptRemote
        } else {
            debug!(
                id = %remote.id,
                local_modified_at = %local.modified_at,
                remote_updated_at = %remote.updated_at,
                "conflict: keeping pending local edit"
            );
            Resolution::KeepLocal
        }
    }
}
