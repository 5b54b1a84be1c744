//! # LiftLog Sync Engine
//!
//! Offline-first synchronization core for LiftLog.
//!
//! This crate provides:
//! - Sync orchestrator with an explicit lifecycle (idle → running →
//!   draining) and a bounded FIFO of queued triggers
//! - Push pipeline (dependency-ordered upload of pending local changes)
//! - Pull pipeline (deletion reconciliation + incremental merge)
//! - Last-writer-wins conflict resolution at record granularity
//! - Store trait seams and in-memory implementations for testing
//!
//! ## Architecture
//!
//! The engine implements a **push-then-pull** synchronization model:
//! 1. Upload pending local changes in entity dependency order
//! 2. Reconcile remote deletions (absence is the only deletion signal)
//! 3. Merge changed remote rows through the conflict resolver
//!
//! The local embedded store is the offline source of record between
//! syncs; the remote store is authoritative once connectivity is
//! available.
//!
//! ## Key Invariants
//!
//! - One sync cycle at a time; concurrent triggers queue
//! - Entity types are processed parents-first, push and pull alike
//! - A single record's remote failure never aborts its batch
//! - `last_sync_at` advances only on a fully completed cycle
//! - Foreign-key enforcement, disabled for the pull pass, is restored on
//!   every exit path

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod conflict;
mod error;
mod memory;
mod orchestrator;
mod pull;
mod push;
mod store;

pub use config::SyncConfig;
pub use conflict::{ConflictResolver, Resolution};
pub use error::{SyncError, SyncResult};
pub use memory::{MemoryLocalStore, MemoryRemoteStore, StaticConnectivity};
pub use orchestrator::{
    PeriodicSync, SyncOrchestrator, SyncReport, SyncState, SyncStats, TriggerSource,
};
pub use pull::{PullPipeline, PullReport};
pub use push::{PushPipeline, PushReport};
pub use store::{ConnectivityProbe, LocalStore, RemoteStore};
