//! # LiftLog Model
//!
//! Entity model and dependency graph for LiftLog sync.
//!
//! This crate provides:
//! - `EntityKind` and the foreign-key dependency graph
//! - `SyncRecord` / `RemoteRecord` row shapes
//! - `SyncMetadata` for incremental sync cursors
//!
//! This is a pure data-model crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod entity;
mod metadata;
mod record;

pub use entity::EntityKind;
pub use metadata::SyncMetadata;
pub use record::{Fields, RemoteRecord, SyncRecord};
