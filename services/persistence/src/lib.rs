//! Book snapshot persistence
//!
//! Stores top-of-book snapshots on disk as a rebuildable cache. The
//! authoritative book state always lives with the order store; a
//! snapshot that fails its integrity check is simply discarded.

pub mod snapshot;

pub use snapshot::{
    BookSnapshot, LevelSnapshot, SnapshotError, SnapshotStore, SNAPSHOT_DEPTH, SNAPSHOT_VERSION,
};
