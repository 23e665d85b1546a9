//! Bidirectional replication against a remote replica.

mod manager;
mod types;

pub use manager::Replicator;
pub use types::{Checkpoint, SyncDirection, SyncEvent, SyncHandle, SyncOptions, SyncStats};
