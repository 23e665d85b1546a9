//! # Daybook
//!
//! An embedded, revision-tracked document store for a personal task
//! manager: matters, todos, tags, repeat tasks, notifications, and
//! key/value settings over one namespaced key space.
//!
//! ## Core Concepts
//!
//! - **Documents**: JSON payloads under composite `{collection}_{id}` keys
//! - **Revisions**: Every write produces a `generation-digest` token;
//!   writes against a stale token are rejected as conflicts
//! - **Replication**: One-shot or live bidirectional sync with another
//!   replica, with lifecycle events on a channel
//! - **Maintenance**: Background pruning of superseded revision history
//!
//! ## Example
//!
//! ```ignore
//! use daybook::{Daybook, Todo};
//!
//! let book = Daybook::in_memory();
//!
//! book.create_todo(&Todo::new("t1", "water the plants"))?;
//! let todo = book.get_todo("t1")?.expect("just created");
//!
//! // Live sync with a second replica
//! let replicator = book.replicate_with(remote_engine);
//! let handle = replicator.start_live();
//! ```

pub mod engine;
pub mod error;
pub mod facade;
pub mod maintenance;
pub mod records;
pub mod replication;
pub mod retry;
pub mod store;
pub mod types;

// Re-exports
pub use engine::{Engine, MemoryEngine};
pub use error::{Result, StoreError};
pub use facade::Daybook;
pub use maintenance::{Compactor, MaintenanceConfig};
pub use records::{
    KvEntry, Matter, MatterKind, NotificationRecord, NotificationStatus, RepeatTask,
    RepeatTaskStatus, Tag, Todo, TodoStatus,
};
pub use replication::{
    Checkpoint, Replicator, SyncDirection, SyncEvent, SyncHandle, SyncOptions, SyncStats,
};
pub use retry::RetryPolicy;
pub use store::{DocStore, StoreConfig};
pub use types::*;
