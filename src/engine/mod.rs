//! The underlying engine boundary.
//!
//! Everything above this trait (namespacing, retry, replication,
//! maintenance, the domain façade) is engine-agnostic; any conforming
//! implementation is substitutable.

mod memory;

pub use memory::MemoryEngine;

use crate::error::Result;
use crate::types::{ChangeBatch, Document, EngineInfo, KeyRange, Revision};

/// Contract the document store requires from durable storage.
///
/// The engine serializes access per key and arbitrates concurrent writers
/// through revision-conflict detection; callers hold no locks of their own.
pub trait Engine: Send + Sync {
    /// Fetch the current version of a document.
    /// Fails with `NotFound` if the key is absent or tombstoned.
    fn get(&self, key: &str) -> Result<Document>;

    /// Write a document version. The presented revision must match the
    /// current one (or be `None` for a first write), otherwise the write
    /// fails with `Conflict`. Returns the new revision token.
    fn put(&self, doc: Document) -> Result<Revision>;

    /// Tombstone a document. Requires the current revision.
    fn remove(&self, key: &str, rev: &Revision) -> Result<Revision>;

    /// All live documents whose keys fall in `[range.start, range.end)`,
    /// in the engine's natural key order.
    fn all_docs(&self, range: &KeyRange) -> Result<Vec<Document>>;

    /// Head versions of documents changed after `since`, at most `limit`
    /// of them, plus the bookmark for the next page.
    fn changes_since(&self, since: u64, limit: usize) -> Result<ChangeBatch>;

    /// All retained revisions of one document, newest first.
    fn revisions(&self, key: &str) -> Result<Vec<Revision>>;

    /// Explicitly drop one superseded revision of a document.
    fn purge(&self, key: &str, rev: &Revision) -> Result<()>;

    /// Reclaim space for superseded revisions, retaining the newest
    /// `keep` per document.
    fn compact(&self, keep: usize) -> Result<()>;

    /// Drop orphaned index/view state. A no-op for engines without views.
    fn view_cleanup(&self) -> Result<()>;

    /// Engine-level counters.
    fn info(&self) -> Result<EngineInfo>;
}
