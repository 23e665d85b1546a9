//! Namespaced document store over a single underlying engine.

use crate::engine::Engine;
use crate::error::{Result, StoreError};
use crate::maintenance::MaintenanceConfig;
use crate::replication::SyncOptions;
use crate::retry::RetryPolicy;
use crate::types::{Collection, Document, EngineInfo, Revision};
use std::sync::Arc;

/// Store configuration. Every knob has a stated default and is
/// independently overridable at construction time.
#[derive(Clone, Debug, Default)]
pub struct StoreConfig {
    /// Conflict-retry policy for writes.
    pub retry: RetryPolicy,

    /// History compaction and size monitoring.
    pub maintenance: MaintenanceConfig,

    /// Replication batching and reconnection.
    pub sync: SyncOptions,
}

/// Generic get/list/put/delete over one engine, partitioned into fixed
/// named collections via key prefixing.
///
/// Reads distinguish `Ok(Some)` / `Ok(None)` / `Err`; an absent document
/// is never conflated with an empty one. Writes go straight to the
/// engine; conflict retry is the caller's concern (see [`crate::retry`]).
pub struct DocStore {
    engine: Arc<dyn Engine>,
    retry: RetryPolicy,
}

impl DocStore {
    pub fn new(engine: Arc<dyn Engine>, retry: RetryPolicy) -> Self {
        Self { engine, retry }
    }

    /// Handle to the underlying engine, shared with background components.
    pub fn engine(&self) -> Arc<dyn Engine> {
        Arc::clone(&self.engine)
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Fetch one document from a collection. Absent keys yield `Ok(None)`.
    pub fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>> {
        match self.engine.get(&collection.key(id)) {
            Ok(doc) => Ok(Some(doc)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// All documents in a collection, in the engine's natural key order.
    /// Callers must not read semantic ordering into it.
    pub fn list(&self, collection: Collection) -> Result<Vec<Document>> {
        self.engine.all_docs(&collection.range())
    }

    /// Write a document version. The key must already be a composite
    /// collection key (see [`Collection::key`]).
    pub fn put(&self, doc: Document) -> Result<Revision> {
        self.engine.put(doc)
    }

    /// Tombstone a document at a known revision. Deleting an absent key
    /// is a silent no-op; a stale revision is a `Conflict`.
    pub fn delete(&self, collection: Collection, id: &str, rev: &Revision) -> Result<()> {
        match self.engine.remove(&collection.key(id), rev) {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Fetch the current revision and tombstone it. No-op if absent.
    pub fn delete_current(&self, collection: Collection, id: &str) -> Result<()> {
        match self.get(collection, id)? {
            None => Ok(()),
            Some(doc) => {
                let rev = doc
                    .rev
                    .ok_or_else(|| StoreError::InvalidRevision(doc.key.clone()))?;
                self.delete(collection, id, &rev)
            }
        }
    }

    /// Engine counters (document count, update sequence).
    pub fn info(&self) -> Result<EngineInfo> {
        self.engine.info()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MemoryEngine;
    use serde_json::json;

    fn test_store() -> DocStore {
        DocStore::new(Arc::new(MemoryEngine::new()), RetryPolicy::default())
    }

    #[test]
    fn test_get_absent_is_none() {
        let store = test_store();
        assert!(store.get(Collection::Todos, "nope").unwrap().is_none());
    }

    #[test]
    fn test_collection_isolation() {
        let store = test_store();
        store
            .put(Document::new(Collection::Kv.key("alpha"), json!({"v": 1})))
            .unwrap();
        store
            .put(Document::new(Collection::Matters.key("alpha"), json!({"v": 2})))
            .unwrap();

        // Same id, two distinct keys.
        let kv = store.get(Collection::Kv, "alpha").unwrap().unwrap();
        let matter = store.get(Collection::Matters, "alpha").unwrap().unwrap();
        assert_ne!(kv.key, matter.key);

        // Listing one collection never returns the other's records.
        let kvs = store.list(Collection::Kv).unwrap();
        assert_eq!(kvs.len(), 1);
        assert_eq!(kvs[0].payload, json!({"v": 1}));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let store = test_store();
        let rev = store
            .put(Document::new(Collection::Todos.key("t1"), json!({})))
            .unwrap();

        store.delete(Collection::Todos, "t1", &rev).unwrap();
        // Second delete: silent no-op, never an error.
        store.delete(Collection::Todos, "t1", &rev).unwrap();
        store.delete_current(Collection::Todos, "t1").unwrap();
    }

    #[test]
    fn test_delete_with_stale_rev_conflicts() {
        let store = test_store();
        let stale = store
            .put(Document::new(Collection::Todos.key("t1"), json!({"n": 1})))
            .unwrap();
        store
            .put(Document::with_rev(
                Collection::Todos.key("t1"),
                stale.clone(),
                json!({"n": 2}),
            ))
            .unwrap();

        let result = store.delete(Collection::Todos, "t1", &stale);
        assert!(matches!(result, Err(StoreError::Conflict(_))));
    }

    #[test]
    fn test_list_is_key_ordered() {
        let store = test_store();
        for id in ["c", "a", "b"] {
            store
                .put(Document::new(Collection::Tags.key(id), json!({ "id": id })))
                .unwrap();
        }
        let keys: Vec<_> = store
            .list(Collection::Tags)
            .unwrap()
            .into_iter()
            .map(|d| d.key)
            .collect();
        assert_eq!(keys, vec!["tag_a", "tag_b", "tag_c"]);
    }
}
