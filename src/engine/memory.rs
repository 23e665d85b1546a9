//! Embedded engine: an in-memory keyspace with per-document revision
//! history, a change feed, and optional snapshot persistence.

use crate::engine::Engine;
use crate::error::{Result, StoreError};
use crate::types::{ChangeBatch, Document, EngineInfo, KeyRange, Revision};
use fs2::FileExt;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Magic bytes for the engine manifest.
const ENGINE_MAGIC: &[u8; 4] = b"DBK\0";

/// Current snapshot format version.
const ENGINE_VERSION: u8 = 1;

/// Snapshot file name inside the engine directory.
const SNAPSHOT_FILE: &str = "engine.bin";

/// One retained version of a document.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct StoredVersion {
    rev: Revision,
    payload: serde_json::Value,
    deleted: bool,
}

/// Full history of one key, oldest version first.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct DocHistory {
    versions: Vec<StoredVersion>,
    /// Change sequence of the newest version.
    seq: u64,
}

impl DocHistory {
    fn head(&self) -> &StoredVersion {
        // A history is never empty: it is created with its first version
        // and purge refuses to drop the head.
        self.versions.last().expect("empty document history")
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Inner {
    docs: BTreeMap<String, DocHistory>,
    update_seq: u64,
}

/// The embedded engine shipped with the crate.
///
/// Purely in-memory by default; `open` adds snapshot persistence under a
/// directory guarded by an exclusive file lock, so a second process
/// cannot corrupt the snapshot.
pub struct MemoryEngine {
    inner: RwLock<Inner>,
    persist: Option<Persist>,
}

struct Persist {
    path: PathBuf,
    _lock_file: File,
}

impl MemoryEngine {
    /// Create a transient engine with no persistence.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            persist: None,
        }
    }

    /// Open (or create) a persistent engine at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        fs::create_dir_all(&path)?;

        let manifest = path.join("MANIFEST");
        if manifest.exists() {
            Self::verify_manifest(&manifest)?;
        } else {
            Self::write_manifest(&manifest)?;
        }

        let lock_file = File::create(path.join("LOCK"))?;
        lock_file
            .try_lock_exclusive()
            .map_err(|_| StoreError::Locked)?;

        let snapshot = path.join(SNAPSHOT_FILE);
        let inner = if snapshot.exists() {
            rmp_serde::from_slice(&fs::read(&snapshot)?)?
        } else {
            Inner::default()
        };

        Ok(Self {
            inner: RwLock::new(inner),
            persist: Some(Persist {
                path,
                _lock_file: lock_file,
            }),
        })
    }

    /// Write the snapshot to disk. No-op for transient engines.
    pub fn save(&self) -> Result<()> {
        if let Some(persist) = &self.persist {
            let bytes = rmp_serde::to_vec(&*self.inner.read())?;
            fs::write(persist.path.join(SNAPSHOT_FILE), bytes)?;
        }
        Ok(())
    }

    fn write_manifest(path: &Path) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(ENGINE_MAGIC)?;
        file.write_all(&[ENGINE_VERSION])?;
        file.sync_all()?;
        Ok(())
    }

    fn verify_manifest(path: &Path) -> Result<()> {
        let mut file = File::open(path)?;
        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != ENGINE_MAGIC {
            return Err(StoreError::InvalidFormat("Invalid engine magic".into()));
        }
        let mut version = [0u8; 1];
        file.read_exact(&mut version)?;
        if version[0] != ENGINE_VERSION {
            return Err(StoreError::InvalidFormat(format!(
                "Unsupported engine version: {}",
                version[0]
            )));
        }
        Ok(())
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for MemoryEngine {
    fn get(&self, key: &str) -> Result<Document> {
        let inner = self.inner.read();
        let history = inner
            .docs
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        let head = history.head();
        if head.deleted {
            return Err(StoreError::NotFound(key.to_string()));
        }
        Ok(Document {
            key: key.to_string(),
            rev: Some(head.rev.clone()),
            payload: head.payload.clone(),
            deleted: false,
        })
    }

    fn put(&self, doc: Document) -> Result<Revision> {
        let mut inner = self.inner.write();

        // Revision the caller must have observed: the live head, or
        // nothing if the key is absent or tombstoned.
        let live_rev = inner
            .docs
            .get(&doc.key)
            .map(|h| h.head())
            .filter(|v| !v.deleted)
            .map(|v| v.rev.clone());
        if doc.rev != live_rev {
            return Err(StoreError::Conflict(doc.key));
        }

        // Generations keep counting across a tombstone so a recreated
        // document's history stays ordered.
        let parent = inner.docs.get(&doc.key).map(|h| h.head().rev.clone());
        let rev = Revision::child(parent.as_ref(), &doc.payload)?;

        inner.update_seq += 1;
        let seq = inner.update_seq;
        let history = inner.docs.entry(doc.key).or_insert_with(|| DocHistory {
            versions: Vec::new(),
            seq,
        });
        history.versions.push(StoredVersion {
            rev: rev.clone(),
            payload: doc.payload,
            deleted: false,
        });
        history.seq = seq;

        Ok(rev)
    }

    fn remove(&self, key: &str, rev: &Revision) -> Result<Revision> {
        let mut inner = self.inner.write();

        let history = inner
            .docs
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        let head = history.head();
        if head.deleted {
            return Err(StoreError::NotFound(key.to_string()));
        }
        if head.rev != *rev {
            return Err(StoreError::Conflict(key.to_string()));
        }

        let tombstone = Revision::child(Some(&head.rev), &serde_json::Value::Null)?;
        inner.update_seq += 1;
        let seq = inner.update_seq;
        let history = inner.docs.get_mut(key).expect("checked above");
        history.versions.push(StoredVersion {
            rev: tombstone.clone(),
            payload: serde_json::Value::Null,
            deleted: true,
        });
        history.seq = seq;

        Ok(tombstone)
    }

    fn all_docs(&self, range: &KeyRange) -> Result<Vec<Document>> {
        let inner = self.inner.read();
        Ok(inner
            .docs
            .range(range.start.clone()..range.end.clone())
            .filter(|(_, h)| !h.head().deleted)
            .map(|(key, h)| {
                let head = h.head();
                Document {
                    key: key.clone(),
                    rev: Some(head.rev.clone()),
                    payload: head.payload.clone(),
                    deleted: false,
                }
            })
            .collect())
    }

    fn changes_since(&self, since: u64, limit: usize) -> Result<ChangeBatch> {
        let inner = self.inner.read();

        let mut changed: Vec<(u64, &String, &DocHistory)> = inner
            .docs
            .iter()
            .filter(|(_, h)| h.seq > since)
            .map(|(k, h)| (h.seq, k, h))
            .collect();
        changed.sort_by_key(|(seq, _, _)| *seq);
        changed.truncate(limit);

        let last_seq = changed.last().map_or(since, |(seq, _, _)| *seq);
        let changes = changed
            .into_iter()
            .map(|(_, key, h)| {
                let head = h.head();
                Document {
                    key: key.clone(),
                    rev: Some(head.rev.clone()),
                    payload: head.payload.clone(),
                    deleted: head.deleted,
                }
            })
            .collect();

        Ok(ChangeBatch { changes, last_seq })
    }

    fn revisions(&self, key: &str) -> Result<Vec<Revision>> {
        let inner = self.inner.read();
        let history = inner
            .docs
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        Ok(history
            .versions
            .iter()
            .rev()
            .map(|v| v.rev.clone())
            .collect())
    }

    fn purge(&self, key: &str, rev: &Revision) -> Result<()> {
        let mut inner = self.inner.write();
        let history = inner
            .docs
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;

        if history.head().rev == *rev {
            return Err(StoreError::MaintenanceFailure(format!(
                "cannot purge head revision of {key}"
            )));
        }
        let idx = history
            .versions
            .iter()
            .position(|v| v.rev == *rev)
            .ok_or_else(|| StoreError::NotFound(format!("{key}@{rev}")))?;
        history.versions.remove(idx);
        Ok(())
    }

    fn compact(&self, keep: usize) -> Result<()> {
        let keep = keep.max(1);
        let mut inner = self.inner.write();
        for history in inner.docs.values_mut() {
            if history.versions.len() > keep {
                let drop = history.versions.len() - keep;
                history.versions.drain(..drop);
            }
        }
        Ok(())
    }

    fn view_cleanup(&self) -> Result<()> {
        // No secondary views to clean in the embedded engine.
        tracing::debug!("view cleanup: nothing to do");
        Ok(())
    }

    fn info(&self) -> Result<EngineInfo> {
        let inner = self.inner.read();
        Ok(EngineInfo {
            doc_count: inner.docs.values().filter(|h| !h.head().deleted).count() as u64,
            update_seq: inner.update_seq,
        })
    }
}

impl Drop for MemoryEngine {
    fn drop(&mut self) {
        // Best-effort snapshot on drop.
        let _ = self.save();
    }
}
