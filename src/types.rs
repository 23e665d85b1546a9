//! Core types for the document store.

use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Exclusive upper bound appended to a collection prefix when listing.
/// Sorts after every key a collection can legally contain.
const PREFIX_RANGE_END: char = '\u{fff0}';

/// Opaque version marker attached to a document.
///
/// A write must present the current token to succeed. Generations order
/// versions within one document's history; tokens are not comparable
/// across documents.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Revision {
    /// Monotonic per-document generation counter.
    pub generation: u64,
    /// Hex digest of the payload plus the parent token.
    pub digest: String,
}

impl Revision {
    /// Derive the successor token for a new document version.
    ///
    /// The digest covers the payload bytes and the parent token, so two
    /// histories that happen to converge on the same payload still carry
    /// distinguishable tokens.
    pub fn child(parent: Option<&Revision>, payload: &serde_json::Value) -> Result<Self> {
        let mut hasher = Sha256::new();
        hasher.update(serde_json::to_vec(payload)?);
        if let Some(parent) = parent {
            hasher.update(parent.to_string().as_bytes());
        }
        let digest = hex::encode(&hasher.finalize()[..16]);
        Ok(Revision {
            generation: parent.map_or(1, |p| p.generation + 1),
            digest,
        })
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.generation, self.digest)
    }
}

impl fmt::Debug for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Revision({}-{}...)", self.generation, &self.digest[..self.digest.len().min(8)])
    }
}

impl FromStr for Revision {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        let (generation, digest) = s
            .split_once('-')
            .ok_or_else(|| StoreError::InvalidRevision(s.to_string()))?;
        let generation: u64 = generation
            .parse()
            .map_err(|_| StoreError::InvalidRevision(s.to_string()))?;
        if generation == 0 {
            return Err(StoreError::InvalidRevision(s.to_string()));
        }
        if digest.is_empty() || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(StoreError::InvalidRevision(s.to_string()));
        }
        Ok(Revision {
            generation,
            digest: digest.to_string(),
        })
    }
}

/// The store's atomic unit: an opaque key, a revision token, and an
/// arbitrary JSON payload.
///
/// This envelope is the only place store-internal identity lives; domain
/// types returned to callers never carry key or revision fields.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Document {
    /// Globally unique key, immutable for the life of the record.
    pub key: String,

    /// Current revision token. `None` for a first write.
    pub rev: Option<Revision>,

    /// Application payload.
    pub payload: serde_json::Value,

    /// Tombstone marker, set by the engine when a document is removed.
    /// Carried through the change feed so deletes replicate.
    #[serde(default)]
    pub deleted: bool,
}

impl Document {
    /// Envelope for a first write (no prior revision).
    pub fn new(key: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            key: key.into(),
            rev: None,
            payload,
            deleted: false,
        }
    }

    /// Envelope for an update on top of a known revision.
    pub fn with_rev(key: impl Into<String>, rev: Revision, payload: serde_json::Value) -> Self {
        Self {
            key: key.into(),
            rev: Some(rev),
            payload,
            deleted: false,
        }
    }
}

/// Logical partition of the keyspace, realized as the key prefix
/// `"{collection}_"`. Boundaries are enforced only by key construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Collection {
    Matters,
    Todos,
    Tags,
    RepeatTasks,
    Notifications,
    Kv,
}

impl Collection {
    /// All collections, for iteration.
    pub const ALL: [Collection; 6] = [
        Collection::Matters,
        Collection::Todos,
        Collection::Tags,
        Collection::RepeatTasks,
        Collection::Notifications,
        Collection::Kv,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Matters => "matter",
            Collection::Todos => "todo",
            Collection::Tags => "tag",
            Collection::RepeatTasks => "repeat_task",
            Collection::Notifications => "notification",
            Collection::Kv => "kv",
        }
    }

    /// The key prefix for this collection.
    pub fn prefix(&self) -> String {
        format!("{}_", self.as_str())
    }

    /// Composite key for a record id in this collection.
    pub fn key(&self, id: &str) -> String {
        format!("{}_{}", self.as_str(), id)
    }

    /// Half-open key range covering every document in this collection.
    pub fn range(&self) -> KeyRange {
        let prefix = self.prefix();
        KeyRange {
            end: format!("{prefix}{PREFIX_RANGE_END}"),
            start: prefix,
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Half-open key interval `[start, end)` in the engine's natural key order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyRange {
    pub start: String,
    pub end: String,
}

impl KeyRange {
    pub fn contains(&self, key: &str) -> bool {
        key >= self.start.as_str() && key < self.end.as_str()
    }
}

/// One page of the engine's change feed.
#[derive(Clone, Debug)]
pub struct ChangeBatch {
    /// Head versions of documents changed after the requested sequence,
    /// in sequence order. Tombstones are included so deletes replicate.
    pub changes: Vec<Document>,

    /// Bookmark for the next page. Equals the requested sequence when
    /// the feed is drained.
    pub last_seq: u64,
}

impl ChangeBatch {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Engine-level counters.
#[derive(Clone, Copy, Debug, Default)]
pub struct EngineInfo {
    /// Live (non-tombstoned) documents.
    pub doc_count: u64,
    /// Highest change sequence the engine has assigned.
    pub update_seq: u64,
}
