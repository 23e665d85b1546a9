//! Explicit conversion between domain records and store documents.
//!
//! The envelope is a distinct wrapper around the domain payload; both
//! directions convert explicitly, never by implicit field exclusion.

use crate::error::{Result, StoreError};
use crate::types::{Collection, Document, Revision};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A domain record that maps 1:1 to a document in a fixed collection.
pub trait Entity: Serialize + DeserializeOwned {
    /// Which collection this entity lives in.
    const COLLECTION: Collection;

    /// Stable identifier; the document key is `"{collection}_{id}"`.
    fn id(&self) -> &str;
}

/// Encode an entity for a first write (no prior revision).
pub fn encode<E: Entity>(entity: &E) -> Result<Document> {
    Ok(Document::new(
        E::COLLECTION.key(entity.id()),
        serde_json::to_value(entity)?,
    ))
}

/// Encode an entity for an update on top of a known revision.
pub fn encode_with_rev<E: Entity>(entity: &E, rev: Revision) -> Result<Document> {
    Ok(Document::with_rev(
        E::COLLECTION.key(entity.id()),
        rev,
        serde_json::to_value(entity)?,
    ))
}

/// Decode a document payload back into the domain type. The envelope's
/// key and revision are dropped here and never reach the caller.
pub fn decode<E: Entity>(doc: &Document) -> Result<E> {
    serde_json::from_value(doc.payload.clone())
        .map_err(|e| StoreError::Deserialization(format!("{}: {e}", doc.key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{KvEntry, Matter};

    #[test]
    fn test_encode_builds_composite_key() {
        let entry = KvEntry::new("theme", "dark");
        let doc = encode(&entry).unwrap();
        assert_eq!(doc.key, "kv_theme");
        assert!(doc.rev.is_none());
    }

    #[test]
    fn test_roundtrip_preserves_entity() {
        let matter = Matter::new("m1", "standup", chrono::Utc::now(), chrono::Utc::now());
        let doc = encode(&matter).unwrap();
        let decoded: Matter = decode(&doc).unwrap();
        assert_eq!(decoded, matter);
    }

    #[test]
    fn test_envelope_fields_stay_out_of_payload() {
        let entry = KvEntry::new("theme", "dark");
        let doc = encode(&entry).unwrap();
        let obj = doc.payload.as_object().unwrap();
        assert!(!obj.contains_key("rev"));
        assert!(!obj.contains_key("deleted"));
    }

    #[test]
    fn test_decode_wrong_shape_is_deserialization_error() {
        let doc = Document::new("matter_x", serde_json::json!({"not": "a matter"}));
        let result: Result<Matter> = decode(&doc);
        assert!(matches!(result, Err(StoreError::Deserialization(_))));
    }
}
