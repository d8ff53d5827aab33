//! The document service: read/write API over the stored banner document.
//!
//! Reads never fail. A missing, unparsable, or unconfigured store degrades
//! to the built-in default document so a broken backend can never blank the
//! display. Writes are full overwrites stamped with a server-side timestamp;
//! concurrent writers race and the last one wins, by design of the storage
//! contract.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::models::{BannerDocument, Direction, DEFAULT_COLOR, DEFAULT_SPEED};
use crate::storage::{KeyValueStore, StoreError};

/// Fixed key of the singleton document.
pub const DOCUMENT_KEY: &str = "bandeau:data";

// ============================================================================
// Stored Record
// ============================================================================

/// Persisted shape with every field optional, so partially written or
/// legacy records still load with per-field defaults.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredDocument {
    html: Option<String>,
    speed: Option<u32>,
    color: Option<String>,
    direction: Option<Direction>,
    #[serde(alias = "updatedAt")]
    last_modified: Option<DateTime<Utc>>,
}

/// Parse stored bytes into a document. The store may hold either an inline
/// JSON object or a JSON-encoded string containing the object (the format
/// the Edge-Config era persisted); both are accepted.
fn parse_stored(bytes: &[u8]) -> Option<StoredDocument> {
    let value: Value = serde_json::from_slice(bytes).ok()?;
    let value = match value {
        Value::String(inner) => serde_json::from_str(&inner).ok()?,
        other => other,
    };
    serde_json::from_value(value).ok()
}

// ============================================================================
// Read / Write
// ============================================================================

/// Read the banner document. Never errors: any failure path yields the
/// default document.
pub fn read_document(store: Option<&dyn KeyValueStore>) -> BannerDocument {
    let Some(store) = store else {
        warn!("read with unconfigured store, serving defaults");
        return BannerDocument::default_document();
    };

    let bytes = match store.get(DOCUMENT_KEY) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return BannerDocument::default_document(),
        Err(e) => {
            warn!(error = %e, "store read failed, serving defaults");
            return BannerDocument::default_document();
        }
    };

    match parse_stored(&bytes) {
        Some(stored) => BannerDocument {
            html: stored.html.unwrap_or_else(crate::models::default_html),
            speed: stored.speed.unwrap_or(DEFAULT_SPEED),
            color: stored.color.unwrap_or_else(|| DEFAULT_COLOR.to_string()),
            direction: stored.direction.unwrap_or_default(),
            last_modified: stored.last_modified,
        },
        None => {
            warn!("stored document is unparsable, serving defaults");
            BannerDocument::default_document()
        }
    }
}

/// Write the banner document, stamping `last_modified` server-side. Any
/// client-provided timestamp on `candidate` is discarded. Returns the
/// document as persisted.
pub fn write_document(
    store: &dyn KeyValueStore,
    mut candidate: BannerDocument,
) -> Result<BannerDocument, StoreError> {
    candidate.last_modified = Some(Utc::now());
    let bytes = serde_json::to_vec(&candidate)
        .map_err(|e| StoreError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
    store.set(DOCUMENT_KEY, &bytes)?;
    Ok(candidate)
}

/// The document's last-modified timestamp, for the polling endpoint.
/// Degrades to "now" on every failure path so pollers are never blocked.
pub fn last_modified(store: Option<&dyn KeyValueStore>) -> DateTime<Utc> {
    store
        .and_then(|s| s.get(DOCUMENT_KEY).ok().flatten())
        .and_then(|bytes| parse_stored(&bytes))
        .and_then(|stored| stored.last_modified)
        .unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::default_html;
    use crate::storage::MemoryStore;

    #[test]
    fn missing_document_returns_defaults() {
        let store = MemoryStore::new();
        let doc = read_document(Some(&store));
        assert_eq!(doc.speed, 5);
        assert_eq!(doc.color, "#FFFFFF");
        assert_eq!(doc.direction, Direction::Horizontal);
        assert_eq!(doc.html, default_html());
    }

    #[test]
    fn unconfigured_store_returns_defaults() {
        let doc = read_document(None);
        assert_eq!(doc, BannerDocument::default_document());
    }

    #[test]
    fn unparsable_document_returns_defaults() {
        let store = MemoryStore::new();
        store.set(DOCUMENT_KEY, b"not json at all").unwrap();
        assert_eq!(read_document(Some(&store)), BannerDocument::default_document());
    }

    #[test]
    fn write_then_read_round_trips() {
        let store = MemoryStore::new();
        let before = Utc::now();

        let mut candidate = BannerDocument::default_document();
        candidate.html = "<b>breaking news</b>".to_string();
        candidate.speed = 30;
        candidate.color = "#00FF00".to_string();
        candidate.direction = Direction::Vertical;

        let written = write_document(&store, candidate).unwrap();
        assert!(written.last_modified.unwrap() >= before);

        let read_back = read_document(Some(&store));
        assert_eq!(read_back, written);
    }

    #[test]
    fn write_ignores_client_timestamp() {
        let store = MemoryStore::new();
        let mut candidate = BannerDocument::default_document();
        let bogus = "2000-01-01T00:00:00Z".parse().unwrap();
        candidate.last_modified = Some(bogus);

        let written = write_document(&store, candidate).unwrap();
        assert!(written.last_modified.unwrap() > bogus);
    }

    #[test]
    fn rewriting_same_payload_only_changes_timestamp() {
        let store = MemoryStore::new();
        let mut candidate = BannerDocument::default_document();
        candidate.html = "<b>same</b>".to_string();

        let first = write_document(&store, candidate.clone()).unwrap();
        let second = write_document(&store, candidate).unwrap();

        assert_eq!(first.html, second.html);
        assert_eq!(first.speed, second.speed);
        assert_eq!(first.color, second.color);
        assert_eq!(first.direction, second.direction);
        assert!(second.last_modified >= first.last_modified);
    }

    #[test]
    fn stringified_json_records_parse() {
        let store = MemoryStore::new();
        let inner = r##"{"html":"<b>legacy</b>","speed":8,"color":"#123ABC","updatedAt":"2024-05-06T07:08:09Z"}"##;
        let wrapped = serde_json::to_vec(&serde_json::Value::String(inner.to_string())).unwrap();
        store.set(DOCUMENT_KEY, &wrapped).unwrap();

        let doc = read_document(Some(&store));
        assert_eq!(doc.html, "<b>legacy</b>");
        assert_eq!(doc.speed, 8);
        assert_eq!(doc.color, "#123ABC");
        assert!(doc.last_modified.is_some());
    }

    #[test]
    fn partial_records_fall_back_per_field() {
        let store = MemoryStore::new();
        store.set(DOCUMENT_KEY, br##"{"html":"<b>only html</b>"}"##).unwrap();

        let doc = read_document(Some(&store));
        assert_eq!(doc.html, "<b>only html</b>");
        assert_eq!(doc.speed, 5);
        assert_eq!(doc.color, "#FFFFFF");
    }

    #[test]
    fn last_modified_degrades_to_now() {
        let before = Utc::now();
        let ts = last_modified(None);
        assert!(ts >= before);

        let store = MemoryStore::new();
        let ts = last_modified(Some(&store));
        assert!(ts >= before);
    }

    #[test]
    fn last_modified_reads_stored_timestamp() {
        let store = MemoryStore::new();
        let written = write_document(&store, BannerDocument::default_document()).unwrap();
        assert_eq!(last_modified(Some(&store)), written.last_modified.unwrap());
    }
}
