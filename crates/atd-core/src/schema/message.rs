//! Inbox entry schema
//!
//! Inbox files live at `~/.claude/teams/{team}/inboxes/{member}.json` and
//! hold either a single message object or an ordered array of them. Each
//! parsed message becomes one [`InboxEntry`] tagged with a derived id and
//! its origin file — the origin file is the unit of replace/remove
//! consistency for inbox content.

use super::Document;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One message in a team's inbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxEntry {
    /// Derived id: `<file stem>_<index within the file>`
    pub id: String,

    /// The file this entry was parsed from
    pub source_file: PathBuf,

    /// Position of the message within its origin file
    pub source_index: usize,

    /// The original message object, passed through untouched
    #[serde(flatten)]
    pub payload: Document,
}

impl InboxEntry {
    /// Build an entry from one element of an inbox file.
    ///
    /// Returns `None` for non-object elements; those are malformed and the
    /// caller logs and skips them.
    pub fn from_value(value: serde_json::Value, source: &Path, index: usize) -> Option<Self> {
        let serde_json::Value::Object(payload) = value else {
            return None;
        };
        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        Some(Self {
            id: format!("{stem}_{index}"),
            source_file: source.to_path_buf(),
            source_index: index,
            payload,
        })
    }

    /// Sender identifier (the `"from"` field), if present.
    pub fn sender(&self) -> Option<&str> {
        self.payload.get("from").and_then(|v| v.as_str())
    }

    /// Raw timestamp string (the `"timestamp"` field), if present.
    pub fn timestamp(&self) -> Option<&str> {
        self.payload.get("timestamp").and_then(|v| v.as_str())
    }

    /// Sort key for inbox ordering.
    ///
    /// A missing or unparseable timestamp sorts as the Unix epoch, so such
    /// entries group at the front of the inbox rather than failing.
    pub fn sort_key(&self) -> DateTime<Utc> {
        self.timestamp()
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(DateTime::UNIX_EPOCH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_from(json: &str, source: &str, index: usize) -> Option<InboxEntry> {
        let value: serde_json::Value = serde_json::from_str(json).unwrap();
        InboxEntry::from_value(value, Path::new(source), index)
    }

    #[test]
    fn test_derived_id_from_stem_and_index() {
        let entry = entry_from(r#"{"from": "carol"}"#, "/teams/alpha/inboxes/bob.json", 2)
            .unwrap();
        assert_eq!(entry.id, "bob_2");
        assert_eq!(
            entry.source_file,
            PathBuf::from("/teams/alpha/inboxes/bob.json")
        );
        assert_eq!(entry.source_index, 2);
    }

    #[test]
    fn test_typed_accessors() {
        let entry = entry_from(
            r#"{"from": "carol", "timestamp": "2024-01-01T10:00:00Z", "text": "hi"}"#,
            "/t/inboxes/bob.json",
            0,
        )
        .unwrap();
        assert_eq!(entry.sender(), Some("carol"));
        assert_eq!(entry.timestamp(), Some("2024-01-01T10:00:00Z"));
        assert_eq!(
            entry.sort_key(),
            DateTime::parse_from_rfc3339("2024-01-01T10:00:00Z").unwrap()
        );
    }

    #[test]
    fn test_missing_timestamp_sorts_as_epoch() {
        let entry = entry_from(r#"{"from": "carol"}"#, "/t/inboxes/bob.json", 0).unwrap();
        assert_eq!(entry.sort_key(), DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn test_unparseable_timestamp_sorts_as_epoch() {
        let entry = entry_from(
            r#"{"timestamp": "yesterday-ish"}"#,
            "/t/inboxes/bob.json",
            0,
        )
        .unwrap();
        assert_eq!(entry.sort_key(), DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn test_non_object_element_rejected() {
        assert!(entry_from("42", "/t/inboxes/bob.json", 0).is_none());
        assert!(entry_from(r#""hello""#, "/t/inboxes/bob.json", 0).is_none());
    }

    #[test]
    fn test_payload_passes_through_unknown_fields() {
        let entry = entry_from(
            r#"{"from": "carol", "futureFeature": {"nested": "data"}}"#,
            "/t/inboxes/bob.json",
            0,
        )
        .unwrap();
        assert!(entry.payload.contains_key("futureFeature"));

        let serialized = serde_json::to_string(&entry).unwrap();
        let reparsed: InboxEntry = serde_json::from_str(&serialized).unwrap();
        assert_eq!(entry, reparsed);
    }

    #[test]
    fn test_serialized_shape_is_camel_case() {
        let entry = entry_from(r#"{"from": "carol"}"#, "/t/inboxes/bob.json", 1).unwrap();
        let serialized = serde_json::to_string(&entry).unwrap();
        assert!(serialized.contains("\"sourceFile\":"));
        assert!(serialized.contains("\"sourceIndex\":"));
        assert!(serialized.contains("\"id\":\"bob_1\""));
    }
}
