//! State types for tracking sync progress
//!
//! The persisted document is Singer-shaped:
//!
//! ```json
//! {"bookmarks": {"search": {"replication_key": "last_edited_time",
//!                           "replication_key_value": "2024-02-10T00:00:00.000Z"}}}
//! ```
//!
//! Unknown fields are preserved so a state file written by another tool
//! survives a round trip.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Complete state for a tap
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// Per-stream bookmarks
    #[serde(default)]
    pub bookmarks: BTreeMap<String, Bookmark>,

    /// Fields this tap does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl State {
    /// Create a new empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the bookmark of a stream
    pub fn get_bookmark(&self, stream: &str) -> Option<&Bookmark> {
        self.bookmarks.get(stream)
    }

    /// Replication value of a stream, as text
    pub fn get_value(&self, stream: &str) -> Option<String> {
        self.bookmarks.get(stream)?.value()
    }

    /// Set the bookmark of a stream
    pub fn set_bookmark(&mut self, stream: &str, replication_key: &str, value: &str) {
        let bookmark = self.bookmarks.entry(stream.to_string()).or_default();
        bookmark.replication_key = Some(replication_key.to_string());
        bookmark.replication_key_value = Some(Value::String(value.to_string()));
    }
}

/// Bookmark of one stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    /// Field the value was read from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_key: Option<String>,

    /// Highest replication value emitted by a completed run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_key_value: Option<Value>,

    /// Fields this tap does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Bookmark {
    /// Replication value as text
    ///
    /// A non-string value (e.g. a number written by hand) is returned as its
    /// JSON text so that cutoff resolution can reject it explicitly.
    pub fn value(&self) -> Option<String> {
        match self.replication_key_value.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_state_default() {
        let state = State::new();
        assert!(state.bookmarks.is_empty());
        assert!(state.get_value("search").is_none());
    }

    #[test]
    fn test_set_bookmark_shape() {
        let mut state = State::new();
        state.set_bookmark("search", "last_edited_time", "2024-02-10T00:00:00.000Z");

        assert_eq!(
            serde_json::to_value(&state).unwrap(),
            json!({"bookmarks": {"search": {
                "replication_key": "last_edited_time",
                "replication_key_value": "2024-02-10T00:00:00.000Z"
            }}})
        );
        assert_eq!(
            state.get_value("search").as_deref(),
            Some("2024-02-10T00:00:00.000Z")
        );
    }

    #[test]
    fn test_unknown_fields_survive() {
        let raw = json!({
            "bookmarks": {"search": {
                "replication_key": "last_edited_time",
                "replication_key_value": "2024-01-01",
                "starting_replication_value": "2023-01-01"
            }},
            "currently_syncing": null
        });
        let state: State = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(state.get_value("search").as_deref(), Some("2024-01-01"));
        assert_eq!(serde_json::to_value(&state).unwrap(), raw);
    }

    #[test]
    fn test_non_string_value_is_flagged() {
        let state: State = serde_json::from_value(json!({
            "bookmarks": {"search": {"replication_key_value": 17}}
        }))
        .unwrap();
        assert_eq!(state.get_value("search").as_deref(), Some("17"));
    }
}
