//! Decoder types and traits
//!
//! Defines the core decoder abstractions.

use crate::error::Result;
use crate::types::Record;
use serde_json::Value;

/// One decoded response page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// Records in source order
    pub records: Vec<Record>,
    /// Continuation token, `None` when this is the last page
    pub next_cursor: Option<String>,
}

impl Page {
    /// Create a page
    pub fn new(records: Vec<Record>, next_cursor: Option<String>) -> Self {
        Self {
            records,
            next_cursor,
        }
    }

    /// Whether the source reported more pages
    pub fn has_more(&self) -> bool {
        self.next_cursor.is_some()
    }

    /// Number of records on this page
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the page has no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Which decoder a stream uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecoderKind {
    /// `{ results, next_cursor }` list envelope
    #[default]
    Envelope,
    /// The body is the record itself
    Object,
}

impl DecoderKind {
    /// Get the decoder for this kind
    pub fn decoder(self) -> &'static dyn RecordDecoder {
        match self {
            DecoderKind::Envelope => &super::EnvelopeDecoder,
            DecoderKind::Object => &super::ObjectDecoder,
        }
    }
}

/// Trait for decoding response bodies into pages
pub trait RecordDecoder: Send + Sync {
    /// Decode a parsed response body
    fn decode(&self, body: &Value) -> Result<Page>;
}
