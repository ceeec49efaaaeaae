//! Decoder implementations

use super::types::{Page, RecordDecoder};
use crate::error::{Error, Result};
use crate::types::OptionStringExt;
use serde_json::Value;

/// Field holding the records of a list response
const RESULTS_FIELD: &str = "results";

/// Field holding the continuation token
const CURSOR_FIELD: &str = "next_cursor";

// ============================================================================
// Envelope Decoder
// ============================================================================

/// Decoder for the paginated list envelope
///
/// A missing `results` array is a contract violation and is never retried:
/// asking the same endpoint again cannot make it conform.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeDecoder;

impl RecordDecoder for EnvelopeDecoder {
    fn decode(&self, body: &Value) -> Result<Page> {
        let results = match body.get(RESULTS_FIELD) {
            Some(Value::Array(items)) => items,
            Some(other) => {
                return Err(Error::envelope(format!(
                    "'{RESULTS_FIELD}' must be an array, got {}",
                    type_name(other)
                )))
            }
            None => {
                return Err(Error::envelope(format!(
                    "response has no '{RESULTS_FIELD}' field"
                )))
            }
        };

        let mut records = Vec::with_capacity(results.len());
        for (index, item) in results.iter().enumerate() {
            match item {
                Value::Object(map) => records.push(map.clone()),
                other => {
                    return Err(Error::envelope(format!(
                        "'{RESULTS_FIELD}[{index}]' must be an object, got {}",
                        type_name(other)
                    )))
                }
            }
        }

        let next_cursor = body
            .get(CURSOR_FIELD)
            .and_then(Value::as_str)
            .map(String::from)
            .none_if_empty();

        Ok(Page::new(records, next_cursor))
    }
}

// ============================================================================
// Object Decoder
// ============================================================================

/// Decoder for endpoints returning a single object (e.g. `GET /pages/{id}`)
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectDecoder;

impl RecordDecoder for ObjectDecoder {
    fn decode(&self, body: &Value) -> Result<Page> {
        match body {
            Value::Object(map) => Ok(Page::new(vec![map.clone()], None)),
            other => Err(Error::envelope(format!(
                "expected a JSON object, got {}",
                type_name(other)
            ))),
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
