//! Response decoder module
//!
//! Supports: the Notion list envelope and single-object responses
//!
//! # Overview
//!
//! Every list endpoint answers with the same envelope:
//!
//! ```json
//! { "results": [ { ... }, ... ], "next_cursor": "abc" | null }
//! ```
//!
//! The decoders turn one response body into a [`Page`]: the ordered records
//! and the optional continuation token.

mod decoders;
mod types;

pub use decoders::{EnvelopeDecoder, ObjectDecoder};
pub use types::{DecoderKind, Page, RecordDecoder};
