//! Incremental cutoff
//!
//! An incremental stream reads from its stored bookmark (or the configured
//! start date) forward. The cutoff is fixed when the stream starts; records
//! older than it are dropped and the first page holding one ends pagination.
//! The high-water mark of what was actually emitted becomes the next bookmark.

mod filter;
mod timestamp;

pub use filter::{resolve_cutoff, CutoffFilter, FilteredPage, HighWaterMark};
pub use timestamp::parse_timestamp;
