//! State management module
//!
//! Bookmarks let an incremental stream resume where the last completed run
//! stopped. They are read once at the start of a stream and written only
//! after every instance of that stream finished.
//!
//! # Overview
//!
//! - `State` - Singer-shaped bookmark document
//! - `BookmarkStore` - what the engine reads and commits through
//! - `StateManager` - file-backed store with atomic writes

mod manager;
mod types;

pub use manager::{BookmarkStore, StateManager};
pub use types::{Bookmark, State};
