//! Pagination types and traits
//!
//! Defines the core pagination abstractions used by all strategies.

use crate::decode::Page;
use crate::http::ApiRequest;
use crate::types::Method;

/// Result of the next page computation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPage {
    /// More pages available after this cursor
    Continue {
        /// Opaque continuation token
        cursor: String,
    },
    /// No more pages
    Done,
}

impl NextPage {
    /// Create a continuation
    pub fn with_cursor(cursor: impl Into<String>) -> Self {
        Self::Continue {
            cursor: cursor.into(),
        }
    }
}

/// Where pagination parameters travel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamLocation {
    /// Query string (GET list endpoints)
    #[default]
    Query,
    /// Top-level fields of the JSON body (POST search)
    Body,
}

impl ParamLocation {
    /// Location matching an HTTP method
    pub fn for_method(method: Method) -> Self {
        match method {
            Method::GET => Self::Query,
            Method::POST => Self::Body,
        }
    }
}

/// Tracks pagination state during iteration
#[derive(Debug, Clone, Default)]
pub struct PaginationState {
    /// Pages fetched so far
    pub page: u32,
    /// Cursor for the next request
    pub cursor: Option<String>,
    /// Is pagination complete?
    pub done: bool,
}

impl PaginationState {
    /// Create a new pagination state
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark pagination as complete
    pub fn mark_done(&mut self) {
        self.done = true;
        self.cursor = None;
    }

    /// Count one fetched page
    pub fn next_page(&mut self) {
        self.page += 1;
    }

    /// Set cursor
    pub fn set_cursor(&mut self, cursor: String) {
        self.cursor = Some(cursor);
    }
}

/// Core trait for pagination strategies
pub trait Paginator: Send + Sync {
    /// Embed the pagination parameters for the upcoming request
    fn apply(&self, state: &PaginationState, request: &mut ApiRequest);

    /// Inspect a decoded page and decide whether another request follows
    fn process_page(&self, page: &Page, state: &mut PaginationState) -> NextPage;
}
