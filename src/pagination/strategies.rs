//! Pagination strategy implementations

use super::types::{NextPage, PaginationState, Paginator, ParamLocation};
use crate::config::MAX_PAGE_SIZE;
use crate::decode::Page;
use crate::http::ApiRequest;
use crate::types::Method;
use serde_json::Value;

/// Request parameter carrying the continuation token
pub const CURSOR_PARAM: &str = "start_cursor";

/// Request parameter carrying the page size
pub const PAGE_SIZE_PARAM: &str = "page_size";

// ============================================================================
// Cursor Pagination
// ============================================================================

/// Cursor pagination over `start_cursor` / `next_cursor`
///
/// The first request carries only `page_size`; every later one also carries
/// the cursor returned by the previous page. GET endpoints take both in the
/// query string, `POST /search` takes them in the body.
#[derive(Debug, Clone)]
pub struct CursorPaginator {
    /// Where the parameters go
    pub location: ParamLocation,
    /// Items requested per page
    pub page_size: u32,
}

impl CursorPaginator {
    /// Create a new cursor paginator
    pub fn new(location: ParamLocation, page_size: u32) -> Self {
        Self {
            location,
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Paginator for a request method
    pub fn for_method(method: Method, page_size: u32) -> Self {
        Self::new(ParamLocation::for_method(method), page_size)
    }

    fn set(&self, request: &mut ApiRequest, key: &str, value: Value) {
        match self.location {
            ParamLocation::Query => {
                let text = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                request.query.insert(key.to_string(), text);
            }
            ParamLocation::Body => request.set_body_field(key, value),
        }
    }
}

impl Paginator for CursorPaginator {
    fn apply(&self, state: &PaginationState, request: &mut ApiRequest) {
        self.set(request, PAGE_SIZE_PARAM, Value::from(self.page_size));
        if let Some(cursor) = &state.cursor {
            self.set(request, CURSOR_PARAM, Value::String(cursor.clone()));
        }
    }

    fn process_page(&self, page: &Page, state: &mut PaginationState) -> NextPage {
        match &page.next_cursor {
            Some(cursor) => {
                state.set_cursor(cursor.clone());
                NextPage::with_cursor(cursor.clone())
            }
            None => {
                state.mark_done();
                NextPage::Done
            }
        }
    }
}

// ============================================================================
// No Pagination
// ============================================================================

/// No pagination - single request
///
/// Single-object endpoints reject `page_size`, so nothing is added.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPaginator;

impl Paginator for NoPaginator {
    fn apply(&self, _state: &PaginationState, _request: &mut ApiRequest) {}

    fn process_page(&self, _page: &Page, state: &mut PaginationState) -> NextPage {
        state.mark_done();
        NextPage::Done
    }
}
