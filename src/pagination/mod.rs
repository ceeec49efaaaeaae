//! Pagination module
//!
//! Supports: Cursor (`start_cursor` / `next_cursor`), single request
//!
//! # Overview
//!
//! A [`Paginator`] decides what goes into each request and whether another
//! one follows; the [`PageDriver`] runs that loop for one stream instance,
//! strictly one request at a time.

mod driver;
mod strategies;
mod types;

pub use driver::PageDriver;
pub use strategies::{CursorPaginator, NoPaginator, CURSOR_PARAM, PAGE_SIZE_PARAM};
pub use types::{NextPage, PaginationState, Paginator, ParamLocation};

#[cfg(test)]
mod tests;
