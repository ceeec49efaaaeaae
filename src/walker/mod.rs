//! Recursive block tree walker
//!
//! Notion exposes a page's content as a tree of blocks, but the API only
//! lists one level at a time (`GET /blocks/{id}/children`, cursor-paginated).
//! The [`TreeWalker`] rebuilds the whole tree for one page by expanding
//! blocks with `has_children` until its [`Frontier`] is empty, tagging each
//! block with the page it belongs to and the block that contains it.

mod frontier;
mod walk;

pub use frontier::{Frontier, FrontierEntry};
pub use walk::{
    NodeFailure, TreeWalker, WalkReport, BLOCK_ID_KEY, CHILDREN_PATH, PAGE_ID_FIELD, PAGE_ID_KEY,
    PARENT_BLOCK_ID_FIELD,
};

#[cfg(test)]
mod tests;
