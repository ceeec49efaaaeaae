//! Traversal frontier

use crate::types::Traversal;
use std::collections::{HashSet, VecDeque};

/// One pending expansion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    /// Block (or page) whose children are listed
    pub block_id: String,
    /// Value stamped as `_parent_block_id` on the listed children
    pub parent_block_id: Option<String>,
    /// Page the tree belongs to
    pub page_id: String,
}

impl FrontierEntry {
    /// Entry listing the top-level blocks of a page
    pub fn root(page_id: impl Into<String>) -> Self {
        let page_id = page_id.into();
        Self {
            block_id: page_id.clone(),
            parent_block_id: None,
            page_id,
        }
    }

    /// Entry listing the children of a nested block
    pub fn child(block_id: impl Into<String>, page_id: impl Into<String>) -> Self {
        let block_id = block_id.into();
        Self {
            parent_block_id: Some(block_id.clone()),
            block_id,
            page_id: page_id.into(),
        }
    }
}

/// Ordered worklist with a visited set
///
/// Breadth-first pops from the front; depth-first pops from the back. A
/// block id is accepted once for the lifetime of the frontier, so shared or
/// repeated ids never cause a second expansion.
#[derive(Debug, Clone)]
pub struct Frontier {
    traversal: Traversal,
    entries: VecDeque<FrontierEntry>,
    seen: HashSet<String>,
}

impl Frontier {
    /// Create an empty frontier
    pub fn new(traversal: Traversal) -> Self {
        Self {
            traversal,
            entries: VecDeque::new(),
            seen: HashSet::new(),
        }
    }

    /// Add an entry, returning false if its block was already accepted
    pub fn push(&mut self, entry: FrontierEntry) -> bool {
        if !self.seen.insert(entry.block_id.clone()) {
            return false;
        }
        self.entries.push_back(entry);
        true
    }

    /// Add the children discovered by one expansion, in document order
    ///
    /// Depth-first pushes them reversed so the first child is expanded first.
    pub fn extend(&mut self, children: Vec<FrontierEntry>) -> usize {
        let accepted: Vec<FrontierEntry> = children
            .into_iter()
            .filter(|entry| self.seen.insert(entry.block_id.clone()))
            .collect();
        let count = accepted.len();

        match self.traversal {
            Traversal::BreadthFirst => self.entries.extend(accepted),
            Traversal::DepthFirst => self.entries.extend(accepted.into_iter().rev()),
        }
        count
    }

    /// Take the next entry to expand
    pub fn pop(&mut self) -> Option<FrontierEntry> {
        match self.traversal {
            Traversal::BreadthFirst => self.entries.pop_front(),
            Traversal::DepthFirst => self.entries.pop_back(),
        }
    }

    /// Pending entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is pending
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
