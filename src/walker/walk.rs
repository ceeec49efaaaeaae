//! Block tree walk

use super::frontier::{Frontier, FrontierEntry};
use crate::context::{render_path, Context, ContextRule, RecordPredicate};
use crate::decode::DecoderKind;
use crate::engine::RecordSink;
use crate::error::Result;
use crate::http::{ApiRequest, Fetcher};
use crate::pagination::{CursorPaginator, PageDriver, ParamLocation};
use crate::types::{CancelToken, Traversal};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Context key naming the page a tree belongs to
pub const PAGE_ID_KEY: &str = "page_id";

/// Context key naming the block being expanded
pub const BLOCK_ID_KEY: &str = "block_id";

/// Record field stamped with the owning page
pub const PAGE_ID_FIELD: &str = "_page_id";

/// Record field stamped with the enclosing block (absent at top level)
pub const PARENT_BLOCK_ID_FIELD: &str = "_parent_block_id";

/// Default children endpoint
pub const CHILDREN_PATH: &str = "/blocks/{block_id}/children";

/// A block whose expansion failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeFailure {
    /// Block that could not be expanded
    pub block_id: String,
    /// Page the block belongs to
    pub page_id: String,
    /// Error message
    pub error: String,
}

/// Outcome of one page's walk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkReport {
    /// Blocks emitted
    pub records_emitted: u64,
    /// Expansions that completed
    pub nodes_expanded: u64,
    /// Requests issued
    pub pages_fetched: u64,
    /// Expansions that failed; their subtrees were abandoned
    pub failures: Vec<NodeFailure>,
    /// Whether the walk stopped on cancellation
    pub cancelled: bool,
}

/// Reconstructs a page's block tree from the flat children endpoint
///
/// The walk is iterative: expansions are taken from a [`Frontier`] until it
/// is empty, so tree depth never grows the call stack. Only `has_children`
/// pointers are followed; links to other pages are plain content.
pub struct TreeWalker<'a> {
    fetcher: &'a dyn Fetcher,
    path: String,
    paginator: CursorPaginator,
    traversal: Traversal,
    max_pages: Option<u32>,
    cancel: CancelToken,
    rule: ContextRule,
}

impl<'a> TreeWalker<'a> {
    /// Create a walker over the default children endpoint
    pub fn new(fetcher: &'a dyn Fetcher, page_size: u32) -> Self {
        Self {
            fetcher,
            path: CHILDREN_PATH.to_string(),
            paginator: CursorPaginator::new(ParamLocation::Query, page_size),
            traversal: Traversal::default(),
            max_pages: None,
            cancel: CancelToken::new(),
            rule: ContextRule::new(RecordPredicate::field_truthy("has_children"))
                .from_record(BLOCK_ID_KEY, "id")
                .from_parent(PAGE_ID_KEY, PAGE_ID_KEY),
        }
    }

    /// Use a different children path template
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the frontier discipline
    #[must_use]
    pub fn with_traversal(mut self, traversal: Traversal) -> Self {
        self.traversal = traversal;
        self
    }

    /// Limit requests per expansion
    #[must_use]
    pub fn with_max_pages(mut self, max_pages: Option<u32>) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Share a cancellation token
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Walk every block under a page, emitting each one into `sink`
    ///
    /// A failed expansion is recorded and its subtree skipped; siblings and
    /// the rest of the tree continue. Only cancellation or a closed sink ends
    /// the walk early.
    pub async fn walk(&self, page_id: &str, sink: &dyn RecordSink) -> WalkReport {
        let mut report = WalkReport::default();
        let mut frontier = Frontier::new(self.traversal);
        frontier.push(FrontierEntry::root(page_id));

        while let Some(entry) = frontier.pop() {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            match self.expand(&entry, sink, &mut report).await {
                Ok(children) => {
                    report.nodes_expanded += 1;
                    let queued = frontier.extend(children);
                    debug!(
                        block_id = %entry.block_id,
                        queued,
                        pending = frontier.len(),
                        "Expanded block"
                    );
                }
                Err(e) if e.is_cancelled() => {
                    report.cancelled = true;
                    break;
                }
                Err(e) => {
                    warn!(
                        block_id = %entry.block_id,
                        page_id = %entry.page_id,
                        error = %e,
                        "Block expansion failed, skipping subtree"
                    );
                    report.failures.push(NodeFailure {
                        block_id: entry.block_id.clone(),
                        page_id: entry.page_id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        report
    }

    /// List one block's children, emitting them page by page
    ///
    /// Returns the entries for children that have children of their own.
    /// On error those entries are dropped with the partial list.
    async fn expand(
        &self,
        entry: &FrontierEntry,
        sink: &dyn RecordSink,
        report: &mut WalkReport,
    ) -> Result<Vec<FrontierEntry>> {
        let context = Context::new()
            .with(BLOCK_ID_KEY, entry.block_id.as_str())
            .with(PAGE_ID_KEY, entry.page_id.as_str());
        let request = ApiRequest::get(render_path(&self.path, &context)?);

        let mut driver = PageDriver::new(
            self.fetcher,
            &self.paginator,
            DecoderKind::Envelope.decoder(),
            request,
        )
        .with_max_pages(self.max_pages);

        let mut children = Vec::new();
        loop {
            self.cancel.check()?;
            let Some(page) = driver.next_page().await? else {
                break;
            };
            report.pages_fetched += 1;

            for mut block in page.records {
                if let Some(child) = self.rule.derive(&block, Some(&context)) {
                    if let (Some(id), Some(page_id)) =
                        (child.get(BLOCK_ID_KEY), child.get(PAGE_ID_KEY))
                    {
                        children.push(FrontierEntry::child(id, page_id));
                    }
                }

                block
                    .entry(PAGE_ID_FIELD)
                    .or_insert_with(|| Value::String(entry.page_id.clone()));
                if let Some(parent) = &entry.parent_block_id {
                    block
                        .entry(PARENT_BLOCK_ID_FIELD)
                        .or_insert_with(|| Value::String(parent.clone()));
                }

                sink.emit(block).await?;
                report.records_emitted += 1;
            }
        }

        Ok(children)
    }
}

impl std::fmt::Debug for TreeWalker<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeWalker")
            .field("path", &self.path)
            .field("traversal", &self.traversal)
            .field("max_pages", &self.max_pages)
            .finish_non_exhaustive()
    }
}
