//! Execution engine module
//!
//! Main read loop and stream orchestration.
//!
//! # Overview
//!
//! The engine module provides:
//! - `SyncEngine` - Runs a selection of the stream graph, parents first
//! - `SyncConfig` - Concurrency, page size and traversal knobs
//! - Message types for output (Record, State, Log)
//!
//! Every stream runs once per context. Roots have a single instance with no
//! context; a child gets one instance per qualifying record of its parent,
//! and instances of the same child run concurrently up to
//! `max_concurrency`. Within one instance pages are strictly sequential.

mod types;

pub use types::{
    ChannelSink, Message, RecordSink, RunReport, StreamFailure, StreamSummary, SyncConfig,
};

use crate::context::{render_path, Context};
use crate::cutoff::{resolve_cutoff, CutoffFilter, HighWaterMark};
use crate::error::{Error, Result};
use crate::graph::{StreamGraph, StreamKind, StreamNode};
use crate::http::{ApiRequest, Fetcher};
use crate::pagination::{CursorPaginator, NoPaginator, PageDriver, Paginator};
use crate::state::BookmarkStore;
use crate::types::{CancelToken, Method, Record};
use crate::walker::{TreeWalker, PAGE_ID_KEY};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

/// Sync engine for orchestrating data extraction
pub struct SyncEngine {
    /// Request transport
    fetcher: Arc<dyn Fetcher>,
    /// Validated stream declarations
    graph: StreamGraph,
    /// Bookmark persistence
    store: Arc<dyn BookmarkStore>,
    /// Sync configuration
    config: SyncConfig,
    /// Lower bound for incremental streams without a bookmark
    start_date: Option<DateTime<Utc>>,
    /// Operator interrupt
    cancel: CancelToken,
}

impl SyncEngine {
    /// Create a new sync engine
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        graph: StreamGraph,
        store: Arc<dyn BookmarkStore>,
    ) -> Self {
        Self {
            fetcher,
            graph,
            store,
            config: SyncConfig::default(),
            start_date: None,
            cancel: CancelToken::new(),
        }
    }

    /// Set sync configuration
    #[must_use]
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the configured start date
    #[must_use]
    pub fn with_start_date(mut self, start_date: Option<DateTime<Utc>>) -> Self {
        self.start_date = start_date;
        self
    }

    /// Share a cancellation token
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that stops the run between pages
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Get the stream graph
    pub fn graph(&self) -> &StreamGraph {
        &self.graph
    }

    /// Run the selected streams (all of them when `streams` is empty)
    ///
    /// Only an unknown stream name fails the run itself, before any request.
    /// Everything else is reported per stream in the returned [`RunReport`].
    pub async fn run<S: AsRef<str>>(
        &self,
        streams: &[S],
        tx: mpsc::Sender<Message>,
    ) -> Result<RunReport> {
        let start = Instant::now();
        let selection = self.graph.select(streams)?;
        info!(streams = ?selection.streams, "Starting sync");

        let mut report = RunReport::default();
        let mut pending: HashMap<String, Vec<Context>> = HashMap::new();

        for name in &selection.streams {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let node = self
                .graph
                .get(name)
                .ok_or_else(|| Error::stream_not_found(name))?;
            let instances: Vec<Option<Context>> = if node.is_root() {
                vec![None]
            } else {
                pending
                    .remove(name)
                    .unwrap_or_default()
                    .into_iter()
                    .map(Some)
                    .collect()
            };
            let children: Vec<&StreamNode> = self
                .graph
                .children(name)
                .into_iter()
                .filter(|child| selection.streams.contains(&child.name))
                .collect();

            let outcome = self
                .run_stream(node, selection.emits(name), instances, &children, &tx)
                .await;

            for (child, context) in outcome.contexts {
                pending.entry(child).or_default().push(context);
            }
            report.failures.extend(outcome.failures);
            report.streams.push(outcome.summary);

            if outcome.cancelled {
                report.cancelled = true;
                break;
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            records = report.total_records(),
            failures = report.failures.len(),
            cancelled = report.cancelled,
            duration_ms = report.duration_ms,
            "Sync finished"
        );

        Ok(report)
    }

    /// Run every instance of one stream and commit its bookmark
    async fn run_stream(
        &self,
        node: &StreamNode,
        emitted: bool,
        instances: Vec<Option<Context>>,
        children: &[&StreamNode],
        tx: &mpsc::Sender<Message>,
    ) -> StreamOutcome {
        let mut outcome = StreamOutcome::new(&node.name, emitted);
        outcome.summary.instances = instances.len();

        // Fixed for the whole run of this stream
        let (previous, cutoff) = match self.resolve_watermark(node).await {
            Ok(bounds) => bounds,
            Err(e) => {
                warn!(stream = %node.name, error = %e, "Stream not started");
                outcome.fail(StreamFailure {
                    stream: node.name.clone(),
                    context: None,
                    block_id: None,
                    error: e.to_string(),
                });
                return outcome;
            }
        };

        info!(
            stream = %node.name,
            instances = instances.len(),
            emitted,
            cutoff = ?cutoff,
            "Starting stream"
        );

        let sink = ChannelSink::new(node.name.clone(), tx.clone(), !emitted);
        let results: Vec<InstanceOutcome> = stream::iter(instances)
            .map(|context| self.run_instance(node, context, cutoff, children, &sink))
            .buffer_unordered(self.config.max_concurrency.max(1))
            .collect()
            .await;

        let mut high_water = HighWaterMark::new();
        for result in results {
            outcome.summary.records += result.records;
            outcome.summary.pages_fetched += result.pages;
            outcome.contexts.extend(result.contexts);
            if result.truncated {
                outcome.summary.truncated_instances += 1;
            }
            if !result.failures.is_empty() {
                outcome.summary.failed_instances += 1;
                outcome.failures.extend(result.failures);
            }
            outcome.cancelled |= result.cancelled;
            high_water.merge(&result.high_water);
        }

        for failure in &outcome.failures {
            let message = Message::warn(format!(
                "stream '{}' failed{}: {}",
                failure.stream,
                failure
                    .context
                    .as_ref()
                    .map(|c| format!(" for {c}"))
                    .unwrap_or_default(),
                failure.error
            ));
            if tx.send(message).await.is_err() {
                outcome.cancelled = true;
            }
        }

        let truncated = outcome.summary.truncated_instances;
        if node.is_incremental() && emitted && outcome.is_clean() && truncated > 0 {
            warn!(
                stream = %node.name,
                truncated_instances = truncated,
                "Page budget reached before the cutoff, bookmark unchanged"
            );
            let message = Message::warn(format!(
                "stream '{}' hit the page budget before reaching its cutoff, bookmark not advanced",
                node.name
            ));
            if tx.send(message).await.is_err() {
                outcome.cancelled = true;
            }
        } else if node.is_incremental() && emitted && outcome.is_clean() {
            if let Err(e) = self.commit_bookmark(node, &high_water, previous, tx).await {
                if e.is_cancelled() {
                    outcome.cancelled = true;
                } else {
                    warn!(stream = %node.name, error = %e, "Failed to write bookmark");
                    outcome.fail(StreamFailure {
                        stream: node.name.clone(),
                        context: None,
                        block_id: None,
                        error: e.to_string(),
                    });
                }
            } else if high_water.advances(previous) {
                outcome.summary.bookmark = high_water.raw().map(String::from);
            }
        }

        info!(
            stream = %node.name,
            records = outcome.summary.records,
            pages = outcome.summary.pages_fetched,
            failed_instances = outcome.summary.failed_instances,
            truncated_instances = outcome.summary.truncated_instances,
            "Completed stream"
        );

        outcome
    }

    /// Stored bookmark and effective cutoff of an incremental stream
    async fn resolve_watermark(
        &self,
        node: &StreamNode,
    ) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>)> {
        if !node.is_incremental() {
            return Ok((None, None));
        }
        let bookmark = self.store.get_bookmark(&node.name).await;
        let previous = resolve_cutoff(&node.name, bookmark.as_deref(), None)?;
        let cutoff = resolve_cutoff(&node.name, bookmark.as_deref(), self.start_date)?;
        Ok((previous, cutoff))
    }

    /// Persist the high-water mark if it moved forward, then emit the state
    async fn commit_bookmark(
        &self,
        node: &StreamNode,
        high_water: &HighWaterMark,
        previous: Option<DateTime<Utc>>,
        tx: &mpsc::Sender<Message>,
    ) -> Result<()> {
        let (Some(key), Some(raw)) = (node.replication_key.as_deref(), high_water.raw()) else {
            debug!(stream = %node.name, "No replication value emitted, bookmark unchanged");
            return Ok(());
        };
        if !high_water.advances(previous) {
            debug!(stream = %node.name, bookmark = raw, "Bookmark did not advance");
            return Ok(());
        }

        self.store.set_bookmark(&node.name, key, raw).await?;
        info!(stream = %node.name, bookmark = raw, "Bookmark advanced");

        let snapshot = self.store.snapshot().await;
        tx.send(Message::state(snapshot))
            .await
            .map_err(|_| Error::Cancelled)
    }

    /// Run one instance of a stream
    async fn run_instance(
        &self,
        node: &StreamNode,
        context: Option<Context>,
        cutoff: Option<DateTime<Utc>>,
        children: &[&StreamNode],
        sink: &dyn RecordSink,
    ) -> InstanceOutcome {
        let instance_sink = InstanceSink::new(node, context.as_ref(), children, sink);
        let mut outcome = InstanceOutcome::default();

        let result = match node.kind {
            StreamKind::BlockTree => {
                self.walk_tree(node, context.as_ref(), &instance_sink, &mut outcome)
                    .await
            }
            StreamKind::Paginated | StreamKind::SingleObject => {
                self.paginate(node, context.as_ref(), cutoff, &instance_sink, &mut outcome)
                    .await
            }
        };

        match result {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => outcome.cancelled = true,
            Err(e) => {
                warn!(
                    stream = %node.name,
                    context = %context.as_ref().map(ToString::to_string).unwrap_or_default(),
                    error = %e,
                    "Stream instance failed"
                );
                outcome.failures.push(StreamFailure {
                    stream: node.name.clone(),
                    context: context.clone(),
                    block_id: None,
                    error: e.to_string(),
                });
            }
        }

        outcome.records = instance_sink.records();
        outcome.contexts = instance_sink.into_contexts();
        outcome
    }

    /// Drive a list or single-object endpoint to completion
    async fn paginate(
        &self,
        node: &StreamNode,
        context: Option<&Context>,
        cutoff: Option<DateTime<Utc>>,
        sink: &InstanceSink<'_>,
        outcome: &mut InstanceOutcome,
    ) -> Result<()> {
        let path = render_path(&node.path, context.unwrap_or(&Context::new()))?;
        let mut request = match node.method {
            Method::GET => ApiRequest::get(path),
            Method::POST => ApiRequest::post(path),
        };
        if let Some(body) = &node.body {
            request = request.json(body.clone());
        }

        let paginator: Box<dyn Paginator> = match node.kind {
            StreamKind::SingleObject => Box::new(NoPaginator),
            _ => Box::new(CursorPaginator::for_method(
                node.method,
                self.config.page_size,
            )),
        };
        let mut driver = PageDriver::new(
            self.fetcher.as_ref(),
            paginator.as_ref(),
            node.kind.decoder_kind().decoder(),
            request,
        )
        .with_max_pages(self.config.max_pages);

        let mut filter = node
            .replication_key
            .as_deref()
            .filter(|_| node.is_incremental())
            .map(|key| CutoffFilter::new(key, cutoff));

        loop {
            self.cancel.check()?;
            let Some(page) = driver.next_page().await? else {
                break;
            };
            outcome.pages += 1;

            let records = match filter.as_mut() {
                Some(filter) => {
                    let filtered = filter.filter_page(page.records);
                    if filtered.stop {
                        driver.stop();
                    }
                    filtered.kept
                }
                None => page.records,
            };

            for record in records {
                sink.emit(record).await?;
            }
        }

        outcome.truncated = driver.budget_exhausted();
        if let Some(filter) = filter {
            outcome.high_water = filter.high_water_mark().clone();
        }
        Ok(())
    }

    /// Walk the block tree of the context's page
    async fn walk_tree(
        &self,
        node: &StreamNode,
        context: Option<&Context>,
        sink: &InstanceSink<'_>,
        outcome: &mut InstanceOutcome,
    ) -> Result<()> {
        let page_id = context.and_then(|c| c.get(PAGE_ID_KEY)).ok_or_else(|| {
            Error::graph(format!(
                "stream '{}' runs without a '{PAGE_ID_KEY}' context",
                node.name
            ))
        })?;

        let report = TreeWalker::new(self.fetcher.as_ref(), self.config.page_size)
            .with_path(node.path.clone())
            .with_traversal(self.config.traversal)
            .with_max_pages(self.config.max_pages)
            .with_cancel(self.cancel.clone())
            .walk(page_id, sink)
            .await;

        outcome.pages += report.pages_fetched;
        outcome
            .failures
            .extend(report.failures.into_iter().map(|failure| StreamFailure {
                stream: node.name.clone(),
                context: context.cloned(),
                block_id: Some(failure.block_id),
                error: failure.error,
            }));

        if report.cancelled {
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("graph", &self.graph)
            .field("config", &self.config)
            .field("start_date", &self.start_date)
            .finish_non_exhaustive()
    }
}

/// Result of one stream across its instances
struct StreamOutcome {
    summary: StreamSummary,
    failures: Vec<StreamFailure>,
    contexts: Vec<(String, Context)>,
    cancelled: bool,
}

impl StreamOutcome {
    fn new(stream: &str, emitted: bool) -> Self {
        Self {
            summary: StreamSummary::new(stream, emitted),
            failures: Vec::new(),
            contexts: Vec::new(),
            cancelled: false,
        }
    }

    fn fail(&mut self, failure: StreamFailure) {
        self.failures.push(failure);
    }

    fn is_clean(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }
}

/// Result of one stream instance
#[derive(Default)]
struct InstanceOutcome {
    records: u64,
    pages: u64,
    high_water: HighWaterMark,
    contexts: Vec<(String, Context)>,
    failures: Vec<StreamFailure>,
    cancelled: bool,
    truncated: bool,
}

/// Per-instance sink: stamps lineage, derives child contexts, counts
///
/// Contexts are derived before the record is forwarded, so every record
/// that reached the output has already produced its children's contexts,
/// even if a later page of the instance fails.
struct InstanceSink<'a> {
    inner: &'a dyn RecordSink,
    context: Option<&'a Context>,
    lineage: Vec<(&'a str, String)>,
    children: &'a [&'a StreamNode],
    contexts: Mutex<Vec<(String, Context)>>,
    records: AtomicU64,
}

impl<'a> InstanceSink<'a> {
    fn new(
        node: &'a StreamNode,
        context: Option<&'a Context>,
        children: &'a [&'a StreamNode],
        inner: &'a dyn RecordSink,
    ) -> Self {
        let lineage = node
            .lineage
            .iter()
            .filter_map(|(field, key)| {
                let value = context?.get(key)?;
                Some((field.as_str(), value.to_string()))
            })
            .collect();

        Self {
            inner,
            context,
            lineage,
            children,
            contexts: Mutex::new(Vec::new()),
            records: AtomicU64::new(0),
        }
    }

    fn records(&self) -> u64 {
        self.records.load(Ordering::Relaxed)
    }

    fn into_contexts(self) -> Vec<(String, Context)> {
        self.contexts.into_inner()
    }
}

#[async_trait]
impl RecordSink for InstanceSink<'_> {
    async fn emit(&self, mut record: Record) -> Result<()> {
        for (field, value) in &self.lineage {
            record
                .entry(*field)
                .or_insert_with(|| Value::String(value.clone()));
        }

        let derived: Vec<(String, Context)> = self
            .children
            .iter()
            .filter_map(|child| {
                let rule = &child.parent.as_ref()?.rule;
                Some((child.name.clone(), rule.derive(&record, self.context)?))
            })
            .collect();
        if !derived.is_empty() {
            self.contexts.lock().await.extend(derived);
        }

        self.inner.emit(record).await?;
        self.records.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
