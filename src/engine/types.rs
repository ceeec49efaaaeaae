//! Engine types
//!
//! Message types, sinks, configuration and run reporting for the sync engine.

use crate::context::Context;
use crate::error::{Error, Result};
use crate::types::{LogLevel, Record, Traversal};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;

/// A message emitted during sync
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// One record
    Record {
        /// Stream name
        stream: String,
        /// The record
        record: Record,
    },
    /// Full state snapshot after a bookmark moved
    State {
        /// State document
        value: Value,
    },
    /// Log message
    Log {
        /// Log level
        level: LogLevel,
        /// Log message
        message: String,
    },
}

impl Message {
    /// Create a record message
    pub fn record(stream: impl Into<String>, record: Record) -> Self {
        Self::Record {
            stream: stream.into(),
            record,
        }
    }

    /// Create a state message
    pub fn state(value: Value) -> Self {
        Self::State { value }
    }

    /// Create a log message
    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        Self::Log {
            level,
            message: message.into(),
        }
    }

    /// Create a warning log
    pub fn warn(message: impl Into<String>) -> Self {
        Self::log(LogLevel::Warn, message)
    }

    /// Singer-style JSON line
    pub fn to_json(&self) -> Value {
        match self {
            Self::Record { stream, record } => json!({
                "type": "RECORD",
                "stream": stream,
                "record": record,
            }),
            Self::State { value } => json!({
                "type": "STATE",
                "value": value,
            }),
            Self::Log { level, message } => json!({
                "type": "LOG",
                "level": level,
                "message": message,
            }),
        }
    }
}

/// Destination for the records of one stream instance
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Accept one record; an error means the consumer is gone
    async fn emit(&self, record: Record) -> Result<()>;
}

/// Sink forwarding records of one stream into the run's message channel
///
/// Streams that only run to feed their children are muted: their records
/// are counted by the caller but never sent.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    stream: String,
    tx: mpsc::Sender<Message>,
    muted: bool,
}

impl ChannelSink {
    /// Create a sink for a stream
    pub fn new(stream: impl Into<String>, tx: mpsc::Sender<Message>, muted: bool) -> Self {
        Self {
            stream: stream.into(),
            tx,
            muted,
        }
    }
}

#[async_trait]
impl RecordSink for ChannelSink {
    async fn emit(&self, record: Record) -> Result<()> {
        if self.muted {
            return Ok(());
        }
        self.tx
            .send(Message::record(self.stream.clone(), record))
            .await
            .map_err(|_| Error::Cancelled)
    }
}

/// Configuration for sync operation
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Concurrent instances of one child stream
    pub max_concurrency: usize,
    /// Request budget per stream instance (`None` = unlimited)
    pub max_pages: Option<u32>,
    /// Items per page
    pub page_size: u32,
    /// Frontier discipline for block trees
    pub traversal: Traversal,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            max_pages: None,
            page_size: crate::config::MAX_PAGE_SIZE,
            traversal: Traversal::default(),
        }
    }
}

impl SyncConfig {
    /// Create a new sync config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive from the tap configuration
    pub fn from_tap_config(config: &crate::config::TapConfig) -> Self {
        Self {
            max_concurrency: config.max_concurrency.max(1),
            max_pages: config.max_pages(),
            page_size: config.page_size(),
            traversal: config.traversal,
        }
    }

    /// Set concurrency
    #[must_use]
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max.max(1);
        self
    }

    /// Set the per-instance page budget
    #[must_use]
    pub fn with_max_pages(mut self, max: Option<u32>) -> Self {
        self.max_pages = max;
        self
    }

    /// Set page size
    #[must_use]
    pub fn with_page_size(mut self, size: u32) -> Self {
        self.page_size = size;
        self
    }

    /// Set traversal
    #[must_use]
    pub fn with_traversal(mut self, traversal: Traversal) -> Self {
        self.traversal = traversal;
        self
    }
}

/// A stream instance (or tree node) that failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamFailure {
    /// Stream name
    pub stream: String,
    /// Context of the failed instance, `None` for roots
    pub context: Option<Context>,
    /// Block whose expansion failed, for block trees
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_id: Option<String>,
    /// Error message
    pub error: String,
}

/// Statistics for one stream
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamSummary {
    /// Stream name
    pub stream: String,
    /// Whether records were emitted (false for silent ancestors)
    pub emitted: bool,
    /// Instances started
    pub instances: usize,
    /// Instances that failed
    pub failed_instances: usize,
    /// Instances ended by the page budget while more pages remained
    pub truncated_instances: usize,
    /// Records produced
    pub records: u64,
    /// Requests issued
    pub pages_fetched: u64,
    /// Bookmark written at the end of the stream
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bookmark: Option<String>,
}

impl StreamSummary {
    /// Create an empty summary
    pub fn new(stream: impl Into<String>, emitted: bool) -> Self {
        Self {
            stream: stream.into(),
            emitted,
            ..Default::default()
        }
    }
}

/// Outcome of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Per-stream statistics in execution order
    pub streams: Vec<StreamSummary>,
    /// Every failed instance or node
    pub failures: Vec<StreamFailure>,
    /// Whether the run was cancelled
    pub cancelled: bool,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl RunReport {
    /// Whether every instance of every stream completed
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }

    /// Summary of one stream
    pub fn stream(&self, name: &str) -> Option<&StreamSummary> {
        self.streams.iter().find(|s| s.stream == name)
    }

    /// Total records across streams
    pub fn total_records(&self) -> u64 {
        self.streams.iter().map(|s| s.records).sum()
    }
}
