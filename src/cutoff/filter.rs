//! Watermark resolution and record filtering

use super::timestamp::parse_timestamp;
use crate::error::{Error, Result};
use crate::types::Record;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

/// Resolve the lower bound of an incremental stream
///
/// A stored bookmark wins over the configured start date. A bookmark that is
/// present but unparseable stops the stream before its first request: running
/// with a silently widened window would re-emit the whole history.
pub fn resolve_cutoff(
    stream: &str,
    bookmark: Option<&str>,
    start_date: Option<DateTime<Utc>>,
) -> Result<Option<DateTime<Utc>>> {
    match bookmark.map(str::trim).filter(|b| !b.is_empty()) {
        Some(raw) => parse_timestamp(raw)
            .map(Some)
            .map_err(|_| Error::bookmark(stream, format!("'{raw}' is not an ISO-8601 timestamp"))),
        None => Ok(start_date),
    }
}

/// Largest replication value seen, kept with its original text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HighWaterMark {
    value: Option<(DateTime<Utc>, String)>,
}

impl HighWaterMark {
    /// Create an empty mark
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a replication value
    pub fn observe(&mut self, at: DateTime<Utc>, raw: &str) {
        let advance = match &self.value {
            Some((current, _)) => at > *current,
            None => true,
        };
        if advance {
            self.value = Some((at, raw.to_string()));
        }
    }

    /// Fold another instance's mark into this one
    pub fn merge(&mut self, other: &HighWaterMark) {
        if let Some((at, raw)) = &other.value {
            self.observe(*at, raw);
        }
    }

    /// Maximum timestamp observed
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.value.as_ref().map(|(at, _)| *at)
    }

    /// Maximum value as it appeared in the record
    pub fn raw(&self) -> Option<&str> {
        self.value.as_ref().map(|(_, raw)| raw.as_str())
    }

    /// Whether this mark lies strictly after `previous`
    pub fn advances(&self, previous: Option<DateTime<Utc>>) -> bool {
        match (self.timestamp(), previous) {
            (Some(at), Some(prev)) => at > prev,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }
}

/// Outcome of filtering one page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilteredPage {
    /// Records at or after the cutoff, in source order
    pub kept: Vec<Record>,
    /// Number of records dropped as too old
    pub dropped: usize,
    /// Whether the driver should not request the next cursor
    pub stop: bool,
}

/// Cutoff filter for one incremental stream instance
///
/// Relies on the source returning records newest first: once a page holds a
/// record older than the cutoff, every later page is older still.
#[derive(Debug, Clone)]
pub struct CutoffFilter {
    replication_key: String,
    cutoff: Option<DateTime<Utc>>,
    high_water: HighWaterMark,
}

impl CutoffFilter {
    /// Create a filter for a replication key and cutoff
    pub fn new(replication_key: impl Into<String>, cutoff: Option<DateTime<Utc>>) -> Self {
        Self {
            replication_key: replication_key.into(),
            cutoff,
            high_water: HighWaterMark::new(),
        }
    }

    /// The fixed cutoff of this run
    pub fn cutoff(&self) -> Option<DateTime<Utc>> {
        self.cutoff
    }

    /// Replication value of a record, if present and parseable
    pub fn replication_value<'r>(&self, record: &'r Record) -> Option<(DateTime<Utc>, &'r str)> {
        let raw = record.get(&self.replication_key).and_then(Value::as_str)?;
        parse_timestamp(raw).ok().map(|at| (at, raw))
    }

    /// Drop records older than the cutoff and detect the early-stop point
    ///
    /// Records without a parseable replication value are kept.
    pub fn filter_page(&mut self, records: Vec<Record>) -> FilteredPage {
        let mut page = FilteredPage::default();

        for record in records {
            match self.replication_value(&record) {
                Some((at, _)) if self.cutoff.is_some_and(|cutoff| at < cutoff) => {
                    page.dropped += 1;
                    page.stop = true;
                }
                Some((at, raw)) => {
                    self.high_water.observe(at, raw);
                    page.kept.push(record);
                }
                None => page.kept.push(record),
            }
        }

        if page.stop {
            debug!(
                replication_key = %self.replication_key,
                dropped = page.dropped,
                "Reached records older than cutoff, stopping pagination"
            );
        }

        page
    }

    /// Maximum replication value among emitted records
    pub fn high_water_mark(&self) -> &HighWaterMark {
        &self.high_water
    }
}
