//! Tests for the block tree walker

use super::*;
use crate::engine::RecordSink;
use crate::error::Result;
use crate::http::mock::MockFetcher;
use crate::types::{CancelToken, Record, Traversal};
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Mutex;

#[derive(Default)]
struct CollectSink {
    records: Mutex<Vec<Record>>,
}

#[async_trait]
impl RecordSink for CollectSink {
    async fn emit(&self, record: Record) -> Result<()> {
        self.records.lock().unwrap().push(record);
        Ok(())
    }
}

impl CollectSink {
    fn ids(&self) -> Vec<String> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .map(|r| r["id"].as_str().unwrap().to_string())
            .collect()
    }

    fn get(&self, id: &str) -> Record {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r["id"] == id)
            .cloned()
            .unwrap()
    }
}

fn block(id: &str, has_children: bool) -> Value {
    json!({"object": "block", "id": id, "type": "paragraph", "has_children": has_children})
}

fn children_path(id: &str) -> String {
    format!("/blocks/{id}/children")
}

/// P1 -> [A*, B*], A -> [A1*], B -> [B1], A1 -> [A11]
fn sample_tree() -> MockFetcher {
    MockFetcher::new()
        .page(&children_path("P1"), None, json!([block("A", true), block("B", true)]), None)
        .page(&children_path("A"), None, json!([block("A1", true)]), None)
        .page(&children_path("B"), None, json!([block("B1", false)]), None)
        .page(&children_path("A1"), None, json!([block("A11", false)]), None)
}

// ============================================================================
// Frontier Tests
// ============================================================================

#[test]
fn test_frontier_expansion_entry() {
    let mut frontier = Frontier::new(Traversal::BreadthFirst);
    assert!(frontier.push(FrontierEntry::root("P1")));
    let root = frontier.pop().unwrap();
    assert_eq!(root.block_id, "P1");
    assert_eq!(root.parent_block_id, None);

    frontier.extend(vec![FrontierEntry::child("B1", "P1")]);
    assert_eq!(
        frontier.pop().unwrap(),
        FrontierEntry {
            block_id: "B1".to_string(),
            parent_block_id: Some("B1".to_string()),
            page_id: "P1".to_string(),
        }
    );
    assert!(frontier.is_empty());
}

#[test]
fn test_frontier_rejects_seen_ids() {
    let mut frontier = Frontier::new(Traversal::BreadthFirst);
    assert!(frontier.push(FrontierEntry::root("P1")));
    assert!(!frontier.push(FrontierEntry::root("P1")));

    let added = frontier.extend(vec![
        FrontierEntry::child("B1", "P1"),
        FrontierEntry::child("B1", "P1"),
        FrontierEntry::child("P1", "P1"),
    ]);
    assert_eq!(added, 1);
    assert_eq!(frontier.len(), 2);
    // Already accepted once, even after it was popped
    frontier.pop();
    frontier.pop();
    assert_eq!(frontier.extend(vec![FrontierEntry::child("B1", "P1")]), 0);
}

#[test]
fn test_frontier_disciplines() {
    let mut bfs = Frontier::new(Traversal::BreadthFirst);
    bfs.extend(vec![FrontierEntry::child("A", "P"), FrontierEntry::child("B", "P")]);
    bfs.extend(vec![FrontierEntry::child("C", "P")]);
    let order: Vec<_> = std::iter::from_fn(|| bfs.pop()).map(|e| e.block_id).collect();
    assert_eq!(order, vec!["A", "B", "C"]);

    let mut dfs = Frontier::new(Traversal::DepthFirst);
    dfs.extend(vec![FrontierEntry::child("A", "P"), FrontierEntry::child("B", "P")]);
    assert_eq!(dfs.pop().unwrap().block_id, "A");
    dfs.extend(vec![FrontierEntry::child("A1", "P")]);
    let order: Vec<_> = std::iter::from_fn(|| dfs.pop()).map(|e| e.block_id).collect();
    assert_eq!(order, vec!["A1", "B"]);
}

// ============================================================================
// Walk Tests
// ============================================================================

#[tokio::test]
async fn test_top_level_and_nested_lineage() {
    let fetcher = MockFetcher::new()
        .page(&children_path("P1"), None, json!([block("B1", true), block("B2", false)]), None)
        .page(&children_path("B1"), None, json!([block("C1", false)]), None);
    let sink = CollectSink::default();

    let report = TreeWalker::new(&fetcher, 100).walk("P1", &sink).await;

    assert!(report.failures.is_empty() && !report.cancelled);
    assert_eq!(sink.ids(), vec!["B1", "B2", "C1"]);

    let b1 = sink.get("B1");
    assert_eq!(b1[PAGE_ID_FIELD], "P1");
    assert!(!b1.contains_key(PARENT_BLOCK_ID_FIELD));

    let c1 = sink.get("C1");
    assert_eq!(c1[PAGE_ID_FIELD], "P1");
    assert_eq!(c1[PARENT_BLOCK_ID_FIELD], "B1");

    assert_eq!(fetcher.paths(), vec![children_path("P1"), children_path("B1")]);
}

#[tokio::test]
async fn test_breadth_first_order() {
    let fetcher = sample_tree();
    let sink = CollectSink::default();

    let report = TreeWalker::new(&fetcher, 100)
        .with_traversal(Traversal::BreadthFirst)
        .walk("P1", &sink)
        .await;

    assert_eq!(sink.ids(), vec!["A", "B", "A1", "B1", "A11"]);
    assert_eq!(
        fetcher.paths(),
        vec![
            children_path("P1"),
            children_path("A"),
            children_path("B"),
            children_path("A1")
        ]
    );
    assert_eq!(report.nodes_expanded, 4);
    assert_eq!(report.records_emitted, 5);
}

#[tokio::test]
async fn test_depth_first_order() {
    let fetcher = sample_tree();
    let sink = CollectSink::default();

    TreeWalker::new(&fetcher, 100)
        .with_traversal(Traversal::DepthFirst)
        .walk("P1", &sink)
        .await;

    assert_eq!(sink.ids(), vec!["A", "B", "A1", "A11", "B1"]);
    assert_eq!(
        fetcher.paths(),
        vec![
            children_path("P1"),
            children_path("A"),
            children_path("A1"),
            children_path("B")
        ]
    );
}

#[tokio::test]
async fn test_lineage_at_every_depth() {
    let fetcher = sample_tree();
    let sink = CollectSink::default();
    TreeWalker::new(&fetcher, 100).walk("P1", &sink).await;

    for (id, parent) in [("A", None), ("B", None), ("A1", Some("A")), ("B1", Some("B")), ("A11", Some("A1"))] {
        let record = sink.get(id);
        assert_eq!(record[PAGE_ID_FIELD], "P1", "page lineage of {id}");
        assert_eq!(
            record.get(PARENT_BLOCK_ID_FIELD).and_then(Value::as_str),
            parent,
            "parent lineage of {id}"
        );
    }
}

#[tokio::test]
async fn test_children_are_paginated() {
    let fetcher = MockFetcher::new()
        .page(&children_path("P1"), None, json!([block("A", false)]), Some("c1"))
        .page(&children_path("P1"), Some("c1"), json!([block("B", true)]), None)
        .page(&children_path("B"), None, json!([block("B1", false)]), None);
    let sink = CollectSink::default();

    let report = TreeWalker::new(&fetcher, 50).walk("P1", &sink).await;

    assert_eq!(sink.ids(), vec!["A", "B", "B1"]);
    assert_eq!(report.pages_fetched, 3);
    let requests = fetcher.requests();
    assert_eq!(requests[0].query.get("page_size"), Some(&"50".to_string()));
    assert_eq!(requests[1].query.get("start_cursor"), Some(&"c1".to_string()));
}

#[tokio::test]
async fn test_failed_node_is_isolated() {
    let fetcher = sample_tree().fail(&children_path("B"), 500);
    let sink = CollectSink::default();

    let report = TreeWalker::new(&fetcher, 100).walk("P1", &sink).await;

    assert!(!report.failures.is_empty());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].block_id, "B");
    assert_eq!(report.failures[0].page_id, "P1");
    assert_eq!(sink.ids(), vec!["A", "B", "A1", "A11"]);
}

#[tokio::test]
async fn test_children_of_failed_expansion_are_discarded() {
    // A's first page succeeds, the second page is missing
    let fetcher = MockFetcher::new()
        .page(&children_path("P1"), None, json!([block("A", true)]), None)
        .page(&children_path("A"), None, json!([block("A1", true)]), Some("broken"));
    let sink = CollectSink::default();

    let report = TreeWalker::new(&fetcher, 100).walk("P1", &sink).await;

    assert_eq!(sink.ids(), vec!["A", "A1"]);
    assert_eq!(report.failures.len(), 1);
    assert!(!fetcher.paths().contains(&children_path("A1")));
}

#[tokio::test]
async fn test_repeated_block_ids_expand_once() {
    let fetcher = MockFetcher::new()
        .page(&children_path("P1"), None, json!([block("A", true), block("A", true)]), None)
        .page(&children_path("A"), None, json!([block("A", true), block("P1", true)]), None);
    let sink = CollectSink::default();

    let report = TreeWalker::new(&fetcher, 100).walk("P1", &sink).await;

    assert!(report.failures.is_empty() && !report.cancelled);
    assert_eq!(fetcher.paths(), vec![children_path("P1"), children_path("A")]);
}

#[tokio::test]
async fn test_every_node_visited_exactly_once() {
    // Full binary tree of depth 4 under P
    let mut fetcher = MockFetcher::new();
    let mut expected = Vec::new();
    let mut level = vec!["P".to_string()];
    for depth in 0..4 {
        let mut next = Vec::new();
        for parent in &level {
            let kids: Vec<String> = (0..2).map(|i| format!("{parent}.{i}")).collect();
            let has_children = depth < 3;
            let results: Vec<Value> = kids.iter().map(|k| block(k, has_children)).collect();
            fetcher = fetcher.page(&children_path(parent), None, Value::Array(results), None);
            expected.extend(kids.iter().cloned());
            if has_children {
                next.extend(kids);
            }
        }
        level = next;
    }

    for traversal in [Traversal::BreadthFirst, Traversal::DepthFirst] {
        let sink = CollectSink::default();
        let report = TreeWalker::new(&fetcher, 100)
            .with_traversal(traversal)
            .walk("P", &sink)
            .await;

        let ids = sink.ids();
        let unique: HashSet<_> = ids.iter().collect();
        assert!(report.failures.is_empty() && !report.cancelled);
        assert_eq!(ids.len(), expected.len());
        assert_eq!(unique.len(), expected.len());
    }
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let fetcher = sample_tree();
    let sink = CollectSink::default();
    let cancel = CancelToken::new();
    cancel.cancel();

    let report = TreeWalker::new(&fetcher, 100)
        .with_cancel(cancel)
        .walk("P1", &sink)
        .await;

    assert!(report.cancelled);
    assert!(fetcher.requests().is_empty());
    assert!(sink.ids().is_empty());
}
