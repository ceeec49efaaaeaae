//! Notion stream catalog
//!
//! | stream           | parent        | request                                   |
//! |------------------|---------------|-------------------------------------------|
//! | `users`          |               | `GET /users`                              |
//! | `search`         |               | `POST /search`, incremental               |
//! | `pages_index`    |               | `POST /search` restricted to pages        |
//! | `pages`          | `search`      | `GET /pages/{page_id}`                    |
//! | `page_blocks`    | `search`      | `GET /blocks/{page_id}/children`          |
//! | `block_children` | `pages_index` | walk of `GET /blocks/{block_id}/children` |
//!
//! Both search streams sort by `last_edited_time` descending. The cutoff
//! filter's early stop depends on that order.

use crate::config::TapConfig;
use crate::context::{ContextRule, RecordPredicate};
use crate::error::Result;
use crate::graph::{StreamGraph, StreamNode};
use crate::types::Method;
use crate::walker::{CHILDREN_PATH, PAGE_ID_FIELD, PAGE_ID_KEY};
use serde_json::{json, Map, Value};

/// Replication key of the incremental search stream
pub const REPLICATION_KEY: &str = "last_edited_time";

/// Build the Notion stream graph for a configuration
pub fn catalog(config: &TapConfig) -> Result<StreamGraph> {
    StreamGraph::new(vec![
        StreamNode::list("users", Method::GET, "/users"),
        StreamNode::list("search", Method::POST, "/search")
            .with_body(search_body(config))
            .incremental(REPLICATION_KEY),
        StreamNode::list("pages_index", Method::POST, "/search").with_body(pages_index_body()),
        StreamNode::single_object("pages", "/pages/{page_id}").child_of("search", page_context()),
        StreamNode::list("page_blocks", Method::GET, "/blocks/{page_id}/children")
            .child_of("search", page_context())
            .stamp(PAGE_ID_FIELD, PAGE_ID_KEY),
        StreamNode::block_tree("block_children", CHILDREN_PATH)
            .child_of("pages_index", page_context()),
    ])
}

/// Body of the incremental search request
pub fn search_body(config: &TapConfig) -> Value {
    let mut body = Map::new();
    if let Some(object) = config.search_filter_object.as_deref() {
        body.insert(
            "filter".to_string(),
            json!({"property": "object", "value": object}),
        );
    }
    if let Some(query) = config.search_query.as_deref().filter(|q| !q.is_empty()) {
        body.insert("query".to_string(), Value::String(query.to_string()));
    }
    body.insert("sort".to_string(), newest_first());
    Value::Object(body)
}

/// Body of the page enumeration request
pub fn pages_index_body() -> Value {
    json!({
        "filter": {"property": "object", "value": "page"},
        "sort": newest_first(),
    })
}

fn newest_first() -> Value {
    json!({"timestamp": REPLICATION_KEY, "direction": "descending"})
}

/// Pages become `{page_id}` contexts; databases and other objects do not
fn page_context() -> ContextRule {
    ContextRule::new(RecordPredicate::field_equals("object", "page")).from_record(PAGE_ID_KEY, "id")
}

/// Catalog document printed by `discover`
pub fn describe(graph: &StreamGraph) -> Value {
    let streams: Vec<Value> = graph
        .execution_order()
        .into_iter()
        .map(|node| {
            json!({
                "tap_stream_id": node.name,
                "stream": node.name,
                "parent_stream": node.parent_name(),
                "replication_method": node.sync_mode.as_str(),
                "replication_key": node.replication_key,
                "key_properties": node.primary_keys,
                "lineage_properties": node.lineage.iter().map(|(field, _)| field).collect::<Vec<_>>(),
            })
        })
        .collect();
    json!({ "streams": streams })
}
