//! Tests for context module

use super::*;
use crate::error::Error;
use crate::types::Record;
use pretty_assertions::assert_eq;
use serde_json::json;

fn record(value: serde_json::Value) -> Record {
    value.as_object().unwrap().clone()
}

fn page_rule() -> ContextRule {
    ContextRule::new(RecordPredicate::field_equals("object", "page")).from_record("page_id", "id")
}

// ============================================================================
// Context Tests
// ============================================================================

#[test]
fn test_context_builder_and_display() {
    let ctx = Context::new().with("page_id", "P1").with("block_id", "B1");
    assert_eq!(ctx.get("page_id"), Some("P1"));
    assert_eq!(ctx.len(), 2);
    assert_eq!(ctx.to_string(), "{block_id=B1, page_id=P1}");
    assert_eq!(
        serde_json::to_value(&ctx).unwrap(),
        json!({"block_id": "B1", "page_id": "P1"})
    );
    assert!(Context::new().is_empty());
}

// ============================================================================
// Predicate Tests
// ============================================================================

#[test]
fn test_field_equals_predicate() {
    let predicate = RecordPredicate::field_equals("object", "page");
    assert!(predicate.matches(&record(json!({"object": "page"}))));
    assert!(!predicate.matches(&record(json!({"object": "database"}))));
    assert!(!predicate.matches(&record(json!({}))));
}

#[test]
fn test_field_truthy_predicate() {
    let predicate = RecordPredicate::field_truthy("has_children");
    assert!(predicate.matches(&record(json!({"has_children": true}))));
    assert!(!predicate.matches(&record(json!({"has_children": false}))));
    assert!(!predicate.matches(&record(json!({"has_children": null}))));
    assert!(!predicate.matches(&record(json!({}))));
    assert!(RecordPredicate::Always.matches(&record(json!({}))));
}

#[test]
fn test_nested_lookup() {
    let rec = record(json!({"parent": {"type": "workspace", "workspace": true}}));
    assert_eq!(lookup(&rec, "parent.type"), Some(&json!("workspace")));
    assert_eq!(lookup(&rec, "parent.missing"), None);
    assert_eq!(lookup(&rec, "parent.type.deeper"), None);
}

// ============================================================================
// Derivation Tests
// ============================================================================

#[test]
fn test_page_record_yields_page_context() {
    let ctx = page_rule()
        .derive(&record(json!({"object": "page", "id": "P1"})), None)
        .unwrap();
    assert_eq!(ctx, Context::new().with("page_id", "P1"));
}

#[test]
fn test_database_record_yields_nothing() {
    let ctx = page_rule().derive(&record(json!({"object": "database", "id": "D1"})), None);
    assert!(ctx.is_none());
}

#[test]
fn test_missing_field_yields_nothing() {
    let ctx = page_rule().derive(&record(json!({"object": "page"})), None);
    assert!(ctx.is_none());

    let ctx = page_rule().derive(&record(json!({"object": "page", "id": ""})), None);
    assert!(ctx.is_none());
}

#[test]
fn test_parent_key_propagates() {
    let rule = ContextRule::new(RecordPredicate::field_truthy("has_children"))
        .from_record("block_id", "id")
        .from_parent("page_id", "page_id");
    let parent = Context::new().with("page_id", "P1").with("block_id", "P1");

    let ctx = rule
        .derive(&record(json!({"id": "B1", "has_children": true})), Some(&parent))
        .unwrap();
    assert_eq!(ctx, Context::new().with("block_id", "B1").with("page_id", "P1"));

    assert!(rule
        .derive(&record(json!({"id": "B1", "has_children": true})), None)
        .is_none());
}

#[test]
fn test_one_context_per_qualifying_record() {
    let records = vec![
        record(json!({"object": "page", "id": "P1"})),
        record(json!({"object": "database", "id": "D1"})),
        record(json!({"object": "page", "id": "P2"})),
        record(json!({"object": "page", "id": "P1"})),
    ];

    let rule = page_rule();
    let contexts: Vec<Context> = records.iter().filter_map(|r| rule.derive(r, None)).collect();
    let ids: Vec<_> = contexts.iter().map(|c| c.get("page_id").unwrap()).collect();
    assert_eq!(ids, vec!["P1", "P2", "P1"]);
}

#[test]
fn test_numeric_ids_are_stringified() {
    let rule = ContextRule::new(RecordPredicate::Always).from_record("n", "count");
    let ctx = rule.derive(&record(json!({"count": 42})), None).unwrap();
    assert_eq!(ctx.get("n"), Some("42"));
}

// ============================================================================
// Path Rendering Tests
// ============================================================================

#[test]
fn test_render_path() {
    let ctx = Context::new().with("page_id", "abc-123");
    assert_eq!(
        render_path("/blocks/{page_id}/children", &ctx).unwrap(),
        "/blocks/abc-123/children"
    );
    assert_eq!(render_path("/users", &ctx).unwrap(), "/users");
}

#[test]
fn test_render_path_missing_variable() {
    let err = render_path("/blocks/{block_id}/children", &Context::new()).unwrap_err();
    assert!(matches!(err, Error::UndefinedVariable { ref variable } if variable == "block_id"));
}

#[test]
fn test_path_variables() {
    assert_eq!(path_variables("/pages/{page_id}"), vec!["page_id"]);
    assert!(path_variables("/search").is_empty());
    assert!(has_variables("/blocks/{block_id}/children"));
    assert!(!has_variables("/users"));
}
