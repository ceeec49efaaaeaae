//! Tests for pagination module

use super::*;
use crate::decode::{DecoderKind, Page};
use crate::error::{Error, Result};
use crate::http::mock::MockFetcher;
use crate::http::{ApiRequest, HttpClient, HttpClientConfig};
use crate::types::{Method, Record};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn record(id: &str) -> Record {
    json!({"id": id}).as_object().unwrap().clone()
}

async fn drain(mut driver: PageDriver<'_>) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    while let Some(page) = driver.next_page().await? {
        records.extend(page.records);
    }
    Ok(records)
}

fn ids(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .map(|r| r["id"].as_str().unwrap().to_string())
        .collect()
}

// ============================================================================
// NextPage / State Tests
// ============================================================================

#[test]
fn test_next_page_variants() {
    let next = NextPage::with_cursor("abc");
    assert_eq!(
        next,
        NextPage::Continue {
            cursor: "abc".to_string()
        }
    );
    assert_ne!(next, NextPage::Done);
}

#[test]
fn test_pagination_state_mutations() {
    let mut state = PaginationState::new();
    state.next_page();
    state.set_cursor("c1".to_string());
    assert_eq!(state.page, 1);
    assert_eq!(state.cursor.as_deref(), Some("c1"));

    state.mark_done();
    assert!(state.done);
    assert!(state.cursor.is_none());
}

#[test]
fn test_param_location_for_method() {
    assert_eq!(ParamLocation::for_method(Method::GET), ParamLocation::Query);
    assert_eq!(ParamLocation::for_method(Method::POST), ParamLocation::Body);
}

// ============================================================================
// Strategy Tests
// ============================================================================

#[test]
fn test_cursor_paginator_first_request_has_no_cursor() {
    let paginator = CursorPaginator::new(ParamLocation::Query, 50);
    let mut request = ApiRequest::get("/users");
    paginator.apply(&PaginationState::new(), &mut request);

    assert_eq!(request.query.get(PAGE_SIZE_PARAM), Some(&"50".to_string()));
    assert!(!request.query.contains_key(CURSOR_PARAM));
}

#[test]
fn test_cursor_paginator_query_cursor() {
    let paginator = CursorPaginator::new(ParamLocation::Query, 100);
    let mut state = PaginationState::new();
    state.set_cursor("abc".to_string());

    let mut request = ApiRequest::get("/blocks/b1/children");
    paginator.apply(&state, &mut request);

    assert_eq!(request.query.get(CURSOR_PARAM), Some(&"abc".to_string()));
    assert!(request.body.is_none());
}

#[test]
fn test_cursor_paginator_body_cursor() {
    let paginator = CursorPaginator::for_method(Method::POST, 25);
    let mut state = PaginationState::new();
    state.set_cursor("xyz".to_string());

    let mut request = ApiRequest::post("/search").json(json!({"query": "roadmap"}));
    paginator.apply(&state, &mut request);

    assert!(request.query.is_empty());
    assert_eq!(
        request.body,
        Some(json!({"query": "roadmap", "page_size": 25, "start_cursor": "xyz"}))
    );
}

#[test]
fn test_cursor_paginator_clamps_page_size() {
    assert_eq!(CursorPaginator::new(ParamLocation::Query, 500).page_size, 100);
    assert_eq!(CursorPaginator::new(ParamLocation::Query, 0).page_size, 1);
}

#[test]
fn test_cursor_paginator_process_page() {
    let paginator = CursorPaginator::new(ParamLocation::Query, 100);
    let mut state = PaginationState::new();

    let next = paginator.process_page(
        &Page::new(vec![record("a")], Some("c2".to_string())),
        &mut state,
    );
    assert_eq!(next, NextPage::with_cursor("c2"));
    assert_eq!(state.cursor.as_deref(), Some("c2"));

    let next = paginator.process_page(&Page::new(vec![], None), &mut state);
    assert_eq!(next, NextPage::Done);
    assert!(state.done);
}

#[test]
fn test_no_paginator_leaves_request_untouched() {
    let mut request = ApiRequest::get("/pages/p1");
    let mut state = PaginationState::new();
    NoPaginator.apply(&state, &mut request);
    assert_eq!(request, ApiRequest::get("/pages/p1"));

    let next = NoPaginator.process_page(&Page::new(vec![record("p1")], None), &mut state);
    assert_eq!(next, NextPage::Done);
    assert!(state.done);
}

// ============================================================================
// Driver Tests
// ============================================================================

#[tokio::test]
async fn test_driver_follows_cursor_until_null() {
    let fetcher = MockFetcher::new()
        .page("/users", None, json!([{"id": "R1"}, {"id": "R2"}]), Some("abc"))
        .page("/users", Some("abc"), json!([{"id": "R3"}]), None);
    let paginator = CursorPaginator::new(ParamLocation::Query, 100);

    let driver = PageDriver::new(
        &fetcher,
        &paginator,
        DecoderKind::Envelope.decoder(),
        ApiRequest::get("/users"),
    );
    let records = drain(driver).await.unwrap();

    assert_eq!(ids(&records), vec!["R1", "R2", "R3"]);
    let requests = fetcher.requests();
    assert_eq!(requests.len(), 2);
    assert!(!requests[0].query.contains_key(CURSOR_PARAM));
    assert_eq!(requests[1].query.get(CURSOR_PARAM), Some(&"abc".to_string()));
}

#[tokio::test]
async fn test_driver_continues_past_empty_page_with_cursor() {
    let fetcher = MockFetcher::new()
        .page("/users", None, json!([]), Some("c1"))
        .page("/users", Some("c1"), json!([{"id": "R1"}]), None);
    let paginator = CursorPaginator::new(ParamLocation::Query, 100);

    let mut driver = PageDriver::new(
        &fetcher,
        &paginator,
        DecoderKind::Envelope.decoder(),
        ApiRequest::get("/users"),
    );

    assert!(driver.next_page().await.unwrap().unwrap().is_empty());
    assert_eq!(driver.next_page().await.unwrap().unwrap().len(), 1);
    assert!(driver.next_page().await.unwrap().is_none());
    assert_eq!(driver.pages_fetched(), 2);
    assert!(!driver.budget_exhausted());
}

#[tokio::test]
async fn test_driver_stop_prevents_next_request() {
    let fetcher = MockFetcher::new()
        .page("/users", None, json!([{"id": "R1"}]), Some("abc"))
        .page("/users", Some("abc"), json!([{"id": "R2"}]), None);
    let paginator = CursorPaginator::new(ParamLocation::Query, 100);

    let mut driver = PageDriver::new(
        &fetcher,
        &paginator,
        DecoderKind::Envelope.decoder(),
        ApiRequest::get("/users"),
    );

    driver.next_page().await.unwrap();
    driver.stop();
    assert!(driver.next_page().await.unwrap().is_none());
    assert_eq!(fetcher.requests().len(), 1);
}

#[tokio::test]
async fn test_driver_page_budget() {
    let fetcher = MockFetcher::new()
        .page("/users", None, json!([{"id": "R1"}]), Some("c1"))
        .page("/users", Some("c1"), json!([{"id": "R2"}]), Some("c2"))
        .page("/users", Some("c2"), json!([{"id": "R3"}]), None);
    let paginator = CursorPaginator::new(ParamLocation::Query, 100);

    let mut driver = PageDriver::new(
        &fetcher,
        &paginator,
        DecoderKind::Envelope.decoder(),
        ApiRequest::get("/users"),
    )
    .with_max_pages(Some(2));

    let mut records = Vec::new();
    while let Some(page) = driver.next_page().await.unwrap() {
        records.extend(page.records);
    }
    assert_eq!(ids(&records), vec!["R1", "R2"]);
    assert_eq!(fetcher.requests().len(), 2);
    assert!(driver.budget_exhausted());
}

#[tokio::test]
async fn test_driver_budget_not_exhausted_when_source_ends_first() {
    let fetcher = MockFetcher::new()
        .page("/users", None, json!([{"id": "R1"}]), Some("c1"))
        .page("/users", Some("c1"), json!([{"id": "R2"}]), None);
    let paginator = CursorPaginator::new(ParamLocation::Query, 100);

    let mut driver = PageDriver::new(
        &fetcher,
        &paginator,
        DecoderKind::Envelope.decoder(),
        ApiRequest::get("/users"),
    )
    .with_max_pages(Some(2));

    while driver.next_page().await.unwrap().is_some() {}
    assert_eq!(driver.pages_fetched(), 2);
    assert!(!driver.budget_exhausted());
}

#[tokio::test]
async fn test_driver_stop_on_last_budgeted_page_is_not_exhaustion() {
    let fetcher = MockFetcher::new()
        .page("/users", None, json!([{"id": "R1"}]), Some("c1"));
    let paginator = CursorPaginator::new(ParamLocation::Query, 100);

    let mut driver = PageDriver::new(
        &fetcher,
        &paginator,
        DecoderKind::Envelope.decoder(),
        ApiRequest::get("/users"),
    )
    .with_max_pages(Some(1));

    driver.next_page().await.unwrap();
    driver.stop();
    assert!(driver.next_page().await.unwrap().is_none());
    assert!(!driver.budget_exhausted());
}

#[tokio::test]
async fn test_driver_envelope_violation_is_fatal() {
    let fetcher = MockFetcher::new().route("/users", None, json!({"object": "error"}));
    let paginator = CursorPaginator::new(ParamLocation::Query, 100);

    let mut driver = PageDriver::new(
        &fetcher,
        &paginator,
        DecoderKind::Envelope.decoder(),
        ApiRequest::get("/users"),
    );

    let err = driver.next_page().await.unwrap_err();
    assert!(matches!(err, Error::Envelope { .. }));
    assert!(driver.next_page().await.unwrap().is_none());
    assert_eq!(fetcher.requests().len(), 1);
}

#[tokio::test]
async fn test_driver_single_object() {
    let fetcher = MockFetcher::new().route("/pages/p1", None, json!({"id": "p1", "object": "page"}));

    let driver = PageDriver::new(
        &fetcher,
        &NoPaginator,
        DecoderKind::Object.decoder(),
        ApiRequest::get("/pages/p1"),
    );
    let records = drain(driver).await.unwrap();

    assert_eq!(ids(&records), vec!["p1"]);
    assert!(fetcher.requests()[0].query.is_empty());
}

#[tokio::test]
async fn test_driver_over_http() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("page_size", "2"))
        .and(query_param_is_missing("start_cursor"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"id": "R1"}, {"id": "R2"}],
            "next_cursor": "abc"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("start_cursor", "abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"id": "R3"}],
            "next_cursor": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = HttpClientConfig::builder()
        .base_url(server.uri())
        .requests_per_second(0)
        .build();
    let client = HttpClient::with_config(config).unwrap();
    let paginator = CursorPaginator::new(ParamLocation::Query, 2);

    let driver = PageDriver::new(
        &client,
        &paginator,
        DecoderKind::Envelope.decoder(),
        ApiRequest::get("/users"),
    );
    let records = drain(driver).await.unwrap();

    assert_eq!(ids(&records), vec!["R1", "R2", "R3"]);
}
