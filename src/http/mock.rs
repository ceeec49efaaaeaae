//! Scripted in-memory [`Fetcher`] for unit tests

use super::request::{ApiRequest, Fetcher};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;

/// Answers requests from a table keyed by path and cursor
///
/// The cursor is read from `start_cursor`, in the query string for GET and in
/// the body for POST, so one route table covers both request shapes.
#[derive(Default)]
pub struct MockFetcher {
    routes: HashMap<(String, Option<String>), Value>,
    failures: HashMap<String, u16>,
    log: Mutex<Vec<ApiRequest>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `path` when the request carries `cursor`
    pub fn route(mut self, path: &str, cursor: Option<&str>, body: Value) -> Self {
        self.routes
            .insert((path.to_string(), cursor.map(String::from)), body);
        self
    }

    /// Serve one envelope page
    pub fn page(self, path: &str, cursor: Option<&str>, results: Value, next: Option<&str>) -> Self {
        self.route(path, cursor, json!({"results": results, "next_cursor": next}))
    }

    /// Fail every request to `path` with an HTTP status
    pub fn fail(mut self, path: &str, status: u16) -> Self {
        self.failures.insert(path.to_string(), status);
        self
    }

    /// Requests seen so far, in order
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.log.lock().unwrap().clone()
    }

    /// Paths requested so far, in order
    pub fn paths(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.path).collect()
    }

    fn cursor_of(request: &ApiRequest) -> Option<String> {
        request.query.get("start_cursor").cloned().or_else(|| {
            request
                .body
                .as_ref()
                .and_then(|b| b.get("start_cursor"))
                .and_then(Value::as_str)
                .map(String::from)
        })
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, request: &ApiRequest) -> Result<Value> {
        self.log.lock().unwrap().push(request.clone());

        if let Some(status) = self.failures.get(&request.path) {
            return Err(Error::http_status(*status, "scripted failure"));
        }

        let key = (request.path.clone(), Self::cursor_of(request));
        self.routes
            .get(&key)
            .cloned()
            .ok_or_else(|| Error::http_status(404, format!("no route for {key:?}")))
    }
}
