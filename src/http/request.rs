//! Request description and the fetch seam

use crate::error::Result;
use crate::types::Method;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One API request, independent of transport
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiRequest {
    /// HTTP method
    pub method: Method,
    /// Path relative to the API base URL (e.g. `/blocks/abc/children`)
    pub path: String,
    /// Query parameters (GET endpoints)
    pub query: BTreeMap<String, String>,
    /// JSON body (POST endpoints)
    pub body: Option<Value>,
}

impl ApiRequest {
    /// Create a GET request
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            ..Default::default()
        }
    }

    /// Create a POST request with an empty JSON object body
    pub fn post(path: impl Into<String>) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            query: BTreeMap::new(),
            body: Some(Value::Object(Map::new())),
        }
    }

    /// Add a query parameter
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Set the JSON body
    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Set a top-level body field, creating the body object if needed
    pub fn set_body_field(&mut self, key: impl Into<String>, value: Value) {
        let body = self
            .body
            .get_or_insert_with(|| Value::Object(Map::new()));
        if !body.is_object() {
            *body = Value::Object(Map::new());
        }
        if let Value::Object(map) = body {
            map.insert(key.into(), value);
        }
    }
}

/// Anything that can answer an [`ApiRequest`] with a JSON body
///
/// Implementations own transport concerns (auth, retries, rate limits).
/// A returned error is final for that request.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Execute the request and return the parsed JSON body
    async fn fetch(&self, request: &ApiRequest) -> Result<Value>;
}
