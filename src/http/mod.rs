//! HTTP client module
//!
//! The reliable-request capability the engine is built on.
//!
//! # Features
//!
//! - **Bearer Credential**: the integration token is sent as-is, never inspected
//! - **Notion Headers**: `Notion-Version` and an optional `User-Agent`
//! - **Automatic Retries**: 429, 5xx, timeouts and connect errors, with backoff
//! - **Rate Limiting**: token bucket rate limiter using governor
//!
//! The engine only sees the [`Fetcher`] trait, so tests can swap the network
//! for an in-memory source.

mod client;
mod rate_limit;
mod request;

pub use client::{HttpClient, HttpClientConfig, HttpClientConfigBuilder};
pub use rate_limit::{RequestBudget, NOTION_REQUESTS_PER_SECOND};
pub use request::{ApiRequest, Fetcher};

#[cfg(test)]
pub(crate) mod mock;
