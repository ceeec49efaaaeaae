//! HTTP client with retry and rate limiting
//!
//! Provides a robust HTTP client that handles:
//! - Bearer authentication and Notion headers
//! - Automatic retries with configurable backoff
//! - Rate limiting to stay under the API quota
//! - Error classification for retry decisions

use super::rate_limit::{RequestBudget, NOTION_REQUESTS_PER_SECOND};
use super::request::{ApiRequest, Fetcher};
use crate::config::TapConfig;
use crate::error::{Error, Result};
use crate::types::BackoffType;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Header carrying the API version
pub const NOTION_VERSION_HEADER: &str = "Notion-Version";

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL for all requests
    pub base_url: Option<String>,
    /// Request timeout
    pub timeout: Duration,
    /// Maximum number of retries
    pub max_retries: u32,
    /// Initial delay for backoff
    pub initial_backoff: Duration,
    /// Maximum delay for backoff
    pub max_backoff: Duration,
    /// Type of backoff strategy
    pub backoff_type: BackoffType,
    /// Requests per second shared by all calls, 0 disables throttling
    pub requests_per_second: u32,
    /// Default headers for all requests
    pub default_headers: HashMap<String, String>,
    /// Opaque bearer credential
    pub bearer_token: Option<String>,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(60),
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(60),
            backoff_type: BackoffType::Exponential,
            requests_per_second: NOTION_REQUESTS_PER_SECOND,
            default_headers: HashMap::new(),
            bearer_token: None,
            user_agent: format!("notion-tap/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Create a new config builder
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }

    /// Build the client settings a tap run needs
    pub fn from_tap_config(config: &TapConfig) -> Self {
        let mut builder = Self::builder()
            .base_url(&config.base_url)
            .bearer_token(&config.auth_token)
            .header(NOTION_VERSION_HEADER, config.notion_version())
            .max_retries(config.max_retries)
            .backoff(
                config.backoff,
                Duration::from_millis(500),
                Duration::from_secs(60),
            )
            .requests_per_second(config.requests_per_second);

        if let Some(agent) = config.user_agent.as_deref().filter(|a| !a.is_empty()) {
            builder = builder.user_agent(agent);
        }

        builder.build()
    }
}

/// Builder for HTTP client config
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set max retries
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set backoff configuration
    pub fn backoff(mut self, backoff_type: BackoffType, initial: Duration, max: Duration) -> Self {
        self.config.backoff_type = backoff_type;
        self.config.initial_backoff = initial;
        self.config.max_backoff = max;
        self
    }

    /// Set the shared request rate
    pub fn requests_per_second(mut self, per_second: u32) -> Self {
        self.config.requests_per_second = per_second;
        self
    }

    /// Add a default header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    /// Set the bearer credential
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.config.bearer_token = Some(token.into());
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

/// HTTP client with retry and rate limiting
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
    budget: Option<RequestBudget>,
}

impl HttpClient {
    /// Create a new HTTP client with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        let budget = RequestBudget::per_second(config.requests_per_second);

        Ok(Self {
            client,
            config,
            budget,
        })
    }

    /// Create a client for a tap run
    pub fn from_tap_config(config: &TapConfig) -> Result<Self> {
        Self::with_config(HttpClientConfig::from_tap_config(config))
    }

    /// Get the client configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Send a request, retrying transient failures
    pub async fn send(&self, request: &ApiRequest) -> Result<Response> {
        let full_url = self.build_url(&request.path);
        let max_retries = self.config.max_retries;
        let method: reqwest::Method = request.method.into();

        let mut last_error = None;
        let mut attempt = 0;

        while attempt <= max_retries {
            if let Some(budget) = &self.budget {
                budget.acquire().await;
            }

            let mut req = self.client.request(method.clone(), &full_url);

            for (key, value) in &self.config.default_headers {
                req = req.header(key.as_str(), value.as_str());
            }

            if let Some(token) = &self.config.bearer_token {
                req = req.bearer_auth(token);
            }

            if !request.query.is_empty() {
                req = req.query(&request.query);
            }

            if let Some(ref body) = request.body {
                req = req.json(body);
            }

            match req.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        let retry_after = extract_retry_after(&response)
                            .unwrap_or_else(|| self.calculate_backoff(attempt));
                        if attempt < max_retries {
                            warn!(
                                attempt = attempt + 1,
                                max_attempts = max_retries + 1,
                                wait_ms = retry_after.as_millis() as u64,
                                "Rate limited (429), backing off"
                            );
                            tokio::time::sleep(retry_after).await;
                            attempt += 1;
                            continue;
                        }
                        return Err(Error::RateLimited {
                            retry_after_seconds: retry_after.as_secs(),
                        });
                    }

                    let failure = Error::http_status(status.as_u16(), "");
                    if failure.is_retryable() && attempt < max_retries {
                        let delay = self.calculate_backoff(attempt);
                        warn!(
                            status = status.as_u16(),
                            attempt = attempt + 1,
                            max_attempts = max_retries + 1,
                            "Request failed, retrying in {:?}",
                            delay
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        last_error = Some(failure);
                        continue;
                    }

                    if status.is_client_error() || status.is_server_error() {
                        let body = response.text().await.unwrap_or_default();
                        return Err(Error::http_status(status.as_u16(), body));
                    }

                    debug!(method = %request.method, url = %full_url, "Request succeeded");
                    return Ok(response);
                }
                Err(e) => {
                    if e.is_timeout() {
                        let timeout_ms = self.config.timeout.as_millis() as u64;
                        if attempt < max_retries {
                            let delay = self.calculate_backoff(attempt);
                            warn!(
                                attempt = attempt + 1,
                                max_attempts = max_retries + 1,
                                "Request timeout, retrying in {:?}",
                                delay
                            );
                            tokio::time::sleep(delay).await;
                            attempt += 1;
                            last_error = Some(Error::Timeout { timeout_ms });
                            continue;
                        }
                        return Err(Error::Timeout { timeout_ms });
                    }

                    if e.is_connect() && attempt < max_retries {
                        let delay = self.calculate_backoff(attempt);
                        warn!(
                            attempt = attempt + 1,
                            max_attempts = max_retries + 1,
                            "Connection error, retrying in {:?}",
                            delay
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        last_error = Some(Error::Http(e));
                        continue;
                    }

                    return Err(Error::Http(e));
                }
            }
        }

        Err(last_error.unwrap_or(Error::MaxRetriesExceeded { max_retries }))
    }

    /// Build full URL from path
    fn build_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }

        match &self.config.base_url {
            Some(base) => {
                let base = base.trim_end_matches('/');
                let path = path.trim_start_matches('/');
                format!("{base}/{path}")
            }
            None => path.to_string(),
        }
    }

    /// Calculate backoff delay for a given attempt
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let delay = match self.config.backoff_type {
            BackoffType::Constant => self.config.initial_backoff,
            BackoffType::Linear => self.config.initial_backoff * (attempt + 1),
            BackoffType::Exponential => {
                let factor = 2u32.saturating_pow(attempt);
                self.config.initial_backoff.saturating_mul(factor)
            }
        };

        std::cmp::min(delay, self.config.max_backoff)
    }
}

#[async_trait]
impl Fetcher for HttpClient {
    async fn fetch(&self, request: &ApiRequest) -> Result<Value> {
        let response = self.send(request).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.config.base_url)
            .field("max_retries", &self.config.max_retries)
            .field("has_credential", &self.config.bearer_token.is_some())
            .field("budget", &self.budget)
            .finish_non_exhaustive()
    }
}

/// Extract retry-after header value
fn extract_retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
