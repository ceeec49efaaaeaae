//! Tap configuration
//!
//! The configuration is consumed, not owned, by the engine: it is loaded once
//! (JSON file, YAML file or inline JSON), validated into a [`TapConfig`] and
//! then threaded explicitly into the HTTP client, the catalog and the engine.

use crate::cutoff::parse_timestamp;
use crate::error::{Error, Result};
use crate::types::{BackoffType, Traversal};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Notion REST API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.notion.com/v1";

/// Default value for the `Notion-Version` header
pub const DEFAULT_NOTION_VERSION: &str = "2022-06-28";

/// Largest page size the API accepts
pub const MAX_PAGE_SIZE: u32 = 100;

/// Object types accepted by the search filter
const SEARCH_FILTER_OBJECTS: [&str; 2] = ["page", "database"];

/// Complete tap configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TapConfig {
    /// Notion integration token
    pub auth_token: String,

    /// Initial cutoff for incremental streams (ISO-8601 datetime or date)
    #[serde(default)]
    pub start_date: Option<String>,

    /// Override for the `Notion-Version` header
    #[serde(default)]
    pub notion_version: Option<String>,

    /// Items per page for list and search endpoints
    #[serde(default)]
    pub page_size: Option<u32>,

    /// Custom User-Agent header
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Restrict search results to "page" or "database"
    #[serde(default)]
    pub search_filter_object: Option<String>,

    /// Free-text search query
    #[serde(default)]
    pub search_query: Option<String>,

    /// API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Concurrent instances of one child stream
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Page budget for a single stream instance (0 = unlimited)
    #[serde(default)]
    pub max_pages_per_instance: u32,

    /// Frontier discipline for the block tree walk
    #[serde(default)]
    pub traversal: Traversal,

    /// Retries per request
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff between retries
    #[serde(default)]
    pub backoff: BackoffType,

    /// Request rate limit (Notion allows ~3 requests per second on average), 0 disables it
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_max_concurrency() -> usize {
    4
}

fn default_max_retries() -> u32 {
    5
}

fn default_requests_per_second() -> u32 {
    crate::http::NOTION_REQUESTS_PER_SECOND
}

impl TapConfig {
    /// Create a config with defaults for everything but the token
    pub fn new(auth_token: impl Into<String>) -> Self {
        Self {
            auth_token: auth_token.into(),
            start_date: None,
            notion_version: None,
            page_size: None,
            user_agent: None,
            search_filter_object: None,
            search_query: None,
            base_url: default_base_url(),
            max_concurrency: default_max_concurrency(),
            max_pages_per_instance: 0,
            traversal: Traversal::default(),
            max_retries: default_max_retries(),
            backoff: BackoffType::default(),
            requests_per_second: default_requests_per_second(),
        }
    }

    /// Parse and validate a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::config(format!("Invalid config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file, choosing YAML or JSON by extension
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read config file: {e}")))?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Self::from_yaml(&content),
            _ => Self::from_json(&content),
        }
    }

    /// Check field constraints
    pub fn validate(&self) -> Result<()> {
        if self.auth_token.trim().is_empty() {
            return Err(Error::missing_field("auth_token"));
        }

        if let Some(size) = self.page_size {
            if size == 0 || size > MAX_PAGE_SIZE {
                return Err(Error::invalid_value(
                    "page_size",
                    format!("must be between 1 and {MAX_PAGE_SIZE}, got {size}"),
                ));
            }
        }

        if let Some(object) = &self.search_filter_object {
            if !SEARCH_FILTER_OBJECTS.contains(&object.as_str()) {
                return Err(Error::invalid_value(
                    "search_filter_object",
                    format!("expected 'page' or 'database', got '{object}'"),
                ));
            }
        }

        if self.start_date.is_some() {
            self.start_date()?;
        }

        if self.max_concurrency == 0 {
            return Err(Error::invalid_value("max_concurrency", "must be at least 1"));
        }

        url::Url::parse(&self.base_url)?;

        Ok(())
    }

    /// Effective page size
    pub fn page_size(&self) -> u32 {
        self.page_size.unwrap_or(MAX_PAGE_SIZE)
    }

    /// Effective `Notion-Version` header value
    pub fn notion_version(&self) -> &str {
        self.notion_version
            .as_deref()
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_NOTION_VERSION)
    }

    /// Parsed `start_date`, date-only values meaning midnight UTC
    pub fn start_date(&self) -> Result<Option<DateTime<Utc>>> {
        match self.start_date.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => parse_timestamp(raw)
                .map(Some)
                .map_err(|_| Error::invalid_value("start_date", format!("not ISO-8601: {raw}"))),
        }
    }

    /// Page budget as an option
    pub fn max_pages(&self) -> Option<u32> {
        (self.max_pages_per_instance > 0).then_some(self.max_pages_per_instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_from_minimal_json() {
        let config = TapConfig::from_json(r#"{"auth_token": "secret_abc"}"#).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.page_size(), 100);
        assert_eq!(config.notion_version(), "2022-06-28");
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.traversal, Traversal::BreadthFirst);
        assert!(config.max_pages().is_none());
        assert!(config.start_date().unwrap().is_none());
    }

    #[test]
    fn test_missing_token_rejected() {
        let err = TapConfig::from_json(r#"{"auth_token": "  "}"#).unwrap_err();
        assert!(matches!(err, Error::MissingConfigField { .. }));
    }

    #[test]
    fn test_page_size_bounds() {
        let err = TapConfig::from_json(r#"{"auth_token": "t", "page_size": 101}"#).unwrap_err();
        assert!(err.to_string().contains("page_size"));

        let err = TapConfig::from_json(r#"{"auth_token": "t", "page_size": 0}"#).unwrap_err();
        assert!(err.to_string().contains("page_size"));

        let config = TapConfig::from_json(r#"{"auth_token": "t", "page_size": 25}"#).unwrap();
        assert_eq!(config.page_size(), 25);
    }

    #[test]
    fn test_search_filter_object_validation() {
        let err = TapConfig::from_json(r#"{"auth_token": "t", "search_filter_object": "block"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("search_filter_object"));

        let config =
            TapConfig::from_json(r#"{"auth_token": "t", "search_filter_object": "database"}"#)
                .unwrap();
        assert_eq!(config.search_filter_object.as_deref(), Some("database"));
    }

    #[test]
    fn test_start_date_date_only_is_midnight_utc() {
        let config =
            TapConfig::from_json(r#"{"auth_token": "t", "start_date": "2024-01-15"}"#).unwrap();
        assert_eq!(
            config.start_date().unwrap(),
            Some(Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_invalid_start_date_rejected() {
        let err = TapConfig::from_json(r#"{"auth_token": "t", "start_date": "last tuesday"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("start_date"));
    }

    #[test]
    fn test_notion_version_override() {
        let config =
            TapConfig::from_json(r#"{"auth_token": "t", "notion_version": "2025-09-03"}"#).unwrap();
        assert_eq!(config.notion_version(), "2025-09-03");
    }

    #[test]
    fn test_from_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "auth_token: secret_abc\ntraversal: depth_first\nmax_pages_per_instance: 3\n",
        )
        .unwrap();

        let config = TapConfig::from_file(&path).unwrap();
        assert_eq!(config.traversal, Traversal::DepthFirst);
        assert_eq!(config.max_pages(), Some(3));
    }

    #[test]
    fn test_from_missing_file() {
        let err = TapConfig::from_file("/nonexistent/config.json").unwrap_err();
        assert!(matches!(err, Error::FileNotFound { .. }));
    }
}
