// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # notion-tap
//!
//! Extracts users, pages, databases and block trees from the Notion API as
//! Singer-style JSON lines.
//!
//! ## Features
//!
//! - **Cursor pagination**: `start_cursor` / `next_cursor` in query or body
//! - **Incremental search**: bookmark on `last_edited_time`, early stop on
//!   newest-first results
//! - **Parent/child streams**: page details and blocks per page, with
//!   bounded concurrency across pages
//! - **Block trees**: recursive walk of nested blocks with lineage fields
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use notion_tap::{engine::SyncEngine, http::HttpClient, state::StateManager, streams, TapConfig};
//! use std::sync::Arc;
//!
//! let config = TapConfig::from_file("config.json")?;
//! let engine = SyncEngine::new(
//!     Arc::new(HttpClient::from_tap_config(&config)?),
//!     streams::catalog(&config)?,
//!     Arc::new(StateManager::from_file("state.json")?),
//! );
//!
//! let (tx, mut rx) = tokio::sync::mpsc::channel(1024);
//! tokio::spawn(async move {
//!     while let Some(msg) = rx.recv().await {
//!         println!("{}", msg.to_json());
//!     }
//! });
//! let report = engine.run(&["search", "pages"], tx).await?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          SyncEngine                             │
//! │  StreamGraph → execution order → instances per Context          │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌──────────┬───────────┬───────┴───────┬───────────┬─────────────┐
//! │   HTTP   │  Decode   │   Paginate    │  Cutoff   │   Walker    │
//! ├──────────┼───────────┼───────────────┼───────────┼─────────────┤
//! │ Bearer   │ Envelope  │ start_cursor  │ Bookmark  │ Frontier    │
//! │ Retry    │ Object    │ page_size     │ Early stop│ BFS / DFS   │
//! │ Rate Lim │           │ Page budget   │ High water│ Lineage     │
//! └──────────┴───────────┴───────────────┴───────────┴─────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types for the tap
pub mod error;

/// Common types and type aliases
pub mod types;

/// Tap configuration
pub mod config;

/// HTTP client with retry and rate limiting
pub mod http;

/// Response envelope decoders
pub mod decode;

/// Cursor pagination
pub mod pagination;

/// Replication cutoff and high-water mark
pub mod cutoff;

/// Parent-to-child contexts and path templates
pub mod context;

/// Stream declarations and their dependency graph
pub mod graph;

/// Recursive block tree walk
pub mod walker;

/// Bookmark persistence
pub mod state;

/// Main execution engine
pub mod engine;

/// Notion stream catalog
pub mod streams;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::TapConfig;
pub use error::{Error, Result};
pub use types::*;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
