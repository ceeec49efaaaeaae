//! CLI commands and argument parsing

use crate::types::Traversal;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Notion tap: extract users, pages, databases and block trees
#[derive(Parser, Debug)]
#[command(name = "notion-tap")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (JSON, or YAML by extension)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Inline config JSON
    #[arg(long, global = true)]
    pub config_json: Option<String>,

    /// State file (JSON), updated after every bookmark
    #[arg(short, long, global = true)]
    pub state: Option<PathBuf>,

    /// Inline state JSON
    #[arg(long, global = true)]
    pub state_json: Option<String>,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Test the credential against `GET /users/me`
    Check,

    /// Print the stream catalog
    Discover,

    /// Read data from streams
    Read {
        /// Streams to sync (comma-separated, empty = all)
        #[arg(long)]
        streams: Option<String>,

        /// Block tree traversal order
        #[arg(long)]
        traversal: Option<Traversal>,

        /// Concurrent instances of one child stream
        #[arg(long)]
        max_concurrency: Option<usize>,

        /// Page budget per stream instance
        #[arg(long)]
        max_pages: Option<u32>,
    },
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one message per line)
    Json,
    /// Human-readable output
    Pretty,
}

impl Cli {
    /// Selected stream names from `--streams`
    pub fn stream_selection(raw: Option<&str>) -> Vec<String> {
        raw.map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
    }
}
