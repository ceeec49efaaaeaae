//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::config::TapConfig;
use crate::engine::{Message, RunReport, SyncConfig, SyncEngine};
use crate::error::{Error, Result, ResultExt};
use crate::http::{ApiRequest, Fetcher, HttpClient};
use crate::state::{BookmarkStore, StateManager};
use crate::streams;
use crate::types::{CancelToken, LogLevel, Traversal};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Messages buffered between the engine and stdout
const CHANNEL_CAPACITY: usize = 1024;

/// CLI runner
pub struct Runner {
    cli: Cli,
    cancel: CancelToken,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self {
            cli,
            cancel: CancelToken::new(),
        }
    }

    /// Token that interrupts a running `read`
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Check => self.check().await,
            Commands::Discover => self.discover(),
            Commands::Read {
                streams,
                traversal,
                max_concurrency,
                max_pages,
            } => {
                let selection = Cli::stream_selection(streams.as_deref());
                self.read(&selection, *traversal, *max_concurrency, *max_pages)
                    .await
            }
        }
    }

    /// Load configuration, inline JSON taking precedence over the file
    fn load_config(&self) -> Result<TapConfig> {
        if let Some(json_str) = &self.cli.config_json {
            return TapConfig::from_json(json_str);
        }
        match &self.cli.config {
            Some(path) => TapConfig::from_file(path),
            None => Err(Error::config(
                "No configuration given (use --config or --config-json)",
            )),
        }
    }

    /// Load state
    fn load_state(&self) -> Result<StateManager> {
        // Inline state takes precedence
        if let Some(state_json) = &self.cli.state_json {
            StateManager::from_json(state_json)
        } else if let Some(path) = &self.cli.state {
            StateManager::from_file(path)
        } else {
            Ok(StateManager::in_memory())
        }
    }

    /// Check connection
    async fn check(&self) -> Result<()> {
        let config = self.load_config()?;
        let client = HttpClient::from_tap_config(&config)?;
        info!(base_url = %config.base_url, "Checking connection");

        match client.fetch(&ApiRequest::get("/users/me")).await {
            Ok(me) => {
                self.output_message(&json!({
                    "type": "CONNECTION_STATUS",
                    "connectionStatus": {
                        "status": "SUCCEEDED",
                        "message": "Connection successful",
                        "bot": me.get("name").cloned().unwrap_or(Value::Null),
                    }
                }));
                Ok(())
            }
            Err(e) => {
                self.output_message(&json!({
                    "type": "CONNECTION_STATUS",
                    "connectionStatus": {
                        "status": "FAILED",
                        "message": format!("Connection failed: {e}")
                    }
                }));
                Err(e)
            }
        }
    }

    /// Discover streams
    fn discover(&self) -> Result<()> {
        let config = self.load_config()?;
        let graph = streams::catalog(&config)?;
        self.output_message(&streams::describe(&graph));
        Ok(())
    }

    /// Read streams, writing messages to stdout as they arrive
    async fn read(
        &self,
        selection: &[String],
        traversal: Option<Traversal>,
        max_concurrency: Option<usize>,
        max_pages: Option<u32>,
    ) -> Result<()> {
        let mut config = self.load_config()?;
        if let Some(traversal) = traversal {
            config.traversal = traversal;
        }
        if let Some(max) = max_concurrency {
            config.max_concurrency = max;
        }
        if let Some(max) = max_pages {
            config.max_pages_per_instance = max;
        }
        config.validate()?;

        let graph = streams::catalog(&config).context("Invalid stream catalog")?;
        let state = self.load_state()?;
        let client = HttpClient::from_tap_config(&config)?;

        let engine = SyncEngine::new(Arc::new(client), graph, Arc::new(state.clone()))
            .with_config(SyncConfig::from_tap_config(&config))
            .with_start_date(config.start_date()?)
            .with_cancel(self.cancel.clone());

        let (tx, mut rx) = mpsc::channel::<Message>(CHANNEL_CAPACITY);
        let format = self.cli.format;
        let writer = tokio::spawn(async move {
            let mut written = 0u64;
            while let Some(message) = rx.recv().await {
                match &message {
                    Message::Log { level, message } => log_message(*level, message),
                    _ => {
                        print_value(format, &message.to_json());
                        written += 1;
                    }
                }
            }
            written
        });

        let report = engine.run(selection, tx).await;
        let written = writer
            .await
            .map_err(|e| Error::Other(format!("Output task failed: {e}")))?;
        let report = report?;
        debug!(written, "Output drained");

        state.save().await?;
        self.output_message(&Message::state(state.snapshot().await).to_json());

        self.finish(&report)
    }

    /// Log the run summary and turn failures into a non-zero exit
    fn finish(&self, report: &RunReport) -> Result<()> {
        for stream in &report.streams {
            info!(
                stream = %stream.stream,
                records = stream.records,
                pages = stream.pages_fetched,
                instances = stream.instances,
                failed_instances = stream.failed_instances,
                truncated_instances = stream.truncated_instances,
                "Stream summary"
            );
        }

        if report.cancelled {
            warn!("Sync interrupted, bookmarks of unfinished streams were not advanced");
            return Err(Error::Cancelled);
        }

        if !report.failures.is_empty() {
            let failures = json!({
                "type": "SYNC_FAILED",
                "failures": report.failures,
            });
            eprintln!(
                "{}",
                serde_json::to_string(&failures).unwrap_or_default()
            );
            return Err(Error::Other(format!(
                "{} stream instance(s) or block(s) failed",
                report.failures.len()
            )));
        }

        info!(
            records = report.total_records(),
            duration_ms = report.duration_ms,
            "Sync complete"
        );
        Ok(())
    }

    /// Output a message
    fn output_message(&self, msg: &Value) {
        print_value(self.cli.format, msg);
    }
}

fn print_value(format: OutputFormat, msg: &Value) {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string(msg).unwrap_or_default());
        }
        OutputFormat::Pretty => {
            println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
        }
    }
}

/// Engine log messages go to the tracing subscriber, not stdout
fn log_message(level: LogLevel, message: &str) {
    match level {
        LogLevel::Error => error!("{message}"),
        LogLevel::Warn => warn!("{message}"),
        LogLevel::Info => info!("{message}"),
        LogLevel::Debug => debug!("{message}"),
    }
}
