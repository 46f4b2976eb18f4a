//! Vigil State Head
//!
//! The monitoring service head. It answers cluster event and log queries behind a
//! single admission guard so that a burst of requests is answered with a fast
//! "try again later" envelope instead of piling up work.

pub mod config;
pub mod logs;
pub mod query;
pub mod source;

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use vigil_core::{filter_events, CallGuard, GuardError};

pub use config::{ConfigError, HeadConfig, MAX_CONCURRENT_CALLS_ENV};
pub use logs::{categorize_log_files, filter_log_files, tail, LogError, LogSource, MISC_CATEGORY};
pub use query::{EventQuery, QueryError};
pub use source::{EventSource, InMemoryEventSource, JsonFileEventSource, SourceError};

/// Result of a head operation
pub type HeadResult = Result<HeadResponse, HeadError>;

/// JSON envelope returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadResponse {
    pub result: bool,
    pub msg: String,
    pub data: serde_json::Value,
}

impl HeadResponse {
    pub fn ok(msg: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            result: true,
            msg: msg.into(),
            data,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            result: false,
            msg: msg.into(),
            data: json!({}),
        }
    }

    /// Envelope sent to callers that were not admitted
    pub fn rate_limited(limit: usize) -> Self {
        Self::error(format!(
            "Max number of in-progress requests={} reached. Please try again later.",
            limit
        ))
    }

    /// Collapse an operation result into an envelope, turning errors into failures
    pub fn from_result(result: HeadResult) -> Self {
        result.unwrap_or_else(|e| Self::error(e.to_string()))
    }
}

/// Monitoring head
///
/// All operations share one admission bound.
pub struct StateHead {
    guard: CallGuard<HeadResult>,
    events: Arc<dyn EventSource>,
    logs: Option<LogSource>,
}

impl StateHead {
    /// Create a head reading events from `events`
    pub fn new(config: &HeadConfig, events: Arc<dyn EventSource>) -> Result<Self, HeadError> {
        config.validate()?;

        let limit = config.max_concurrent_calls;
        let guard: CallGuard<HeadResult> = CallGuard::new(limit, move || async move {
            Ok(HeadResponse::rate_limited(limit))
        })?;

        let logs = config.log_dir.as_ref().map(LogSource::new);

        info!(
            max_concurrent_calls = limit,
            log_dir = ?config.log_dir,
            "State head initialized"
        );

        Ok(Self {
            guard,
            events,
            logs,
        })
    }

    /// Serve logs from `logs`, replacing any configured directory
    pub fn with_log_source(mut self, logs: LogSource) -> Self {
        self.logs = Some(logs);
        self
    }

    /// Requests currently being served
    pub fn in_flight_count(&self) -> usize {
        self.guard.in_flight_count()
    }

    pub fn max_concurrent_calls(&self) -> usize {
        self.guard.limit()
    }

    /// List cluster events matching `query`; events are returned under `data.result`
    pub async fn list_cluster_events(&self, query: &EventQuery) -> HeadResult {
        self.guard.call(|| self.fetch_cluster_events(query)).await
    }

    /// List log files whose names contain every filter, grouped by category
    pub async fn list_logs<S: AsRef<str>>(&self, filters: &[S]) -> HeadResult {
        self.guard.call(|| self.fetch_log_index(filters)).await
    }

    /// Last `lines` lines of a log file
    pub async fn tail_log(&self, file: &str, lines: usize) -> HeadResult {
        self.guard.call(|| self.fetch_log_tail(file, lines)).await
    }

    async fn fetch_cluster_events(&self, query: &EventQuery) -> HeadResult {
        let criteria = query.to_criteria()?;
        let events = self.events.fetch_events().await?;
        let selected = filter_events(&events, &criteria);

        debug!(
            total = events.len(),
            selected = selected.len(),
            "Filtered cluster events"
        );

        Ok(HeadResponse::ok(
            "Fetched cluster events",
            json!({ "result": selected }),
        ))
    }

    async fn fetch_log_index<S: AsRef<str>>(&self, filters: &[S]) -> HeadResult {
        let logs = self.logs.clone().ok_or(LogError::NotConfigured)?;
        let files = tokio::task::spawn_blocking(move || logs.list_files())
            .await
            .map_err(LogError::from)??;
        let index = categorize_log_files(&filter_log_files(&files, filters));

        Ok(HeadResponse::ok("Listed log files", json!({ "result": index })))
    }

    async fn fetch_log_tail(&self, file: &str, lines: usize) -> HeadResult {
        let logs = self.logs.clone().ok_or(LogError::NotConfigured)?;
        let name = file.to_string();
        let (text, end_offset) =
            tokio::task::spawn_blocking(move || logs.tail_file(&name, lines))
                .await
                .map_err(LogError::from)??;

        Ok(HeadResponse::ok(
            "Fetched log lines",
            json!({
                "file": file,
                "lines": String::from_utf8_lossy(&text),
                "end_offset": end_offset,
            }),
        ))
    }
}

/// Head errors
#[derive(Debug, Error)]
pub enum HeadError {
    #[error("Invalid query: {0}")]
    Query(#[from] QueryError),

    #[error("Event source error: {0}")]
    Source(#[from] SourceError),

    #[error("Log error: {0}")]
    Log(#[from] LogError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Guard error: {0}")]
    Guard(#[from] GuardError),
}
