//! Event Sources
//!
//! The head does not produce events; it reads them from a source such as an event store
//! export. Sources are consumed read-only.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;
use vigil_event::ClusterEvent;

/// Supplier of cluster events
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Fetch the current event sequence, oldest first
    async fn fetch_events(&self) -> Result<Vec<ClusterEvent>, SourceError>;
}

/// Events held in memory, appended by the embedding process
#[derive(Debug, Default)]
pub struct InMemoryEventSource {
    events: RwLock<Vec<ClusterEvent>>,
}

impl InMemoryEventSource {
    pub fn new(events: Vec<ClusterEvent>) -> Self {
        Self {
            events: RwLock::new(events),
        }
    }

    /// Append an event
    pub async fn push(&self, event: ClusterEvent) {
        self.events.write().await.push(event);
    }

    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }
}

#[async_trait]
impl EventSource for InMemoryEventSource {
    async fn fetch_events(&self) -> Result<Vec<ClusterEvent>, SourceError> {
        Ok(self.events.read().await.clone())
    }
}

/// Events read from a JSON file on every fetch
///
/// Accepts either a JSON array of events or one JSON event per line.
#[derive(Debug, Clone)]
pub struct JsonFileEventSource {
    path: PathBuf,
}

impl JsonFileEventSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn parse(&self, content: &str) -> Result<Vec<ClusterEvent>, SourceError> {
        let parse_err = |e: serde_json::Error| SourceError::Parse(self.path.clone(), e.to_string());

        if content.trim_start().starts_with('[') {
            return serde_json::from_str(content).map_err(parse_err);
        }

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(parse_err))
            .collect()
    }
}

#[async_trait]
impl EventSource for JsonFileEventSource {
    async fn fetch_events(&self) -> Result<Vec<ClusterEvent>, SourceError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| SourceError::Io(self.path.clone(), e))?;

        let events = self.parse(&content)?;
        debug!(path = %self.path.display(), count = events.len(), "Loaded events");
        Ok(events)
    }
}

/// Event source errors
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("IO error reading {0:?}: {1}")]
    Io(PathBuf, std::io::Error),

    #[error("Failed to parse events in {0:?}: {1}")]
    Parse(PathBuf, String),

    #[error("Event source unavailable: {0}")]
    Unavailable(String),
}
