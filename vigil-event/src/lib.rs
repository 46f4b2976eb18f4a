//! Vigil Event Model
//!
//! This module defines the cluster event record served by the monitoring head.
//! Events are produced elsewhere and are immutable once built.

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use vigil_schema::*;

/// A single cluster event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterEvent {
    /// Unique event identifier
    #[serde(default)]
    pub event_id: String,

    /// Component that emitted the event
    pub source_type: SourceType,

    /// Host the event originated on
    #[serde(default)]
    pub source_hostname: String,

    /// Process id of the emitter
    #[serde(default)]
    pub source_pid: u32,

    /// Event severity
    pub severity: Severity,

    /// Short machine-friendly label (e.g. "RAY_ACTOR_DIED")
    #[serde(default)]
    pub label: String,

    /// Human readable message
    #[serde(default)]
    pub message: String,

    /// Wall clock timestamp in seconds
    #[serde(default)]
    pub timestamp: u64,

    /// Dynamic key/value fields (job_id, serve_replica_id, ...), serialized in key order
    #[serde(default)]
    pub custom_fields: BTreeMap<String, FieldValue>,
}

impl ClusterEvent {
    /// Create a new event with no custom fields
    pub fn new(severity: Severity, source_type: SourceType) -> Self {
        Self {
            event_id: String::new(),
            source_type,
            source_hostname: String::new(),
            source_pid: 0,
            severity,
            label: String::new(),
            message: String::new(),
            timestamp: 0,
            custom_fields: BTreeMap::new(),
        }
    }

    /// Add a custom field to the event
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.custom_fields.insert(name.into(), value.into());
        self
    }

    /// Get a custom field value by name
    pub fn custom_field(&self, name: &str) -> Option<&FieldValue> {
        self.custom_fields.get(name)
    }

    /// Check if event carries a specific custom field
    pub fn has_field(&self, name: &str) -> bool {
        self.custom_fields.contains_key(name)
    }

    /// Create an event builder
    pub fn builder() -> EventBuilder {
        EventBuilder::default()
    }
}

/// Event builder for convenient event construction
#[derive(Debug, Default)]
pub struct EventBuilder {
    event_id: Option<String>,
    source_type: Option<SourceType>,
    source_hostname: Option<String>,
    source_pid: Option<u32>,
    severity: Option<Severity>,
    label: Option<String>,
    message: Option<String>,
    timestamp: Option<u64>,
    custom_fields: BTreeMap<String, FieldValue>,
}

impl EventBuilder {
    pub fn event_id(mut self, id: impl Into<String>) -> Self {
        self.event_id = Some(id.into());
        self
    }

    pub fn source_type(mut self, source_type: SourceType) -> Self {
        self.source_type = Some(source_type);
        self
    }

    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.source_hostname = Some(hostname.into());
        self
    }

    pub fn pid(mut self, pid: u32) -> Self {
        self.source_pid = Some(pid);
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn timestamp(mut self, ts: u64) -> Self {
        self.timestamp = Some(ts);
        self
    }

    /// Add a custom field
    pub fn field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.custom_fields.insert(name.into(), value.into());
        self
    }

    /// Build the event
    pub fn build(self) -> Result<ClusterEvent, BuildError> {
        Ok(ClusterEvent {
            event_id: self.event_id.unwrap_or_default(),
            source_type: self
                .source_type
                .ok_or(BuildError::MissingField("source_type"))?,
            source_hostname: self.source_hostname.unwrap_or_default(),
            source_pid: self.source_pid.unwrap_or_default(),
            severity: self.severity.ok_or(BuildError::MissingField("severity"))?,
            label: self.label.unwrap_or_default(),
            message: self.message.unwrap_or_default(),
            timestamp: self.timestamp.unwrap_or_default(),
            custom_fields: self.custom_fields,
        })
    }
}

/// Error building an event
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_builder() {
        let event = ClusterEvent::builder()
            .event_id("evt-1")
            .severity(Severity::Error)
            .source_type(SourceType::Gcs)
            .message("actor died")
            .field("job_id", 1i64)
            .build()
            .unwrap();

        assert_eq!(event.event_id, "evt-1");
        assert_eq!(event.severity, Severity::Error);
        assert_eq!(event.source_type, SourceType::Gcs);
        assert!(event.has_field("job_id"));
    }

    #[test]
    fn test_builder_requires_severity() {
        let result = ClusterEvent::builder().source_type(SourceType::Raylet).build();
        assert!(matches!(result, Err(BuildError::MissingField("severity"))));
    }

    #[test]
    fn test_event_custom_field() {
        let event = ClusterEvent::new(Severity::Info, SourceType::Serve)
            .with_field("serve_replica_id", 3i64);

        assert_eq!(event.custom_field("serve_replica_id").and_then(|v| v.as_i64()), Some(3));
        assert!(event.custom_field("job_id").is_none());
    }

    #[test]
    fn test_event_from_store_json() {
        let json = r#"{
            "severity": "WARNING",
            "source_type": "GCS",
            "custom_fields": {"job_id": 2, "serve_replica_id": "10"}
        }"#;

        let event: ClusterEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.severity, Severity::Warning);
        assert_eq!(event.custom_field("job_id"), Some(&FieldValue::I64(2)));
        assert_eq!(
            event.custom_field("serve_replica_id"),
            Some(&FieldValue::String("10".to_string()))
        );
        assert!(event.message.is_empty());
    }

    #[test]
    fn test_custom_fields_serialize_in_stable_order() {
        let event = ClusterEvent::new(Severity::Info, SourceType::Serve)
            .with_field("serve_replica_id", 3i64)
            .with_field("job_id", 1i64)
            .with_field("serve_app_name", "default");

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(
            r#""custom_fields":{"job_id":1,"serve_app_name":"default","serve_replica_id":3}"#
        ));
        assert_eq!(json, serde_json::to_string(&event.clone()).unwrap());
    }
}

// Re-export vigil_schema for convenience
pub use vigil_schema;
