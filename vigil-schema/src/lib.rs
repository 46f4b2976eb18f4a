//! Vigil Event Schema
//!
//! This module defines the classification enums and the dynamically typed field values
//! carried by cluster events. Everything here is plain data shared by the filter, the
//! service head, and the CLI.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// Classification
// ============================================================================

/// Severity levels for cluster events, from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
    Fatal,
}

impl Severity {
    /// All severities in ascending order
    pub const ALL: [Severity; 6] = [
        Severity::Trace,
        Severity::Debug,
        Severity::Info,
        Severity::Warning,
        Severity::Error,
        Severity::Fatal,
    ];

    /// Canonical upper-case name
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Severity::ALL
            .iter()
            .copied()
            .find(|sev| sev.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| SchemaError::UnknownSeverity(trimmed.to_string()))
    }
}

/// Component that emitted an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceType {
    Common,
    CoreWorker,
    Gcs,
    Raylet,
    ClusterLifecycle,
    Autoscaler,
    Jobs,
    Serve,
}

impl SourceType {
    pub const ALL: [SourceType; 8] = [
        SourceType::Common,
        SourceType::CoreWorker,
        SourceType::Gcs,
        SourceType::Raylet,
        SourceType::ClusterLifecycle,
        SourceType::Autoscaler,
        SourceType::Jobs,
        SourceType::Serve,
    ];

    /// Canonical SCREAMING_SNAKE_CASE name
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Common => "COMMON",
            SourceType::CoreWorker => "CORE_WORKER",
            SourceType::Gcs => "GCS",
            SourceType::Raylet => "RAYLET",
            SourceType::ClusterLifecycle => "CLUSTER_LIFECYCLE",
            SourceType::Autoscaler => "AUTOSCALER",
            SourceType::Jobs => "JOBS",
            SourceType::Serve => "SERVE",
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        SourceType::ALL
            .iter()
            .copied()
            .find(|src| src.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| SchemaError::UnknownSourceType(trimmed.to_string()))
    }
}

// ============================================================================
// Field Values
// ============================================================================

/// Dynamically typed scalar stored in an event's custom fields
///
/// Deserialized untagged, so a JSON `1` lands as `I64(1)` and `"1"` as `String`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    I64(i64),
    U64(u64),
    F64(f64),
    String(String),
}

impl FieldValue {
    /// String form used when matching against externally supplied ids.
    ///
    /// Integers render in decimal, so a stored `I64(1)` matches the query id `"1"`.
    /// Floats always keep a fractional digit (`1.0`), booleans are `True`/`False`
    /// and null is `None`, matching the ids the event producers emit.
    pub fn coerce_to_string(&self) -> String {
        self.to_string()
    }

    /// Get as i64 if possible
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::I64(v) => Some(*v),
            FieldValue::U64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Null => f.write_str("None"),
            FieldValue::Bool(true) => f.write_str("True"),
            FieldValue::Bool(false) => f.write_str("False"),
            FieldValue::I64(v) => write!(f, "{}", v),
            FieldValue::U64(v) => write!(f, "{}", v),
            FieldValue::F64(v) if v.is_finite() && v.fract() == 0.0 => write!(f, "{:.1}", v),
            FieldValue::F64(v) => write!(f, "{}", v),
            FieldValue::String(s) => f.write_str(s),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::I64(v)
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        FieldValue::U64(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::F64(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::String(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::String(v)
    }
}

/// Schema errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Unknown severity level: {0}")]
    UnknownSeverity(String),

    #[error("Unknown source type: {0}")]
    UnknownSourceType(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_display() {
        assert_eq!(Severity::Error.to_string(), "ERROR");
        assert_eq!(Severity::Warning.to_string(), "WARNING");
        assert_eq!(Severity::Debug.to_string(), "DEBUG");
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Fatal > Severity::Error);
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
        assert!(Severity::Info > Severity::Debug);
        assert!(Severity::Debug > Severity::Trace);
    }

    #[test]
    fn test_severity_parse_is_case_insensitive() {
        assert_eq!("error".parse::<Severity>().unwrap(), Severity::Error);
        assert_eq!(" Warning ".parse::<Severity>().unwrap(), Severity::Warning);
        assert_eq!(
            "LOUD".parse::<Severity>(),
            Err(SchemaError::UnknownSeverity("LOUD".to_string()))
        );
    }

    #[test]
    fn test_source_type_parse() {
        assert_eq!("GCS".parse::<SourceType>().unwrap(), SourceType::Gcs);
        assert_eq!("core_worker".parse::<SourceType>().unwrap(), SourceType::CoreWorker);
        assert!("KERNEL".parse::<SourceType>().is_err());
    }

    #[test]
    fn test_source_type_serde_names() {
        let json = serde_json::to_string(&SourceType::ClusterLifecycle).unwrap();
        assert_eq!(json, "\"CLUSTER_LIFECYCLE\"");

        let parsed: SourceType = serde_json::from_str("\"CORE_WORKER\"").unwrap();
        assert_eq!(parsed, SourceType::CoreWorker);
    }

    #[test]
    fn test_field_value_untagged_json() {
        let v: FieldValue = serde_json::from_str("1").unwrap();
        assert_eq!(v, FieldValue::I64(1));

        let v: FieldValue = serde_json::from_str("\"1\"").unwrap();
        assert_eq!(v, FieldValue::String("1".to_string()));

        let v: FieldValue = serde_json::from_str("null").unwrap();
        assert!(v.is_null());

        let v: FieldValue = serde_json::from_str("2.5").unwrap();
        assert_eq!(v, FieldValue::F64(2.5));
    }

    #[test]
    fn test_field_value_string_coercion() {
        assert_eq!(FieldValue::I64(42).coerce_to_string(), "42");
        assert_eq!(FieldValue::U64(7).coerce_to_string(), "7");
        assert_eq!(FieldValue::from("abc").coerce_to_string(), "abc");
        assert_eq!(FieldValue::Bool(true).coerce_to_string(), "True");
        assert_eq!(FieldValue::Bool(false).coerce_to_string(), "False");
        assert_eq!(FieldValue::F64(1.0).coerce_to_string(), "1.0");
        assert_eq!(FieldValue::F64(2.5).coerce_to_string(), "2.5");
        assert_eq!(FieldValue::Null.coerce_to_string(), "None");
    }
}
