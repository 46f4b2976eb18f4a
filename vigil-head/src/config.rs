//! Head Configuration
//!
//! Plain defaults, optionally loaded from a YAML file and overridden from the
//! environment.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable overriding `max_concurrent_calls`
pub const MAX_CONCURRENT_CALLS_ENV: &str = "VIGIL_MAX_CONCURRENT_CALLS";

/// Monitoring head configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadConfig {
    /// Maximum in-flight requests across all head operations
    pub max_concurrent_calls: usize,

    /// Directory served by the log operations
    pub log_dir: Option<PathBuf>,
}

impl Default for HeadConfig {
    fn default() -> Self {
        Self {
            max_concurrent_calls: 100,
            log_dir: None,
        }
    }
}

impl HeadConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: HeadConfig =
            serde_yaml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;

        let config = Self::from_yaml_str(&content)?;
        info!(
            path = %path.display(),
            max_concurrent_calls = config.max_concurrent_calls,
            "Loaded head configuration"
        );
        Ok(config)
    }

    /// Apply overrides from the process environment
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        let value = std::env::var(MAX_CONCURRENT_CALLS_ENV).ok();
        self.with_max_calls_override(value.as_deref())
    }

    fn with_max_calls_override(mut self, value: Option<&str>) -> Result<Self, ConfigError> {
        if let Some(raw) = value {
            self.max_concurrent_calls = raw.trim().parse().map_err(|_| {
                ConfigError::Validation(format!(
                    "{} must be a positive integer, got {:?}",
                    MAX_CONCURRENT_CALLS_ENV, raw
                ))
            })?;
            debug!(
                max_concurrent_calls = self.max_concurrent_calls,
                "Applied environment override"
            );
        }
        self.validate()?;
        Ok(self)
    }

    /// Check invariants
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_calls == 0 {
            return Err(ConfigError::Validation(
                "max_concurrent_calls must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {0:?}: {1}")]
    Io(PathBuf, std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),
}
