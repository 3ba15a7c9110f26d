//! Federation configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Optimizer settings shared by all queries of a federation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FederationConfig {
    /// Size of the shared probe pool
    pub probe_worker_threads: usize,
    /// Per-query time budget in seconds, 0 disables the deadline
    pub enforce_max_query_time: u64,
    /// Maximum number of cached probe outcomes
    pub source_selection_cache_capacity: usize,
    /// Log optimized plans at debug level
    pub log_query_plan: bool,
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            probe_worker_threads: 20,
            enforce_max_query_time: 30,
            source_selection_cache_capacity: 1000,
            log_query_plan: false,
        }
    }
}

impl FederationConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        let config: FederationConfig =
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::Parse(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.probe_worker_threads == 0 {
            return Err(ConfigError::Invalid(
                "probe_worker_threads must be at least 1".to_string(),
            ));
        }
        if self.source_selection_cache_capacity == 0 {
            return Err(ConfigError::Invalid(
                "source_selection_cache_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Budget for a new query, `None` when unbounded
    pub fn max_query_time(&self) -> Option<Duration> {
        match self.enforce_max_query_time {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn with_probe_worker_threads(mut self, threads: usize) -> Self {
        self.probe_worker_threads = threads;
        self
    }

    pub fn with_enforce_max_query_time(mut self, secs: u64) -> Self {
        self.enforce_max_query_time = secs;
        self
    }

    pub fn with_source_selection_cache_capacity(mut self, capacity: usize) -> Self {
        self.source_selection_cache_capacity = capacity;
        self
    }

    pub fn with_log_query_plan(mut self, enabled: bool) -> Self {
        self.log_query_plan = enabled;
        self
    }
}
