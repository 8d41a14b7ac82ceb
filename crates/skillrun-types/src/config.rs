//! Engine configuration: polling cadence, timeouts, and retry policy.
//!
//! `EngineConfig` is loaded from `config.toml` in the data directory.
//! All fields have sensible defaults so an empty file is valid.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Top-level configuration for the Skillrun engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Interval between completion polls against the store, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Per-unit execution timeout in seconds.
    #[serde(default = "default_unit_timeout_secs")]
    pub unit_timeout_secs: u64,

    /// Per-skill (whole execution) timeout in seconds.
    #[serde(default = "default_skill_timeout_secs")]
    pub skill_timeout_secs: u64,

    /// Maximum jobs the queue worker runs concurrently.
    #[serde(default = "default_queue_concurrency")]
    pub queue_concurrency: u32,

    /// Retry policy applied to failing units.
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

fn default_unit_timeout_secs() -> u64 {
    300
}

fn default_skill_timeout_secs() -> u64 {
    1_800
}

fn default_queue_concurrency() -> u32 {
    4
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            unit_timeout_secs: default_unit_timeout_secs(),
            skill_timeout_secs: default_skill_timeout_secs(),
            queue_concurrency: default_queue_concurrency(),
            retry: RetryPolicy::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// Retry policy for failed unit executions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay before the first retry, in milliseconds.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    /// Multiplier applied per retry.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Upper bound on any single delay, in milliseconds.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Error codes eligible for retry. Empty means any failure is retried.
    #[serde(default)]
    pub retryable_error_codes: Vec<String>,
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    1_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_backoff_ms() -> u64 {
    60_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_ms: default_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_backoff_ms: default_max_backoff_ms(),
            retryable_error_codes: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.poll_interval_ms, 2_000);
        assert_eq!(config.unit_timeout_secs, 300);
        assert_eq!(config.skill_timeout_secs, 1_800);
        assert_eq!(config.queue_concurrency, 4);
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn test_engine_config_empty_toml() {
        let config: EngineConfig = toml::from_str("").unwrap();
        assert_eq!(config.poll_interval_ms, 2_000);
        assert!(config.retry.retryable_error_codes.is_empty());
    }

    #[test]
    fn test_engine_config_partial_toml() {
        let toml_str = r#"
poll_interval_ms = 500

[retry]
max_retries = 5
retryable_error_codes = ["WORKFLOW_TIMEOUT"]
"#;
        let config: EngineConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.unit_timeout_secs, 300); // default kept
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.backoff_ms, 1_000); // default kept
        assert_eq!(
            config.retry.retryable_error_codes,
            vec!["WORKFLOW_TIMEOUT".to_string()]
        );
    }
}
