//! Pipeline configuration.
//!
//! Two tunables drive the decorator chain (`retry.max_retries`, `retry.enabled`) and one
//! drives the consumer boundary (`consumer.timeout_ms`). Values come from defaults, then an
//! optional TOML document, then environment overrides:
//!
//! | key                     | env var                      | default |
//! |-------------------------|------------------------------|---------|
//! | `retry.max_retries`     | `OUTAGE_RETRY_MAX_RETRIES`   | `3`     |
//! | `retry.enabled`         | `OUTAGE_RETRY_ENABLED`       | `true`  |
//! | `consumer.timeout_ms`   | `OUTAGE_CONSUMER_TIMEOUT_MS` | none    |
//!
//! Invalid values fail fast with [`ConfigError`]; nothing is silently defaulted.
//!
//! ```rust
//! use outage_router::config::PipelineConfig;
//!
//! let cfg = PipelineConfig::from_toml_str("[retry]\nmax_retries = 5\n").unwrap();
//! assert_eq!(cfg.retry.max_retries, 5);
//! assert!(cfg.retry.enabled);
//! assert!(PipelineConfig::from_toml_str("[retry]\nmax_retries = 0\n").is_err());
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;
use crate::retry::DEFAULT_MAX_RETRIES;

pub const ENV_MAX_RETRIES: &str = "OUTAGE_RETRY_MAX_RETRIES";
pub const ENV_RETRY_ENABLED: &str = "OUTAGE_RETRY_ENABLED";
pub const ENV_CONSUMER_TIMEOUT_MS: &str = "OUTAGE_CONSUMER_TIMEOUT_MS";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub retry: RetryConfig,
    pub consumer: ConsumerConfig,
}

/// Retry decorator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    /// Total attempts per event, including the first.
    pub max_retries: u32,
    /// When false the retry decorator is left out of the chain.
    pub enabled: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_retries: DEFAULT_MAX_RETRIES, enabled: true }
    }
}

/// Consumer boundary settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConsumerConfig {
    /// Per-event deadline in milliseconds; `None` waits indefinitely.
    pub timeout_ms: Option<u64>,
}

impl ConsumerConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

impl PipelineConfig {
    /// Parse and validate a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let cfg: PipelineConfig =
            toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup` (usually the environment) and re-validate.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_MAX_RETRIES) {
            self.retry.max_retries = parse_var(ENV_MAX_RETRIES, &raw)?;
        }
        if let Some(raw) = lookup(ENV_RETRY_ENABLED) {
            self.retry.enabled = parse_bool(ENV_RETRY_ENABLED, &raw)?;
        }
        if let Some(raw) = lookup(ENV_CONSUMER_TIMEOUT_MS) {
            self.consumer.timeout_ms = Some(parse_var(ENV_CONSUMER_TIMEOUT_MS, &raw)?);
        }
        self.validate()?;
        debug!(target: "outage_router::config", config = ?self, "configuration resolved");
        Ok(self)
    }

    /// The retry budget only matters while retry is enabled.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.enabled && self.retry.max_retries == 0 {
            return Err(ConfigError::InvalidMaxRetries(self.retry.max_retries));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e| ConfigError::Parse(format!("{key}={raw:?}: {e}")))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Parse(format!("{key}={raw:?}: expected a boolean"))),
    }
}
