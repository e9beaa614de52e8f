// src/config.rs

//! Configuration for the aggregation core.
//!
//! Covers the knobs the core needs at construction time: shard-space
//! sizing, dispatch timeouts and retry policy, and orchestrator batching.
//! Values load from a TOML file, can be overridden through `RANAG_*`
//! environment variables, and are validated before use.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RanagError, Result};

/// Top-level core configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub shard_space: ShardSpaceConfig,
    pub dispatch: DispatchConfig,
    pub orchestrator: OrchestratorConfig,
}

/// Shard space sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShardSpaceConfig {
    /// Number of shards in the partition space. Ranges are validated
    /// against `[0, shards)`.
    pub shards: u32,
}

impl Default for ShardSpaceConfig {
    fn default() -> Self {
        Self { shards: 16_384 }
    }
}

/// Dispatch client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Connection timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Per-request timeout in milliseconds.
    pub request_timeout_ms: u64,
    /// Maximum number of retries for transport failures.
    pub max_retries: u32,
    /// Initial delay (milliseconds) between retries.
    pub retry_delay_ms: u64,
    /// Maximum delay (milliseconds) between retries.
    pub max_retry_delay_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5_000,
            request_timeout_ms: 30_000,
            max_retries: 3,
            retry_delay_ms: 100,
            max_retry_delay_ms: 5_000,
        }
    }
}

/// Job orchestrator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Interval (milliseconds) between pending-job polls.
    pub poll_interval_ms: u64,
    /// Maximum number of concurrent worker dispatches per job.
    pub max_fanout: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5_000,
            max_fanout: 8,
        }
    }
}

impl CoreConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            RanagError::config_with_source(
                format!("failed to read config file '{}'", path.display()),
                e,
            )
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)
            .map_err(|e| RanagError::config_with_source("failed to parse config", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides, then re-validate. Malformed
    /// or out-of-range values are errors, not silently ignored.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(val) = env_parse("RANAG_SHARDS")? {
            self.shard_space.shards = val;
        }
        if let Some(val) = env_parse("RANAG_DISPATCH_CONNECT_TIMEOUT_MS")? {
            self.dispatch.connect_timeout_ms = val;
        }
        if let Some(val) = env_parse("RANAG_DISPATCH_REQUEST_TIMEOUT_MS")? {
            self.dispatch.request_timeout_ms = val;
        }
        if let Some(val) = env_parse("RANAG_DISPATCH_MAX_RETRIES")? {
            self.dispatch.max_retries = val;
        }
        if let Some(val) = env_parse("RANAG_POLL_INTERVAL_MS")? {
            self.orchestrator.poll_interval_ms = val;
        }
        if let Some(val) = env_parse("RANAG_MAX_FANOUT")? {
            self.orchestrator.max_fanout = val;
        }
        self.validate()?;
        Ok(self)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.shard_space.shards == 0 {
            return Err(RanagError::config("shard_space.shards must be positive"));
        }
        if self.dispatch.request_timeout_ms == 0 {
            return Err(RanagError::config(
                "dispatch.request_timeout_ms must be positive",
            ));
        }
        if self.orchestrator.max_fanout == 0 {
            return Err(RanagError::config("orchestrator.max_fanout must be positive"));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw.parse().map(Some).map_err(|_| {
            RanagError::config(format!("invalid value '{raw}' for {name}"))
        }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CoreConfig::default();
        assert_eq!(config.shard_space.shards, 16_384);
        assert_eq!(config.dispatch.max_retries, 3);
        assert_eq!(config.orchestrator.max_fanout, 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml() {
        let config = CoreConfig::from_toml_str(
            r#"
            [shard_space]
            shards = 2000

            [dispatch]
            request_timeout_ms = 1000

            [orchestrator]
            max_fanout = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.shard_space.shards, 2000);
        assert_eq!(config.dispatch.request_timeout_ms, 1000);
        assert_eq!(config.orchestrator.max_fanout, 4);
        // Unspecified fields keep defaults
        assert_eq!(config.dispatch.connect_timeout_ms, 5_000);
    }

    #[test]
    fn test_rejects_zero_shards() {
        let result = CoreConfig::from_toml_str("[shard_space]\nshards = 0\n");
        assert!(matches!(result, Err(RanagError::Config { .. })));
    }

    #[test]
    fn test_env_override() {
        std::env::set_var("RANAG_SHARDS", "4096");
        let config = CoreConfig::default().with_env_overrides();
        std::env::remove_var("RANAG_SHARDS");
        assert_eq!(config.unwrap().shard_space.shards, 4096);
    }

    #[test]
    fn test_env_override_revalidates() {
        std::env::set_var("RANAG_MAX_FANOUT", "0");
        let result = CoreConfig::default().with_env_overrides();
        std::env::remove_var("RANAG_MAX_FANOUT");
        assert!(matches!(result, Err(RanagError::Config { .. })));
    }

    #[test]
    fn test_env_override_rejects_malformed_value() {
        std::env::set_var("RANAG_DISPATCH_MAX_RETRIES", "lots");
        let result = CoreConfig::default().with_env_overrides();
        std::env::remove_var("RANAG_DISPATCH_MAX_RETRIES");
        match result {
            Err(RanagError::Config { message, .. }) => {
                assert!(message.contains("RANAG_DISPATCH_MAX_RETRIES"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
