//! Configuration loading
//!
//! Values come from (lowest to highest precedence): built-in defaults, an
//! optional TOML file, and `CHAT_CONTEXT__<SECTION>__<KEY>` environment
//! variables. A `.env` file is loaded first if present.

use crate::error::{ContextError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use crate::context::summary_trigger::SummaryConfig;
pub use crate::context::token_budget::TokenBudgetConfig;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "CHAT_CONTEXT";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub token_budget: TokenBudgetConfig,
    #[serde(default)]
    pub summary: SummaryConfig,
    #[serde(default)]
    pub estimator: EstimatorConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from an optional file plus the environment
    pub fn load(path: Option<&str>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::with_name(path).required(false));
        }
        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        );

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config = ::config::Config::builder()
            .add_source(::config::File::from_str(contents, ::config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field consistency
    pub fn validate(&self) -> Result<()> {
        self.token_budget.validate()?;

        if self.summary.interval == 0 {
            return Err(ContextError::Configuration(
                "summary.interval must be at least 1".to_string(),
            ));
        }
        if self.summary.size_ceiling_tokens == 0 {
            return Err(ContextError::Configuration(
                "summary.size_ceiling_tokens must be positive".to_string(),
            ));
        }
        if self.store.history_read_timeout_ms == 0 || self.store.checkpoint_read_timeout_ms == 0 {
            return Err(ContextError::Configuration(
                "store read timeouts must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

/// Which token estimator to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimatorKind {
    #[default]
    Heuristic,
    WordBased,
    Tiktoken,
}

/// Estimator configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EstimatorConfig {
    #[serde(default)]
    pub kind: EstimatorKind,
}

/// Read timeouts for the external stores
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_history_read_timeout_ms")]
    pub history_read_timeout_ms: u64,
    #[serde(default = "default_checkpoint_read_timeout_ms")]
    pub checkpoint_read_timeout_ms: u64,
}

fn default_history_read_timeout_ms() -> u64 {
    5000
}

fn default_checkpoint_read_timeout_ms() -> u64 {
    1000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            history_read_timeout_ms: default_history_read_timeout_ms(),
            checkpoint_read_timeout_ms: default_checkpoint_read_timeout_ms(),
        }
    }
}

impl StoreConfig {
    pub fn history_read_timeout(&self) -> Duration {
        Duration::from_millis(self.history_read_timeout_ms)
    }

    pub fn checkpoint_read_timeout(&self) -> Duration {
        Duration::from_millis(self.checkpoint_read_timeout_ms)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.summary.interval, 15);
        assert_eq!(config.summary.size_ceiling_tokens, 12_000);
        assert_eq!(config.token_budget.min_safety_margin, 500);
        assert_eq!(config.estimator.kind, EstimatorKind::Heuristic);
        assert_eq!(config.store.history_read_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_from_toml_partial_sections() {
        let config = Config::from_toml_str(
            r#"
            [summary]
            interval = 10

            [estimator]
            kind = "word_based"

            [logging]
            level = "debug"
            json = true
            "#,
        )
        .unwrap();

        assert_eq!(config.summary.interval, 10);
        assert_eq!(config.summary.size_ceiling_tokens, 12_000);
        assert_eq!(config.estimator.kind, EstimatorKind::WordBased);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
        assert_eq!(config.token_budget.warning_ratio, 0.90);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let result = Config::from_toml_str("[summary]\ninterval = 0\n");
        assert!(matches!(result, Err(ContextError::Configuration(_))));
    }

    #[test]
    fn test_bad_ratio_rejected() {
        let result = Config::from_toml_str("[token_budget]\nwarning_ratio = 0.0\n");
        assert!(matches!(result, Err(ContextError::Budget(_))));
    }
}
