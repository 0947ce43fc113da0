//! Token budget allocation
//!
//! Partitions a model's context window into:
//! - System prompt
//! - Auxiliary context (world info, memories, current-turn context, auto-summary)
//! - Message history
//! - Safety margin reserved for the response and estimation slop
//!
//! Allocation never fails. When the fixed costs alone exceed the window the
//! history budget degrades to zero.

use super::models::AuxiliaryContext;
use super::token_estimator::TokenEstimator;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Token budget configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBudgetConfig {
    /// Share of the window reserved for the response
    #[serde(default = "default_safety_margin_ratio")]
    pub safety_margin_ratio: f64,
    /// Lower bound on the reserved response share
    #[serde(default = "default_min_safety_margin")]
    pub min_safety_margin: usize,
    /// Share of the window at which callers should warn
    #[serde(default = "default_warning_ratio")]
    pub warning_ratio: f64,
    /// Window used when the caller does not specify one
    #[serde(default = "default_max_context_tokens")]
    pub default_max_context_tokens: usize,
}

fn default_safety_margin_ratio() -> f64 {
    0.10
}

fn default_min_safety_margin() -> usize {
    500
}

fn default_warning_ratio() -> f64 {
    0.90
}

fn default_max_context_tokens() -> usize {
    8000
}

impl Default for TokenBudgetConfig {
    fn default() -> Self {
        Self {
            safety_margin_ratio: default_safety_margin_ratio(),
            min_safety_margin: default_min_safety_margin(),
            warning_ratio: default_warning_ratio(),
            default_max_context_tokens: default_max_context_tokens(),
        }
    }
}

impl TokenBudgetConfig {
    /// Validate that the budget configuration is consistent
    pub fn validate(&self) -> Result<(), BudgetError> {
        for (name, value) in [
            ("safety_margin_ratio", self.safety_margin_ratio),
            ("warning_ratio", self.warning_ratio),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(BudgetError::InvalidRatio { name, value });
            }
        }

        if self.default_max_context_tokens == 0 {
            return Err(BudgetError::ConfigurationInvalid(
                "default_max_context_tokens must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

/// Token budget errors
#[derive(Debug, Error)]
pub enum BudgetError {
    #[error("Ratio {name} must be within (0, 1], got {value}")]
    InvalidRatio { name: &'static str, value: f64 },

    #[error("Configuration invalid: {0}")]
    ConfigurationInvalid(String),
}

/// Budget for a single turn. Computed fresh per turn, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBudget {
    pub total_budget: usize,
    pub system_prompt_tokens: usize,
    pub context_tokens: usize,
    pub message_history_budget: usize,
    pub warning_threshold: usize,
    pub safety_margin: usize,
}

impl TokenBudget {
    /// Fixed costs alone leave no room for history
    pub fn is_exhausted(&self) -> bool {
        self.message_history_budget == 0
    }

    /// Sum of all allocated components
    pub fn allocated(&self) -> usize {
        self.system_prompt_tokens + self.context_tokens + self.message_history_budget + self.safety_margin
    }
}

/// Token budget manager
pub struct TokenBudgetManager {
    config: TokenBudgetConfig,
    estimator: Arc<dyn TokenEstimator>,
}

impl TokenBudgetManager {
    /// Create a new token budget manager
    pub fn new(config: TokenBudgetConfig, estimator: Arc<dyn TokenEstimator>) -> Result<Self, BudgetError> {
        config.validate()?;
        Ok(Self { config, estimator })
    }

    /// Reserved response share for a window of `max_context_tokens`
    pub fn safety_margin(&self, max_context_tokens: usize) -> usize {
        let proportional = (max_context_tokens as f64 * self.config.safety_margin_ratio).ceil() as usize;
        proportional.max(self.config.min_safety_margin)
    }

    /// Warning threshold for a window of `max_context_tokens`
    pub fn warning_threshold(&self, max_context_tokens: usize) -> usize {
        (max_context_tokens as f64 * self.config.warning_ratio).floor() as usize
    }

    /// Allocate the window across system prompt, auxiliary context and history
    pub fn allocate(
        &self,
        max_context_tokens: usize,
        system_prompt: &str,
        auxiliary: &AuxiliaryContext,
    ) -> TokenBudget {
        let system_prompt_tokens = self.estimator.estimate(system_prompt);
        let context_tokens = self.estimator.estimate(&auxiliary.concatenated());
        let safety_margin = self.safety_margin(max_context_tokens);

        let message_history_budget = max_context_tokens
            .saturating_sub(system_prompt_tokens)
            .saturating_sub(context_tokens)
            .saturating_sub(safety_margin);

        let budget = TokenBudget {
            total_budget: max_context_tokens,
            system_prompt_tokens,
            context_tokens,
            message_history_budget,
            warning_threshold: self.warning_threshold(max_context_tokens),
            safety_margin,
        };

        debug!(
            "Token budget: total={}, system={}, context={}, history={}, safety={}",
            budget.total_budget,
            budget.system_prompt_tokens,
            budget.context_tokens,
            budget.message_history_budget,
            budget.safety_margin
        );

        if budget.is_exhausted() {
            warn!(
                "Fixed prompt costs leave no history budget: system={}, context={}, safety={}, max={}",
                system_prompt_tokens, context_tokens, safety_margin, max_context_tokens
            );
        }

        budget
    }

    /// Get the configuration
    pub fn config(&self) -> &TokenBudgetConfig {
        &self.config
    }

    /// Get the estimator
    pub fn estimator(&self) -> &Arc<dyn TokenEstimator> {
        &self.estimator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::token_estimator::HeuristicEstimator;

    fn manager() -> TokenBudgetManager {
        TokenBudgetManager::new(TokenBudgetConfig::default(), Arc::new(HeuristicEstimator)).unwrap()
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = TokenBudgetConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_ratio_rejected() {
        let config = TokenBudgetConfig {
            safety_margin_ratio: 1.5,
            ..TokenBudgetConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(BudgetError::InvalidRatio { name: "safety_margin_ratio", .. })
        ));
    }

    #[test]
    fn test_safety_margin_floor() {
        let manager = manager();
        assert_eq!(manager.safety_margin(4000), 500);
        assert_eq!(manager.safety_margin(8000), 800);
        assert_eq!(manager.safety_margin(8001), 801);
    }

    #[test]
    fn test_reference_allocation() {
        let manager = manager();
        let system_prompt = "x".repeat(800); // 200 tokens
        let aux = AuxiliaryContext::new()
            .with_world_info("y".repeat(600))
            .with_memories("z".repeat(600)); // 300 tokens together

        let budget = manager.allocate(4000, &system_prompt, &aux);

        assert_eq!(budget.system_prompt_tokens, 200);
        assert_eq!(budget.context_tokens, 300);
        assert_eq!(budget.safety_margin, 500);
        assert_eq!(budget.message_history_budget, 3000);
        assert_eq!(budget.warning_threshold, 3600);
        assert_eq!(budget.allocated(), 4000);
    }

    #[test]
    fn test_context_estimated_as_one_block() {
        let manager = manager();
        // Each field alone rounds up to 1 token; concatenated they are 6 chars -> 2
        let aux = AuxiliaryContext::new()
            .with_world_info("aa")
            .with_memories("bb")
            .with_current_context("cc");
        let budget = manager.allocate(4000, "", &aux);
        assert_eq!(budget.context_tokens, 2);
    }

    #[test]
    fn test_exhausted_budget_floors_at_zero() {
        let manager = manager();
        let system_prompt = "x".repeat(20_000); // 5000 tokens
        let budget = manager.allocate(4000, &system_prompt, &AuxiliaryContext::default());
        assert_eq!(budget.message_history_budget, 0);
        assert!(budget.is_exhausted());
    }

    #[test]
    fn test_budget_conservation() {
        let manager = manager();
        for max in [0usize, 100, 500, 1000, 4000, 8000, 32_000, 128_000] {
            for prompt_len in [0usize, 10, 1000, 40_000] {
                let prompt = "p".repeat(prompt_len);
                let aux = AuxiliaryContext::new().with_memories("m".repeat(prompt_len / 2));
                let budget = manager.allocate(max, &prompt, &aux);
                let fixed = budget.system_prompt_tokens + budget.context_tokens + budget.safety_margin;
                if fixed <= max {
                    assert!(budget.allocated() <= budget.total_budget);
                } else {
                    assert_eq!(budget.message_history_budget, 0);
                }
            }
        }
    }
}
