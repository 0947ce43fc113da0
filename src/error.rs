//! Crate-wide error type

use crate::context::token_budget::BudgetError;
use thiserror::Error;

/// Errors surfaced by the context manager
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("History read failed for conversation {conversation_id}: {reason}")]
    HistoryRead {
        conversation_id: String,
        reason: String,
    },

    #[error("History read for conversation {conversation_id} timed out after {timeout_ms}ms")]
    HistoryReadTimeout {
        conversation_id: String,
        timeout_ms: u64,
    },

    #[error("Summary store error: {0}")]
    SummaryStore(String),

    #[error(transparent)]
    Budget(#[from] BudgetError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<::config::ConfigError> for ContextError {
    fn from(err: ::config::ConfigError) -> Self {
        ContextError::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ContextError>;
