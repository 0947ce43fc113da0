//! Conversation context management with token budget enforcement
//!
//! Decides, per chat turn, how much history the model sees and when the
//! conversation's accumulated history is due for summarization.

pub mod assembler;
pub mod history_window;
pub mod manager;
pub mod models;
pub mod store;
pub mod summary_trigger;
pub mod token_budget;
pub mod token_estimator;

pub use assembler::ConversationAssembler;
pub use history_window::{HistoryWindow, HistoryWindowSelector};
pub use manager::{build_estimator, ConversationContextManager};
pub use models::{
    AuxiliaryContext, ConversationMessage, ConversationResult, ConversationRole, Message, MessageRole,
    SummaryCheckpoint, SummaryTriggerInfo, TokenBreakdown,
};
pub use store::{InMemoryConversationStore, MessageHistoryReader, SummaryCheckpointStore};
pub use summary_trigger::{SummaryConfig, SummaryReason, SummaryTriggerEvaluator, SUMMARY_INTERVAL};
pub use token_budget::{BudgetError, TokenBudget, TokenBudgetConfig, TokenBudgetManager};
pub use token_estimator::{estimate_tokens, HeuristicEstimator, TokenEstimator, WordBasedEstimator};
#[cfg(feature = "tiktoken")]
pub use token_estimator::TiktokenEstimator;
