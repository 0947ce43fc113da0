//! Conversation context manager
//!
//! Wires the history reader and checkpoint store to the pure components:
//! - History reads are timeout-bound and fail hard. An empty history is never
//!   substituted for a failed read.
//! - Checkpoint reads are timeout-bound and fail open to "no summary yet".
//! - `needs_summarization` is the OR of the size ceiling and the interval
//!   trigger.

use super::assembler::ConversationAssembler;
use super::models::{AuxiliaryContext, ConversationResult, Message, SummaryCheckpoint, SummaryTriggerInfo};
use super::store::{MessageHistoryReader, SummaryCheckpointStore};
use super::summary_trigger::{SummaryReason, SummaryTriggerEvaluator};
use super::token_budget::TokenBudgetManager;
use super::token_estimator::{HeuristicEstimator, TokenEstimator, WordBasedEstimator};
use crate::config::{Config, EstimatorKind};
use crate::error::{ContextError, Result};
use crate::metrics::METRICS;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Per-conversation context assembly and summarization bookkeeping
pub struct ConversationContextManager {
    history: Arc<dyn MessageHistoryReader>,
    checkpoints: Arc<dyn SummaryCheckpointStore>,
    assembler: ConversationAssembler,
    config: Config,
}

impl ConversationContextManager {
    /// Create a manager with the estimator named in `config`
    pub fn new(
        history: Arc<dyn MessageHistoryReader>,
        checkpoints: Arc<dyn SummaryCheckpointStore>,
        config: Config,
    ) -> Result<Self> {
        let estimator = build_estimator(config.estimator.kind)?;
        Self::with_estimator(history, checkpoints, estimator, config)
    }

    /// Create a manager with a caller-supplied estimator
    pub fn with_estimator(
        history: Arc<dyn MessageHistoryReader>,
        checkpoints: Arc<dyn SummaryCheckpointStore>,
        estimator: Arc<dyn TokenEstimator>,
        config: Config,
    ) -> Result<Self> {
        config.validate()?;
        let budget_manager = TokenBudgetManager::new(config.token_budget.clone(), estimator)?;
        let evaluator = SummaryTriggerEvaluator::new(config.summary.clone());

        Ok(Self {
            history,
            checkpoints,
            assembler: ConversationAssembler::new(budget_manager, evaluator),
            config,
        })
    }

    /// Assemble the prompt for a new user turn
    pub async fn assemble(
        &self,
        conversation_id: &str,
        system_prompt: &str,
        auxiliary: &AuxiliaryContext,
        new_user_message: &str,
        max_context_tokens: usize,
    ) -> Result<ConversationResult> {
        let history = self.fetch_history(conversation_id).await?;

        let mut result = self.assembler.assemble(
            system_prompt,
            auxiliary,
            &history,
            new_user_message,
            max_context_tokens,
        );

        if result.needs_summarization {
            METRICS.record_summary_due(SummaryReason::Size.as_str());
        }

        let checkpoint = self.read_checkpoint(conversation_id).await;
        let trigger = self.assembler.evaluator().evaluate(&history, &checkpoint);
        if trigger.should_trigger_summary {
            METRICS.record_summary_due(SummaryReason::Interval.as_str());
            result.needs_summarization = true;
        }

        METRICS.record_turn(
            result.total_tokens,
            result.token_breakdown.remaining,
            result.total_tokens > max_context_tokens,
            result.dropped_messages,
        );

        info!(
            "Assembled conversation {}: {} messages, {} tokens, {} dropped, summarize={}",
            conversation_id,
            result.messages.len(),
            result.total_tokens,
            result.dropped_messages,
            result.needs_summarization
        );

        Ok(result)
    }

    /// Assemble using the configured default context window
    pub async fn assemble_default(
        &self,
        conversation_id: &str,
        system_prompt: &str,
        auxiliary: &AuxiliaryContext,
        new_user_message: &str,
    ) -> Result<ConversationResult> {
        let max_context_tokens = self.config.token_budget.default_max_context_tokens;
        self.assemble(conversation_id, system_prompt, auxiliary, new_user_message, max_context_tokens)
            .await
    }

    /// Evaluate the interval trigger over the conversation's full history
    pub async fn evaluate_summary_trigger(&self, conversation_id: &str) -> Result<SummaryTriggerInfo> {
        let history = self.fetch_history(conversation_id).await?;
        let checkpoint = self.read_checkpoint(conversation_id).await;
        Ok(self.assembler.evaluator().evaluate(&history, &checkpoint))
    }

    async fn fetch_history(&self, conversation_id: &str) -> Result<Vec<Message>> {
        let limit = self.config.store.history_read_timeout();

        let mut history = match timeout(limit, self.history.fetch(conversation_id)).await {
            Ok(Ok(history)) => history,
            Ok(Err(e)) => {
                METRICS.record_history_read_failure();
                return Err(match e {
                    ContextError::HistoryRead { .. } | ContextError::HistoryReadTimeout { .. } => e,
                    other => ContextError::HistoryRead {
                        conversation_id: conversation_id.to_string(),
                        reason: other.to_string(),
                    },
                });
            }
            Err(_) => {
                METRICS.record_history_read_failure();
                return Err(ContextError::HistoryReadTimeout {
                    conversation_id: conversation_id.to_string(),
                    timeout_ms: self.config.store.history_read_timeout_ms,
                });
            }
        };

        if !is_sequence_ordered(&history) {
            warn!("History for {} arrived out of sequence order; re-sorting", conversation_id);
            history.sort_by_key(|m| m.sequence_number);
        }

        debug!("Fetched {} messages for {}", history.len(), conversation_id);
        Ok(history)
    }

    async fn read_checkpoint(&self, conversation_id: &str) -> SummaryCheckpoint {
        let limit = self.config.store.checkpoint_read_timeout();

        match timeout(limit, self.checkpoints.read(conversation_id)).await {
            Ok(Ok(checkpoint)) => checkpoint,
            Ok(Err(e)) => {
                warn!(
                    "Checkpoint read failed for {}, assuming no summaries: {}",
                    conversation_id, e
                );
                METRICS.record_checkpoint_fallback();
                SummaryCheckpoint::none()
            }
            Err(_) => {
                warn!(
                    "Checkpoint read for {} timed out after {}ms, assuming no summaries",
                    conversation_id, self.config.store.checkpoint_read_timeout_ms
                );
                METRICS.record_checkpoint_fallback();
                SummaryCheckpoint::none()
            }
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

fn is_sequence_ordered(history: &[Message]) -> bool {
    history
        .windows(2)
        .all(|pair| pair[0].sequence_number <= pair[1].sequence_number)
}

/// Build the estimator named by `kind`
pub fn build_estimator(kind: EstimatorKind) -> Result<Arc<dyn TokenEstimator>> {
    match kind {
        EstimatorKind::Heuristic => Ok(Arc::new(HeuristicEstimator::new())),
        EstimatorKind::WordBased => Ok(Arc::new(WordBasedEstimator::default())),
        #[cfg(feature = "tiktoken")]
        EstimatorKind::Tiktoken => Ok(Arc::new(super::token_estimator::TiktokenEstimator::new()?)),
        #[cfg(not(feature = "tiktoken"))]
        EstimatorKind::Tiktoken => Err(ContextError::Configuration(
            "tiktoken estimator requires the `tiktoken` feature".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::models::MessageRole;
    use crate::context::store::InMemoryConversationStore;

    fn manager(store: Arc<InMemoryConversationStore>) -> ConversationContextManager {
        ConversationContextManager::new(store.clone(), store, Config::default()).unwrap()
    }

    #[tokio::test]
    async fn test_assemble_from_store() {
        let store = Arc::new(InMemoryConversationStore::new());
        store.append("c1", MessageRole::User, "hello");
        store.append("c1", MessageRole::Assistant, "hi there");

        let result = manager(store)
            .assemble("c1", "You are helpful.", &AuxiliaryContext::default(), "how are you?", 4000)
            .await
            .unwrap();

        assert_eq!(result.messages.len(), 4);
        assert!(!result.truncated);
        assert!(!result.needs_summarization);
    }

    #[tokio::test]
    async fn test_interval_trigger_sets_needs_summarization() {
        let store = Arc::new(InMemoryConversationStore::new());
        for turn in 0..15 {
            store.append("c1", MessageRole::User, format!("q{turn}"));
            store.append("c1", MessageRole::Assistant, format!("a{turn}"));
        }

        let result = manager(store)
            .assemble("c1", "sys", &AuxiliaryContext::default(), "next", 4000)
            .await
            .unwrap();

        assert!(result.needs_summarization);
        assert!(!result.truncated);
    }

    #[tokio::test]
    async fn test_evaluate_respects_checkpoint() {
        let store = Arc::new(InMemoryConversationStore::new());
        for turn in 0..15 {
            store.append("c1", MessageRole::User, format!("q{turn}"));
            store.append("c1", MessageRole::Assistant, format!("a{turn}"));
        }
        let manager = manager(store.clone());

        let before = manager.evaluate_summary_trigger("c1").await.unwrap();
        assert!(before.should_trigger_summary);

        let end = before.summary_end_message().unwrap();
        store.write("c1", end).await.unwrap();

        let after = manager.evaluate_summary_trigger("c1").await.unwrap();
        assert!(!after.should_trigger_summary);
        assert_eq!(after.current_ai_count, 0);
        assert_eq!(after.next_summary_at, end + 15);
    }

    #[test]
    fn test_build_estimator() {
        assert!(build_estimator(EstimatorKind::Heuristic).is_ok());
        assert!(build_estimator(EstimatorKind::WordBased).is_ok());
    }

    #[cfg(not(feature = "tiktoken"))]
    #[test]
    fn test_tiktoken_requires_feature() {
        assert!(matches!(
            build_estimator(EstimatorKind::Tiktoken),
            Err(ContextError::Configuration(_))
        ));
    }
}
