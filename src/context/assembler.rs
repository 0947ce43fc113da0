//! Conversation assembly
//!
//! Composes the final prompt for one turn: system message (system prompt plus
//! auxiliary context), the live history window, and the new user message.

use super::history_window::HistoryWindowSelector;
use super::models::{AuxiliaryContext, ConversationMessage, ConversationResult, Message, TokenBreakdown};
use super::summary_trigger::SummaryTriggerEvaluator;
use super::token_budget::TokenBudgetManager;
use super::token_estimator::MESSAGE_OVERHEAD_TOKENS;
use tracing::{debug, warn};

/// Builds one turn's prompt from budget, history and the new user message
pub struct ConversationAssembler {
    budget_manager: TokenBudgetManager,
    evaluator: SummaryTriggerEvaluator,
}

impl ConversationAssembler {
    pub fn new(budget_manager: TokenBudgetManager, evaluator: SummaryTriggerEvaluator) -> Self {
        Self {
            budget_manager,
            evaluator,
        }
    }

    /// Assemble the prompt for a turn. `history` must be ordered oldest first.
    ///
    /// `needs_summarization` reflects the size ceiling only; the interval
    /// trigger needs a checkpoint and is combined in by the manager. The
    /// ceiling is checked against the untruncated conversation with the full
    /// system message, so auxiliary context counts toward it.
    pub fn assemble(
        &self,
        system_prompt: &str,
        auxiliary: &AuxiliaryContext,
        history: &[Message],
        new_user_message: &str,
        max_context_tokens: usize,
    ) -> ConversationResult {
        let estimator = self.budget_manager.estimator().as_ref();
        let budget = self
            .budget_manager
            .allocate(max_context_tokens, system_prompt, auxiliary);

        let system_message = ConversationMessage::system(compose_system_content(system_prompt, auxiliary));
        let current_tokens = estimator.estimate(new_user_message);

        let window = HistoryWindowSelector::new(estimator).select(history, &budget, current_tokens);

        // allocator figures; section separators are not counted
        let system = budget.system_prompt_tokens + budget.context_tokens + MESSAGE_OVERHEAD_TOKENS;
        let history_tokens = window.history_tokens + window.included.len() * MESSAGE_OVERHEAD_TOKENS;
        let current_message = current_tokens + MESSAGE_OVERHEAD_TOKENS;
        let total_tokens = system + history_tokens + current_message;

        let original_total = system
            + history
                .iter()
                .filter(|m| !m.is_placeholder)
                .map(|m| estimator.estimate_message(&m.content))
                .sum::<usize>()
            + current_message;
        let needs_summarization = self.evaluator.exceeds_size_ceiling(original_total);

        if total_tokens > max_context_tokens {
            warn!(
                "Assembled prompt exceeds context window: {} > {}",
                total_tokens, max_context_tokens
            );
        }

        let mut messages = Vec::with_capacity(window.included.len() + 2);
        messages.push(system_message);
        messages.extend(window.included);
        messages.push(ConversationMessage::user(new_user_message));

        debug!(
            "Assembled turn: messages={}, total={}, dropped={}, original_total={}, needs_summarization={}",
            messages.len(),
            total_tokens,
            window.dropped_count,
            original_total,
            needs_summarization
        );

        ConversationResult {
            messages,
            truncated: window.truncated,
            total_tokens,
            dropped_messages: window.dropped_count,
            needs_summarization,
            token_breakdown: TokenBreakdown {
                system,
                history: history_tokens,
                current_message,
                remaining: max_context_tokens.saturating_sub(total_tokens),
            },
            context_warning: total_tokens >= budget.warning_threshold,
        }
    }

    pub fn budget_manager(&self) -> &TokenBudgetManager {
        &self.budget_manager
    }

    pub fn evaluator(&self) -> &SummaryTriggerEvaluator {
        &self.evaluator
    }
}

/// System prompt followed by the non-empty auxiliary sections
fn compose_system_content(system_prompt: &str, auxiliary: &AuxiliaryContext) -> String {
    std::iter::once(system_prompt)
        .filter(|s| !s.trim().is_empty())
        .chain(auxiliary.sections())
        .collect::<Vec<_>>()
        .join("\n\n")
}
