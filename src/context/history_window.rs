//! Sliding-window history selection
//!
//! Walks the history from the most recent message backwards and keeps the
//! longest suffix whose content estimate fits the history budget. Recency is
//! strictly prioritized: older messages are dropped whole, never sampled, and a
//! message's content is never cut to make it fit.

use super::models::{ConversationMessage, Message};
use super::token_budget::TokenBudget;
use super::token_estimator::TokenEstimator;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Live-prompt slice of a conversation's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryWindow {
    pub included: Vec<ConversationMessage>,
    pub truncated: bool,
    pub dropped_count: usize,
    /// Content-only estimate of the included messages
    pub history_tokens: usize,
    /// Sequence number of the oldest included message
    pub oldest_included_sequence: Option<u64>,
}

impl HistoryWindow {
    fn empty() -> Self {
        Self {
            included: Vec::new(),
            truncated: false,
            dropped_count: 0,
            history_tokens: 0,
            oldest_included_sequence: None,
        }
    }
}

/// Selects the most recent messages that fit a history budget
pub struct HistoryWindowSelector<'a> {
    estimator: &'a dyn TokenEstimator,
}

impl<'a> HistoryWindowSelector<'a> {
    pub fn new(estimator: &'a dyn TokenEstimator) -> Self {
        Self { estimator }
    }

    /// Select from `history` (oldest first) within `budget.message_history_budget`
    /// minus `reserved_for_current_turn`.
    ///
    /// Streaming placeholders are never sent to the model and are skipped
    /// before selection.
    pub fn select(
        &self,
        history: &[Message],
        budget: &TokenBudget,
        reserved_for_current_turn: usize,
    ) -> HistoryWindow {
        let candidates: Vec<&Message> = history.iter().filter(|m| !m.is_placeholder).collect();
        if candidates.is_empty() {
            return HistoryWindow::empty();
        }

        let available = budget
            .message_history_budget
            .saturating_sub(reserved_for_current_turn);

        let mut used = 0usize;
        let mut start = candidates.len();

        for (idx, message) in candidates.iter().enumerate().rev() {
            let cost = self.estimator.estimate(&message.content);
            let is_most_recent = start == candidates.len();
            if used + cost > available && !is_most_recent {
                break;
            }
            used += cost;
            start = idx;
        }

        if used > available {
            warn!(
                "Most recent message alone exceeds history budget: {} > {}",
                used, available
            );
        }

        let included: Vec<ConversationMessage> = candidates[start..]
            .iter()
            .map(|m| m.to_conversation_message())
            .collect();
        let dropped_count = start;

        debug!(
            "History window: included={}, dropped={}, tokens={}, available={}",
            included.len(),
            dropped_count,
            used,
            available
        );

        HistoryWindow {
            included,
            truncated: dropped_count > 0,
            dropped_count,
            history_tokens: used,
            oldest_included_sequence: Some(candidates[start].sequence_number),
        }
    }
}
