//! Auto-summarization triggers
//!
//! Two independent conditions decide whether a conversation is due for
//! summarization:
//! - Interval: enough completed assistant turns have accumulated since the last
//!   summary checkpoint. Evaluated over the full history, never the truncated
//!   live-prompt window.
//! - Size: the whole untruncated conversation would exceed a fixed token
//!   ceiling.
//!
//! Both are pure functions of their inputs. Reading the checkpoint is the
//! caller's job (see [`crate::context::manager`]).

use super::models::{Message, SummaryCheckpoint, SummaryTriggerInfo};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Assistant turns per summarization batch
pub const SUMMARY_INTERVAL: usize = 15;

/// Whole-conversation token ceiling that forces summarization
pub const SUMMARY_SIZE_CEILING_TOKENS: usize = 12_000;

/// Summarization trigger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryConfig {
    /// Assistant turns per summarization batch
    #[serde(default = "default_interval")]
    pub interval: usize,
    /// Untruncated conversation size that forces summarization
    #[serde(default = "default_size_ceiling")]
    pub size_ceiling_tokens: usize,
}

fn default_interval() -> usize {
    SUMMARY_INTERVAL
}

fn default_size_ceiling() -> usize {
    SUMMARY_SIZE_CEILING_TOKENS
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            size_ceiling_tokens: default_size_ceiling(),
        }
    }
}

/// Which condition made a summary due
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryReason {
    Interval,
    Size,
}

impl SummaryReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryReason::Interval => "interval",
            SummaryReason::Size => "size",
        }
    }
}

/// Evaluates summarization triggers against a fixed configuration
#[derive(Debug, Clone, Default)]
pub struct SummaryTriggerEvaluator {
    config: SummaryConfig,
}

impl SummaryTriggerEvaluator {
    pub fn new(config: SummaryConfig) -> Self {
        Self { config }
    }

    /// Decide whether the interval trigger fires for `history` (oldest first)
    /// given the last recorded `checkpoint`.
    pub fn evaluate(&self, history: &[Message], checkpoint: &SummaryCheckpoint) -> SummaryTriggerInfo {
        let interval = self.config.interval;
        let last_end = checkpoint.last_summary_end_message;

        let pending: Vec<&Message> = history
            .iter()
            .filter(|m| m.is_assistant() && !m.is_placeholder && m.sequence_number > last_end)
            .collect();

        let current_ai_count = pending.len();
        let should_trigger_summary = interval > 0 && current_ai_count >= interval;

        let messages_to_summarize = if should_trigger_summary {
            let batch_end = pending[interval - 1].sequence_number;
            history
                .iter()
                .filter(|m| m.sequence_number > last_end && m.sequence_number <= batch_end)
                .cloned()
                .collect()
        } else {
            Vec::new()
        };

        let info = SummaryTriggerInfo {
            should_trigger_summary,
            current_ai_count,
            next_summary_at: last_end + interval as u64,
            last_summary_end_message: last_end,
            messages_to_summarize,
        };

        if info.should_trigger_summary {
            info!(
                "Summary due: {} assistant turns since message {}, batch ends at {:?}",
                current_ai_count,
                last_end,
                info.summary_end_message()
            );
        } else {
            debug!(
                "Summary not due: {}/{} assistant turns since message {}",
                current_ai_count, interval, last_end
            );
        }

        info
    }

    /// Whether an untruncated conversation of `total_tokens` must be summarized
    pub fn exceeds_size_ceiling(&self, total_tokens: usize) -> bool {
        total_tokens > self.config.size_ceiling_tokens
    }

    pub fn config(&self) -> &SummaryConfig {
        &self.config
    }
}
