//! Token estimation
//!
//! The default estimator is a calibrated heuristic rather than a tokenizer. It
//! takes the larger of a character-density and a word-density estimate and then
//! scales up content that looks structured (JSON) or like code/markup, so it
//! errs toward over-counting.

use super::models::ConversationMessage;

/// Characters per token for the character-density estimate
pub const CHARS_PER_TOKEN: usize = 4;

/// Tokens per word (x10) for the word-density estimate
const TOKENS_PER_WORD_X10: usize = 13;

/// Scaling (percent) for content containing `{` or `[`
pub const STRUCTURED_CONTENT_PERCENT: usize = 120;

/// Scaling (percent) for content containing code fences or `<`
pub const MARKUP_CONTENT_PERCENT: usize = 115;

/// Role-label framing cost added per message when estimating a conversation
pub const MESSAGE_OVERHEAD_TOKENS: usize = 3;

/// Token estimator trait for different tokenization strategies
pub trait TokenEstimator: Send + Sync {
    /// Estimate the number of tokens in the given text
    fn estimate(&self, text: &str) -> usize;

    /// Estimate tokens for multiple texts
    fn estimate_batch(&self, texts: &[&str]) -> Vec<usize> {
        texts.iter().map(|t| self.estimate(t)).collect()
    }

    /// Estimate one message including its framing overhead
    fn estimate_message(&self, content: &str) -> usize {
        self.estimate(content) + MESSAGE_OVERHEAD_TOKENS
    }

    /// Estimate a full conversation, framing overhead included
    fn estimate_conversation(&self, messages: &[ConversationMessage]) -> usize {
        messages
            .iter()
            .map(|m| self.estimate_message(&m.content))
            .sum()
    }
}

/// Calibrated heuristic estimator (no external tokenizer)
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicEstimator;

impl HeuristicEstimator {
    pub fn new() -> Self {
        Self
    }
}

impl TokenEstimator for HeuristicEstimator {
    fn estimate(&self, text: &str) -> usize {
        estimate_tokens(text)
    }
}

/// Estimate tokens for `text` with the calibrated heuristic
pub fn estimate_tokens(text: &str) -> usize {
    if text.trim().is_empty() {
        return 0;
    }

    let chars = text.chars().count();
    let words = text.split_whitespace().count();

    let by_chars = chars.div_ceil(CHARS_PER_TOKEN);
    let by_words = (words * TOKENS_PER_WORD_X10).div_ceil(10);
    let base = by_chars.max(by_words);

    content_multiplier_percent(text)
        .into_iter()
        .fold(base, |tokens, percent| (tokens * percent).div_ceil(100))
}

/// Scaling factors (in percent) the heuristic applies to `text`, in the order
/// they are applied: structured content first, then code/markup.
pub fn content_multiplier_percent(text: &str) -> Vec<usize> {
    let mut factors = Vec::with_capacity(2);
    if looks_structured(text) {
        factors.push(STRUCTURED_CONTENT_PERCENT);
    }
    if looks_like_markup(text) {
        factors.push(MARKUP_CONTENT_PERCENT);
    }
    factors
}

fn looks_structured(text: &str) -> bool {
    text.contains('{') || text.contains('[')
}

fn looks_like_markup(text: &str) -> bool {
    text.contains("```") || text.contains('<')
}

/// Word-based token estimator (fallback, ~1.3 tokens per word)
pub struct WordBasedEstimator {
    tokens_per_word: f64,
}

impl WordBasedEstimator {
    pub fn new(tokens_per_word: f64) -> Self {
        Self { tokens_per_word }
    }
}

impl Default for WordBasedEstimator {
    fn default() -> Self {
        Self::new(1.3)
    }
}

impl TokenEstimator for WordBasedEstimator {
    fn estimate(&self, text: &str) -> usize {
        let word_count = text.split_whitespace().count();
        (word_count as f64 * self.tokens_per_word).ceil() as usize
    }
}

/// Tiktoken-based estimator using cl100k_base
#[cfg(feature = "tiktoken")]
pub struct TiktokenEstimator {
    bpe: std::sync::Arc<tiktoken_rs::CoreBPE>,
}

#[cfg(feature = "tiktoken")]
impl TiktokenEstimator {
    /// Create a new tiktoken estimator with cl100k_base encoding
    pub fn new() -> crate::error::Result<Self> {
        let bpe = tiktoken_rs::cl100k_base()
            .map_err(|e| crate::error::ContextError::Configuration(e.to_string()))?;
        Ok(Self {
            bpe: std::sync::Arc::new(bpe),
        })
    }
}

#[cfg(feature = "tiktoken")]
impl TokenEstimator for TiktokenEstimator {
    fn estimate(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}
