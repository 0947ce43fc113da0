//! Data models for conversation context management

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Author of a stored chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// Role of a message in the LLM-facing prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationRole {
    System,
    User,
    Assistant,
}

impl From<MessageRole> for ConversationRole {
    fn from(role: MessageRole) -> Self {
        match role {
            MessageRole::User => ConversationRole::User,
            MessageRole::Assistant => ConversationRole::Assistant,
        }
    }
}

/// A stored chat message. Ordered solely by `sequence_number`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub content: String,
    pub role: MessageRole,
    pub sequence_number: u64,
    pub created_at: DateTime<Utc>,
    /// Assistant message still being generated/streamed
    #[serde(default)]
    pub is_placeholder: bool,
}

impl Message {
    /// Create a new completed message
    pub fn new(role: MessageRole, content: impl Into<String>, sequence_number: u64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content: content.into(),
            role,
            sequence_number,
            created_at: Utc::now(),
            is_placeholder: false,
        }
    }

    pub fn user(content: impl Into<String>, sequence_number: u64) -> Self {
        Self::new(MessageRole::User, content, sequence_number)
    }

    pub fn assistant(content: impl Into<String>, sequence_number: u64) -> Self {
        Self::new(MessageRole::Assistant, content, sequence_number)
    }

    /// Create an empty assistant placeholder for a streaming response
    pub fn placeholder(sequence_number: u64) -> Self {
        Self {
            is_placeholder: true,
            ..Self::new(MessageRole::Assistant, String::new(), sequence_number)
        }
    }

    pub fn is_assistant(&self) -> bool {
        self.role == MessageRole::Assistant
    }

    /// Project into the LLM-facing shape
    pub fn to_conversation_message(&self) -> ConversationMessage {
        ConversationMessage {
            role: self.role.into(),
            content: self.content.clone(),
        }
    }
}

/// LLM-facing projection of a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: ConversationRole,
    pub content: String,
}

impl ConversationMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ConversationRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ConversationRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ConversationRole::Assistant,
            content: content.into(),
        }
    }
}

/// Auxiliary prompt context injected alongside the system prompt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuxiliaryContext {
    #[serde(default)]
    pub world_info: String,
    #[serde(default)]
    pub memories: String,
    #[serde(default)]
    pub current_context: String,
    #[serde(default)]
    pub auto_summary: String,
}

impl AuxiliaryContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_world_info(mut self, world_info: impl Into<String>) -> Self {
        self.world_info = world_info.into();
        self
    }

    pub fn with_memories(mut self, memories: impl Into<String>) -> Self {
        self.memories = memories.into();
        self
    }

    pub fn with_current_context(mut self, current_context: impl Into<String>) -> Self {
        self.current_context = current_context.into();
        self
    }

    pub fn with_auto_summary(mut self, auto_summary: impl Into<String>) -> Self {
        self.auto_summary = auto_summary.into();
        self
    }

    /// All fields concatenated, as injected into a single prompt
    pub fn concatenated(&self) -> String {
        [
            self.world_info.as_str(),
            self.memories.as_str(),
            self.current_context.as_str(),
            self.auto_summary.as_str(),
        ]
        .concat()
    }

    /// Non-empty sections in injection order
    pub fn sections(&self) -> impl Iterator<Item = &str> {
        [
            self.world_info.as_str(),
            self.memories.as_str(),
            self.current_context.as_str(),
            self.auto_summary.as_str(),
        ]
        .into_iter()
        .filter(|s| !s.trim().is_empty())
    }
}

/// Per-component token usage of an assembled turn
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBreakdown {
    pub system: usize,
    pub history: usize,
    pub current_message: usize,
    pub remaining: usize,
}

/// Output of one assembled turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationResult {
    pub messages: Vec<ConversationMessage>,
    pub truncated: bool,
    pub total_tokens: usize,
    pub dropped_messages: usize,
    pub needs_summarization: bool,
    pub token_breakdown: TokenBreakdown,
    /// `total_tokens` reached the budget's warning threshold
    pub context_warning: bool,
}

/// Last recorded summarization boundary for a conversation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryCheckpoint {
    pub last_summary_end_message: u64,
    pub has_summaries: bool,
}

impl SummaryCheckpoint {
    /// No summary produced yet
    pub fn none() -> Self {
        Self::default()
    }

    pub fn at(last_summary_end_message: u64) -> Self {
        Self {
            last_summary_end_message,
            has_summaries: true,
        }
    }
}

/// Summarization decision for a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryTriggerInfo {
    pub should_trigger_summary: bool,
    pub current_ai_count: usize,
    pub next_summary_at: u64,
    pub last_summary_end_message: u64,
    pub messages_to_summarize: Vec<Message>,
}

impl SummaryTriggerInfo {
    /// Sequence number the pending summary would end at, if triggered
    pub fn summary_end_message(&self) -> Option<u64> {
        self.messages_to_summarize.last().map(|m| m.sequence_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_is_assistant() {
        let message = Message::placeholder(7);
        assert!(message.is_placeholder);
        assert!(message.is_assistant());
        assert!(message.content.is_empty());
    }

    #[test]
    fn test_auxiliary_concatenation() {
        let aux = AuxiliaryContext::new()
            .with_world_info("world")
            .with_auto_summary("summary");
        assert_eq!(aux.concatenated(), "worldsummary");
        assert_eq!(aux.sections().collect::<Vec<_>>(), vec!["world", "summary"]);
    }

    #[test]
    fn test_role_projection() {
        let message = Message::user("hi", 1);
        let projected = message.to_conversation_message();
        assert_eq!(projected.role, ConversationRole::User);
        assert_eq!(projected.content, "hi");
    }

    #[test]
    fn test_checkpoint_constructors() {
        assert!(!SummaryCheckpoint::none().has_summaries);
        assert_eq!(SummaryCheckpoint::at(30).last_summary_end_message, 30);
    }
}
