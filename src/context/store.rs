//! Message history and summary checkpoint interfaces
//!
//! The context manager only reads through these traits. Checkpoint writes come
//! from the external summarization worker once a summary has been produced.

use super::models::{Message, MessageRole, SummaryCheckpoint};
use crate::error::{ContextError, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, warn};

/// Reads a conversation's messages in ascending sequence order
#[async_trait]
pub trait MessageHistoryReader: Send + Sync {
    async fn fetch(&self, conversation_id: &str) -> Result<Vec<Message>>;
}

/// Reads and records summary checkpoints
#[async_trait]
pub trait SummaryCheckpointStore: Send + Sync {
    async fn read(&self, conversation_id: &str) -> Result<SummaryCheckpoint>;

    /// Record that a summary covering messages up to `end_sequence_number` exists
    async fn write(&self, conversation_id: &str, end_sequence_number: u64) -> Result<()>;
}

/// In-process conversation store
#[derive(Default)]
pub struct InMemoryConversationStore {
    messages: DashMap<String, Vec<Message>>,
    checkpoints: DashMap<String, u64>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_sequence(history: &[Message]) -> u64 {
        history.last().map(|m| m.sequence_number + 1).unwrap_or(1)
    }

    /// Append a completed message with the next sequence number
    pub fn append(&self, conversation_id: &str, role: MessageRole, content: impl Into<String>) -> Message {
        let mut history = self.messages.entry(conversation_id.to_string()).or_default();
        let message = Message::new(role, content, Self::next_sequence(&history));
        history.push(message.clone());
        message
    }

    /// Append a streaming placeholder for an assistant response
    pub fn start_placeholder(&self, conversation_id: &str) -> Message {
        let mut history = self.messages.entry(conversation_id.to_string()).or_default();
        let message = Message::placeholder(Self::next_sequence(&history));
        history.push(message.clone());
        message
    }

    /// Fill a placeholder with its final content
    pub fn complete_placeholder(
        &self,
        conversation_id: &str,
        message_id: &str,
        content: impl Into<String>,
    ) -> Result<Message> {
        let mut history = self
            .messages
            .get_mut(conversation_id)
            .ok_or_else(|| ContextError::Internal(format!("Unknown conversation: {}", conversation_id)))?;

        let message = history
            .iter_mut()
            .find(|m| m.id == message_id && m.is_placeholder)
            .ok_or_else(|| ContextError::Internal(format!("No open placeholder: {}", message_id)))?;

        message.content = content.into();
        message.is_placeholder = false;
        Ok(message.clone())
    }

    /// Insert a message with an explicit sequence number, keeping order
    pub fn insert(&self, conversation_id: &str, message: Message) {
        let mut history = self.messages.entry(conversation_id.to_string()).or_default();
        let position = history.partition_point(|m| m.sequence_number <= message.sequence_number);
        history.insert(position, message);
    }

    /// Number of messages stored for a conversation
    pub fn len(&self, conversation_id: &str) -> usize {
        self.messages.get(conversation_id).map(|h| h.len()).unwrap_or(0)
    }

    pub fn is_empty(&self, conversation_id: &str) -> bool {
        self.len(conversation_id) == 0
    }
}

#[async_trait]
impl MessageHistoryReader for InMemoryConversationStore {
    async fn fetch(&self, conversation_id: &str) -> Result<Vec<Message>> {
        Ok(self
            .messages
            .get(conversation_id)
            .map(|h| h.value().clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl SummaryCheckpointStore for InMemoryConversationStore {
    async fn read(&self, conversation_id: &str) -> Result<SummaryCheckpoint> {
        Ok(self
            .checkpoints
            .get(conversation_id)
            .map(|end| SummaryCheckpoint::at(*end))
            .unwrap_or_default())
    }

    /// Upsert keyed on the ending sequence number; never moves backwards
    async fn write(&self, conversation_id: &str, end_sequence_number: u64) -> Result<()> {
        let mut end = self.checkpoints.entry(conversation_id.to_string()).or_insert(0);
        if end_sequence_number > *end {
            debug!(
                "Checkpoint for {} advanced {} -> {}",
                conversation_id, *end, end_sequence_number
            );
            *end = end_sequence_number;
        } else {
            warn!(
                "Ignoring stale checkpoint for {}: {} <= {}",
                conversation_id, end_sequence_number, *end
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_assigns_sequence() {
        let store = InMemoryConversationStore::new();
        store.append("c1", MessageRole::User, "hello");
        store.append("c1", MessageRole::Assistant, "hi");
        store.append("c2", MessageRole::User, "other");

        let history = store.fetch("c1").await.unwrap();
        let sequences: Vec<u64> = history.iter().map(|m| m.sequence_number).collect();
        assert_eq!(sequences, vec![1, 2]);
        assert_eq!(store.len("c2"), 1);
        assert!(!store.is_empty("c2"));
    }

    #[tokio::test]
    async fn test_placeholder_lifecycle() {
        let store = InMemoryConversationStore::new();
        store.append("c1", MessageRole::User, "hello");
        let placeholder = store.start_placeholder("c1");
        assert!(placeholder.is_placeholder);

        let completed = store.complete_placeholder("c1", &placeholder.id, "done").unwrap();
        assert!(!completed.is_placeholder);
        assert_eq!(completed.sequence_number, 2);

        // already completed
        assert!(store.complete_placeholder("c1", &placeholder.id, "again").is_err());
    }

    #[tokio::test]
    async fn test_insert_keeps_order() {
        let store = InMemoryConversationStore::new();
        store.insert("c1", Message::user("third", 30));
        store.insert("c1", Message::user("first", 10));
        store.insert("c1", Message::user("second", 20));

        let history = store.fetch("c1").await.unwrap();
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_unknown_conversation_is_empty() {
        let store = InMemoryConversationStore::new();
        assert!(store.is_empty("missing"));
        assert!(store.fetch("missing").await.unwrap().is_empty());
        assert_eq!(store.read("missing").await.unwrap(), SummaryCheckpoint::none());
    }

    #[tokio::test]
    async fn test_checkpoint_only_advances() {
        let store = InMemoryConversationStore::new();
        store.write("c1", 30).await.unwrap();
        store.write("c1", 30).await.unwrap();
        store.write("c1", 10).await.unwrap();

        let checkpoint = store.read("c1").await.unwrap();
        assert!(checkpoint.has_summaries);
        assert_eq!(checkpoint.last_summary_end_message, 30);
    }
}
