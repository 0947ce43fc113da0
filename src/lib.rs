//! Conversation context windowing and auto-summarization triggers for chat LLMs
//!
//! The crate decides, for every turn of a chat, how much prior history an LLM
//! call may see within a fixed context window, and when the conversation's
//! accumulated history should be compressed into a summary.

pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{ContextError, Result};
