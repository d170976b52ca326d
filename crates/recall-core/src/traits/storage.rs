//! Storage trait for memory persistence

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::summary::Summary;
use crate::turn::ConversationTurn;

/// The two independently loadable records that make up persisted memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    ConversationHistory,
    ConversationSummaries,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::ConversationHistory => "conversation_history",
            RecordKind::ConversationSummaries => "conversation_summaries",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable backend for conversation history and summaries.
///
/// Built-in backend: `FileStorage`. Each record is loaded on its own so a corrupt
/// summaries record never prevents the history from loading, and vice versa.
#[async_trait]
pub trait MemoryStorage: Send + Sync {
    /// Replace the persisted conversation history.
    async fn save_turns(&self, turns: &[ConversationTurn]) -> Result<()>;
    /// Replace the persisted summaries.
    async fn save_summaries(&self, summaries: &[Summary]) -> Result<()>;
    /// Load the conversation history. Returns `None` if nothing was saved yet.
    async fn load_turns(&self) -> Result<Option<Vec<ConversationTurn>>>;
    /// Load the summaries. Returns `None` if nothing was saved yet.
    async fn load_summaries(&self) -> Result<Option<Vec<Summary>>>;
    /// Human readable location, used in logs.
    fn location(&self) -> String;
}
