//! Snapshot of memory state for persistence

use serde::{Deserialize, Serialize};

use crate::summary::Summary;
use crate::turn::ConversationTurn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MemorySnapshot {
    #[serde(default)]
    pub turns: Vec<ConversationTurn>,
    #[serde(default)]
    pub summaries: Vec<Summary>,
}

impl MemorySnapshot {
    pub fn new(turns: Vec<ConversationTurn>) -> Self {
        Self {
            turns,
            summaries: Vec::new(),
        }
    }

    pub fn with_summaries(mut self, summaries: Vec<Summary>) -> Self {
        self.summaries = summaries;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty() && self.summaries.is_empty()
    }
}
