//! Memory event types

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryCompressEvent {
    pub turns_compressed: usize,
    pub tokens_before: u32,
    pub tokens_after: u32,
    pub compression_ratio: f64,
}

impl MemoryCompressEvent {
    pub fn new(turns_compressed: usize, tokens_before: u32, tokens_after: u32) -> Self {
        let ratio = if tokens_before > 0 {
            tokens_after as f64 / tokens_before as f64
        } else {
            0.0
        };
        Self {
            turns_compressed,
            tokens_before,
            tokens_after,
            compression_ratio: ratio,
        }
    }

    pub fn tokens_saved(&self) -> u32 {
        self.tokens_before.saturating_sub(self.tokens_after)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEvictEvent {
    pub reason: EvictionReason,
    pub turns_evicted: usize,
    pub summaries_created: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionReason {
    ShortTermLimit,
    ForcedSummarize,
    Restore,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryBudgetEvent {
    pub component: String,
    pub used_tokens: u32,
    pub budget_tokens: u32,
    pub usage_percent: f64,
}

impl MemoryBudgetEvent {
    pub fn new(component: impl Into<String>, used_tokens: u32, budget_tokens: u32) -> Self {
        let usage_percent = if budget_tokens > 0 {
            (used_tokens as f64 / budget_tokens as f64) * 100.0
        } else {
            0.0
        };
        Self {
            component: component.into(),
            used_tokens,
            budget_tokens,
            usage_percent,
        }
    }

    pub fn is_over_budget(&self) -> bool {
        self.used_tokens > self.budget_tokens
    }
}
