//! Memory configuration

use serde::{Deserialize, Serialize};

use recall_core::{RecallError, Result};

use crate::context::ContextParams;
use crate::summarizer::SummarizerConfig;
use crate::token_budget::TokenBudget;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Maximum number of turns kept verbatim.
    #[serde(default = "default_short_term_limit")]
    pub short_term_limit: usize,

    /// Minimum number of turns folded into summaries per eviction.
    #[serde(default = "default_eviction_batch_size")]
    pub eviction_batch_size: usize,

    /// Turns always included in an assembled context.
    #[serde(default = "default_recent_window")]
    pub recent_window: usize,

    #[serde(default = "default_relevance_limit")]
    pub relevance_limit: usize,

    #[serde(default)]
    pub token_budget: TokenBudget,

    #[serde(default)]
    pub summarizer: SummarizerConfig,
}

fn default_short_term_limit() -> usize {
    10
}

fn default_eviction_batch_size() -> usize {
    5
}

fn default_recent_window() -> usize {
    6
}

fn default_relevance_limit() -> usize {
    5
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            short_term_limit: default_short_term_limit(),
            eviction_batch_size: default_eviction_batch_size(),
            recent_window: default_recent_window(),
            relevance_limit: default_relevance_limit(),
            token_budget: TokenBudget::default(),
            summarizer: SummarizerConfig::default(),
        }
    }
}

impl MemoryConfig {
    pub fn with_short_term_limit(mut self, limit: usize) -> Self {
        self.short_term_limit = limit;
        self
    }

    pub fn with_eviction_batch_size(mut self, size: usize) -> Self {
        self.eviction_batch_size = size;
        self
    }

    pub fn with_recent_window(mut self, window: usize) -> Self {
        self.recent_window = window;
        self
    }

    pub fn with_token_budget(mut self, total: u32) -> Self {
        self.token_budget.total = total;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.short_term_limit == 0 {
            return Err(RecallError::Config(
                "short_term_limit must be at least 1".to_string(),
            ));
        }
        if self.eviction_batch_size == 0 {
            return Err(RecallError::Config(
                "eviction_batch_size must be at least 1".to_string(),
            ));
        }
        if self.token_budget.total == 0 {
            return Err(RecallError::Config(
                "token_budget.total must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn context_params(&self) -> ContextParams {
        ContextParams {
            recent_window: self.recent_window,
            relevance_limit: self.relevance_limit,
            token_budget: self.token_budget.total,
        }
    }
}
