//! Conversational memory: short-term turns, lexical recall and summarization

mod config;
mod context;
mod events;
mod store;
mod summarizer;

pub mod relevance;
pub mod token_budget;
pub mod tokenizer;

pub use recall_core::MemorySnapshot;
pub use config::MemoryConfig;
pub use context::{AssembledContext, ContextItem, ContextParams, build_context};
pub use events::{EvictionReason, MemoryBudgetEvent, MemoryCompressEvent, MemoryEvictEvent};
pub use relevance::{RankedDocument, RelevanceIndex, ScoredTurn};
pub use store::{AppendOutcome, Eviction, MemoryStats, MemoryStore};
pub use summarizer::{
    PeriodGranularity, Summarizer, SummarizerConfig, TopicSummarizer, extract_topics,
};
pub use token_budget::{TokenBudget, estimate_message_tokens, estimate_tokens, estimate_turn_tokens};
