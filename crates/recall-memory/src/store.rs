//! Short-term turn buffer backed by long-term summaries

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use recall_core::{ConversationTurn, MemorySnapshot, RecallError, Result, Summary};

use crate::config::MemoryConfig;
use crate::events::{EvictionReason, MemoryCompressEvent, MemoryEvictEvent};
use crate::relevance::{ScoredTurn, search};
use crate::summarizer::{Summarizer, TopicSummarizer};
use crate::token_budget::{estimate_tokens, estimate_turn_tokens};

/// Result of folding a batch of turns into summaries.
#[derive(Debug, Clone, PartialEq)]
pub struct Eviction {
    pub event: MemoryEvictEvent,
    pub compression: MemoryCompressEvent,
    pub summaries: Vec<Summary>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppendOutcome {
    pub turn_id: Uuid,
    pub eviction: Option<Eviction>,
}

impl AppendOutcome {
    pub fn evicted(&self) -> usize {
        self.eviction
            .as_ref()
            .map(|e| e.event.turns_evicted)
            .unwrap_or(0)
    }

    pub fn summaries(&self) -> &[Summary] {
        self.eviction
            .as_ref()
            .map(|e| e.summaries.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub active_turns: usize,
    pub lifetime_turns: usize,
    pub summary_count: usize,
    pub summarized_turns: usize,
    pub short_term_tokens: u32,
    pub summary_tokens: u32,
}

pub struct MemoryStore {
    config: MemoryConfig,
    summarizer: Arc<dyn Summarizer>,
    short_term: Vec<ConversationTurn>,
    summaries: Vec<Summary>,
    lifetime_turns: usize,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("config", &self.config)
            .field("short_term", &self.short_term.len())
            .field("summaries", &self.summaries.len())
            .field("lifetime_turns", &self.lifetime_turns)
            .finish()
    }
}

impl MemoryStore {
    pub fn new(config: MemoryConfig) -> Result<Self> {
        let summarizer = Arc::new(TopicSummarizer::new(config.summarizer.clone()));
        Self::with_summarizer(config, summarizer)
    }

    pub fn with_summarizer(config: MemoryConfig, summarizer: Arc<dyn Summarizer>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            summarizer,
            short_term: Vec::new(),
            summaries: Vec::new(),
            lifetime_turns: 0,
        })
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Replaces the configuration. A smaller `short_term_limit` is applied
    /// immediately by folding the overflow into summaries.
    pub fn set_config(&mut self, config: MemoryConfig) -> Result<Option<Eviction>> {
        config.validate()?;
        self.config = config;
        self.evict_overflow(EvictionReason::ShortTermLimit)
    }

    pub fn set_summarizer(&mut self, summarizer: Arc<dyn Summarizer>) {
        self.summarizer = summarizer;
    }

    pub fn len(&self) -> usize {
        self.short_term.len()
    }

    pub fn is_empty(&self) -> bool {
        self.short_term.is_empty() && self.summaries.is_empty()
    }

    pub fn summaries(&self) -> &[Summary] {
        &self.summaries
    }

    /// Appends `turn`, folding the oldest turns into summaries when the
    /// short-term buffer overflows. On error the store is left unchanged.
    pub fn append(&mut self, mut turn: ConversationTurn) -> Result<AppendOutcome> {
        turn.token_estimate = estimate_tokens(&turn.text);
        let turn_id = turn.id;
        self.short_term.push(turn);

        match self.evict_overflow(EvictionReason::ShortTermLimit) {
            Ok(eviction) => {
                self.lifetime_turns += 1;
                debug!(
                    turn_id = %turn_id,
                    active = self.short_term.len(),
                    evicted = eviction.as_ref().map(|e| e.event.turns_evicted).unwrap_or(0),
                    "Turn appended"
                );
                Ok(AppendOutcome { turn_id, eviction })
            }
            Err(e) => {
                self.short_term.pop();
                Err(e)
            }
        }
    }

    /// Appends a user turn and the assistant turn answering it. Either both
    /// are stored or neither is.
    pub fn append_exchange(
        &mut self,
        user: ConversationTurn,
        assistant: ConversationTurn,
    ) -> Result<(AppendOutcome, AppendOutcome)> {
        let short_term = self.short_term.clone();
        let summary_count = self.summaries.len();
        let lifetime_turns = self.lifetime_turns;

        let result = self
            .append(user)
            .and_then(|first| self.append(assistant).map(|second| (first, second)));

        if result.is_err() {
            self.short_term = short_term;
            self.summaries.truncate(summary_count);
            self.lifetime_turns = lifetime_turns;
        }
        result
    }

    /// The last `min(n, len)` turns in chronological order.
    pub fn recent(&self, n: i64) -> Result<&[ConversationTurn]> {
        if n <= 0 {
            return Err(RecallError::invalid_argument(format!(
                "recent turn count must be positive, got {}",
                n
            )));
        }
        let count = usize::try_from(n)
            .unwrap_or(usize::MAX)
            .min(self.short_term.len());
        Ok(&self.short_term[self.short_term.len() - count..])
    }

    pub fn all_for_search(&self) -> &[ConversationTurn] {
        &self.short_term
    }

    pub fn search(&self, query: &str, limit: usize) -> Vec<ScoredTurn<'_>> {
        search(query, &self.short_term, limit)
    }

    /// Empties short-term memory. Summaries are kept.
    pub fn clear_short_term(&mut self) -> usize {
        let cleared = self.short_term.len();
        self.short_term.clear();
        info!(cleared, "Short-term memory cleared");
        cleared
    }

    /// Folds every turn older than the recent window into summaries.
    pub fn force_summarize(&mut self) -> Result<Vec<Summary>> {
        let count = self
            .short_term
            .len()
            .saturating_sub(self.config.recent_window);
        if count == 0 {
            debug!("Nothing old enough to summarize");
            return Ok(Vec::new());
        }
        let eviction = self.fold_oldest(count, EvictionReason::ForcedSummarize)?;
        Ok(eviction.summaries)
    }

    pub fn snapshot(&self) -> MemorySnapshot {
        MemorySnapshot::new(self.short_term.clone()).with_summaries(self.summaries.clone())
    }

    /// Replaces the whole state. Turns beyond the short-term limit are folded
    /// into summaries rather than dropped.
    pub fn restore(&mut self, snapshot: MemorySnapshot) -> Result<Option<Eviction>> {
        let MemorySnapshot { mut turns, summaries } = snapshot;
        // Persisted estimates are not trusted; the budget relies on them.
        for turn in &mut turns {
            turn.token_estimate = estimate_tokens(&turn.text);
        }

        let previous_turns = std::mem::replace(&mut self.short_term, turns);
        let previous_summaries = std::mem::replace(&mut self.summaries, summaries);

        match self.evict_overflow(EvictionReason::Restore) {
            Ok(eviction) => {
                self.lifetime_turns = self.short_term.len() + self.summarized_turns();
                info!(
                    turns = self.short_term.len(),
                    summaries = self.summaries.len(),
                    "Memory restored"
                );
                Ok(eviction)
            }
            Err(e) => {
                self.short_term = previous_turns;
                self.summaries = previous_summaries;
                Err(e)
            }
        }
    }

    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            active_turns: self.short_term.len(),
            lifetime_turns: self.lifetime_turns,
            summary_count: self.summaries.len(),
            summarized_turns: self.summarized_turns(),
            short_term_tokens: self.short_term.iter().map(estimate_turn_tokens).sum(),
            summary_tokens: self
                .summaries
                .iter()
                .map(|s| estimate_tokens(&s.digest_text))
                .sum(),
        }
    }

    fn summarized_turns(&self) -> usize {
        self.summaries.iter().map(|s| s.source_turn_count).sum()
    }

    fn evict_overflow(&mut self, reason: EvictionReason) -> Result<Option<Eviction>> {
        let len = self.short_term.len();
        let limit = self.config.short_term_limit;
        if len <= limit {
            return Ok(None);
        }
        let excess = len - limit;
        let count = excess
            .max(self.config.eviction_batch_size)
            .min(len.saturating_sub(1));
        self.fold_oldest(count, reason).map(Some)
    }

    fn fold_oldest(&mut self, count: usize, reason: EvictionReason) -> Result<Eviction> {
        let batch = &self.short_term[..count];
        let summaries = self.summarizer.summarize_periods(batch)?;

        let tokens_before: u32 = batch.iter().map(estimate_turn_tokens).sum();
        let tokens_after: u32 = summaries
            .iter()
            .map(|s| estimate_tokens(&s.digest_text))
            .sum();
        let compression = MemoryCompressEvent::new(count, tokens_before, tokens_after);
        let event = MemoryEvictEvent {
            reason,
            turns_evicted: count,
            summaries_created: summaries.len(),
        };

        self.short_term.drain(..count);
        self.summaries.extend(summaries.iter().cloned());

        info!(
            reason = ?reason,
            turns_evicted = count,
            summaries_created = summaries.len(),
            tokens_before,
            tokens_after,
            "Turns folded into summaries"
        );

        Ok(Eviction {
            event,
            compression,
            summaries,
        })
    }
}
