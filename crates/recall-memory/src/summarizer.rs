//! Summarizer trait and the topic-extraction implementation used for eviction

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use recall_core::{ConversationTurn, RecallError, Result, Summary};

use crate::token_budget::estimate_tokens;
use crate::tokenizer::normalize;

/// Folds a batch of turns into long-term summaries.
pub trait Summarizer: Send + Sync {
    /// Compress `turns` into a single summary. Empty input is rejected.
    fn summarize_batch(&self, turns: &[ConversationTurn]) -> Result<Summary>;

    /// Compress `turns` into one summary per period bucket. The source turn
    /// counts of the returned summaries add up to `turns.len()`.
    fn summarize_periods(&self, turns: &[ConversationTurn]) -> Result<Vec<Summary>> {
        Ok(vec![self.summarize_batch(turns)?])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodGranularity {
    #[default]
    Session,
    Hour,
    Day,
    Week,
}

impl PeriodGranularity {
    /// Bucket label for `timestamp`. Turns with equal labels share a summary.
    pub fn label(&self, timestamp: DateTime<Utc>) -> String {
        match self {
            PeriodGranularity::Session => "session".to_string(),
            PeriodGranularity::Hour => timestamp.format("%Y-%m-%dT%H").to_string(),
            PeriodGranularity::Day => timestamp.format("%Y-%m-%d").to_string(),
            PeriodGranularity::Week => {
                let week = timestamp.iso_week();
                format!("{}-W{:02}", week.year(), week.week())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummarizerConfig {
    #[serde(default)]
    pub granularity: PeriodGranularity,

    #[serde(default = "default_max_topics")]
    pub max_topics: usize,

    #[serde(default = "default_digest_topics")]
    pub digest_topics: usize,

    #[serde(default = "default_max_digest_chars")]
    pub max_digest_chars: usize,

    #[serde(default = "default_turn_clip_chars")]
    pub turn_clip_chars: usize,
}

fn default_max_topics() -> usize {
    10
}

fn default_digest_topics() -> usize {
    5
}

fn default_max_digest_chars() -> usize {
    600
}

fn default_turn_clip_chars() -> usize {
    80
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            granularity: PeriodGranularity::default(),
            max_topics: default_max_topics(),
            digest_topics: default_digest_topics(),
            max_digest_chars: default_max_digest_chars(),
            turn_clip_chars: default_turn_clip_chars(),
        }
    }
}

/// Deterministic summarizer: frequency-ranked topics plus a clipped transcript.
#[derive(Debug, Clone, Default)]
pub struct TopicSummarizer {
    config: SummarizerConfig,
}

impl TopicSummarizer {
    pub fn new(config: SummarizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SummarizerConfig {
        &self.config
    }

    fn build_summary(&self, label: String, turns: &[ConversationTurn]) -> Summary {
        let topics = extract_topics(turns, self.config.max_topics);

        let header_topics: Vec<&str> = topics
            .iter()
            .take(self.config.digest_topics)
            .map(String::as_str)
            .collect();
        let noun = if turns.len() == 1 { "turn" } else { "turns" };
        let header = if header_topics.is_empty() {
            format!("{}: {} {}.", label, turns.len(), noun)
        } else {
            format!(
                "{}: {} {} about {}.",
                label,
                turns.len(),
                noun,
                header_topics.join(", ")
            )
        };

        let transcript = turns
            .iter()
            .map(|t| {
                let first_line = t.text.trim().lines().next().unwrap_or("");
                format!(
                    "{}: {}",
                    t.role.label(),
                    clip(first_line, self.config.turn_clip_chars)
                )
            })
            .collect::<Vec<_>>()
            .join(" | ");

        let digest_text = clip(
            &format!("{} {}", header, transcript),
            self.config.max_digest_chars,
        );

        let period_start = turns.iter().map(|t| t.timestamp).min().unwrap_or_default();
        let period_end = turns.iter().map(|t| t.timestamp).max().unwrap_or_default();
        let total_tokens = turns
            .iter()
            .map(|t| {
                if t.token_estimate > 0 {
                    t.token_estimate
                } else {
                    estimate_tokens(&t.text)
                }
            })
            .sum();

        Summary {
            period_start,
            period_end,
            period_label: label,
            topics,
            digest_text,
            source_turn_count: turns.len(),
            total_tokens,
        }
    }
}

impl Summarizer for TopicSummarizer {
    fn summarize_batch(&self, turns: &[ConversationTurn]) -> Result<Summary> {
        let Some(first) = turns.first() else {
            return Err(RecallError::invalid_argument(
                "cannot summarize an empty batch of turns",
            ));
        };
        let label = self.config.granularity.label(first.timestamp);
        Ok(self.build_summary(label, turns))
    }

    fn summarize_periods(&self, turns: &[ConversationTurn]) -> Result<Vec<Summary>> {
        if turns.is_empty() {
            return Err(RecallError::invalid_argument(
                "cannot summarize an empty batch of turns",
            ));
        }

        let mut summaries = Vec::new();
        let mut start = 0;
        let mut current = self.config.granularity.label(turns[0].timestamp);

        for (i, turn) in turns.iter().enumerate().skip(1) {
            let label = self.config.granularity.label(turn.timestamp);
            if label != current {
                let finished = std::mem::replace(&mut current, label);
                summaries.push(self.build_summary(finished, &turns[start..i]));
                start = i;
            }
        }
        summaries.push(self.build_summary(current, &turns[start..]));

        Ok(summaries)
    }
}

/// Most frequent normalized terms across `turns`. Ties keep first-seen order.
pub fn extract_topics(turns: &[ConversationTurn], limit: usize) -> Vec<String> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    let mut order = 0;
    for turn in turns {
        for term in normalize(&turn.text) {
            let entry = counts.entry(term).or_insert_with(|| {
                order += 1;
                (0, order)
            });
            entry.0 += 1;
        }
    }

    let mut ranked: Vec<(String, usize, usize)> = counts
        .into_iter()
        .map(|(term, (count, first_seen))| (term, count, first_seen))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.2.cmp(&b.2)));
    ranked
        .into_iter()
        .take(limit)
        .map(|(term, _, _)| term)
        .collect()
}

/// Truncates to at most `max_chars` characters, marking the cut with an ellipsis.
fn clip(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }
    let mut clipped: String = text.chars().take(max_chars - 1).collect();
    clipped.push('…');
    clipped
}
