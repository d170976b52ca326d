//! Context assembly: recent window plus recalled turns and summaries, fitted to a token budget

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use recall_core::{ConversationTurn, PromptMessage, RecallError, Summary};

use crate::events::MemoryBudgetEvent;
use crate::relevance::RelevanceIndex;
use crate::store::MemoryStore;
use crate::token_budget::{estimate_message_tokens, estimate_turn_tokens};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContextParams {
    pub recent_window: usize,
    pub relevance_limit: usize,
    pub token_budget: u32,
}

impl Default for ContextParams {
    fn default() -> Self {
        Self {
            recent_window: 6,
            relevance_limit: 5,
            token_budget: 6000,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContextItem {
    Recent(ConversationTurn),
    Relevant { turn: ConversationTurn, score: f64 },
    Summary { summary: Summary, score: f64 },
}

impl ContextItem {
    pub fn estimated_tokens(&self) -> u32 {
        match self {
            ContextItem::Recent(turn) | ContextItem::Relevant { turn, .. } => {
                estimate_turn_tokens(turn)
            }
            ContextItem::Summary { summary, .. } => estimate_message_tokens(&summary.digest_text),
        }
    }

    pub fn source_label(&self) -> String {
        match self {
            ContextItem::Recent(_) => "recent".to_string(),
            ContextItem::Relevant { score, .. } => format!("relevant (score: {:.2})", score),
            ContextItem::Summary { score, .. } => format!("summary (score: {:.2})", score),
        }
    }

    pub fn is_recent(&self) -> bool {
        matches!(self, ContextItem::Recent(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssembledContext {
    pub items: Vec<ContextItem>,
    pub estimated_tokens: u32,
    pub token_budget: u32,
    /// Set when even the single most recent turn does not fit.
    pub budget_exceeded: bool,
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn sources(&self) -> Vec<String> {
        self.items.iter().map(ContextItem::source_label).collect()
    }

    pub fn warning(&self) -> Option<RecallError> {
        self.budget_exceeded.then_some(RecallError::BudgetExceeded {
            estimated: self.estimated_tokens,
            budget: self.token_budget,
        })
    }

    pub fn budget_event(&self) -> MemoryBudgetEvent {
        MemoryBudgetEvent::new("context", self.estimated_tokens, self.token_budget)
    }

    /// Recalled material becomes one leading system note; recent turns follow
    /// as ordinary messages.
    pub fn to_prompt_messages(&self) -> Vec<PromptMessage> {
        let mut recalled = Vec::new();
        let mut messages = Vec::new();

        for item in &self.items {
            match item {
                ContextItem::Recent(turn) => {
                    messages.push(PromptMessage::new(turn.role.into(), turn.text.clone()));
                }
                ContextItem::Relevant { turn, .. } => {
                    recalled.push(format!("- {}: {}", turn.role.label(), turn.text));
                }
                ContextItem::Summary { summary, .. } => {
                    recalled.push(format!("- Summary: {}", summary.digest_text));
                }
            }
        }

        if recalled.is_empty() {
            return messages;
        }

        let note = format!(
            "Relevant earlier conversation:\n{}",
            recalled.join("\n")
        );
        let mut out = Vec::with_capacity(messages.len() + 1);
        out.push(PromptMessage::system(note));
        out.extend(messages);
        out
    }
}

enum Candidate<'a> {
    Summary(&'a Summary),
    Turn(&'a ConversationTurn),
}

/// Builds the prompt context for `query` from the store's current state.
pub fn build_context(store: &MemoryStore, query: &str, params: &ContextParams) -> AssembledContext {
    let turns = store.all_for_search();
    let window = if turns.is_empty() {
        0
    } else {
        params.recent_window.clamp(1, turns.len())
    };
    let (older, recent) = turns.split_at(turns.len() - window);

    // Summaries predate every short-term turn, so they come first in the
    // chronological corpus. Term weights span every stored turn, but only
    // turns outside the recent window may be recalled.
    let candidates: Vec<Candidate<'_>> = store
        .summaries()
        .iter()
        .map(Candidate::Summary)
        .chain(turns.iter().map(Candidate::Turn))
        .collect();
    let recallable = store.summaries().len() + older.len();
    let index = RelevanceIndex::build(candidates.iter().map(|c| match c {
        Candidate::Summary(summary) => summary.search_text(),
        Candidate::Turn(turn) => Cow::Borrowed(turn.text.as_str()),
    }));

    let mut relevant: Vec<ContextItem> = index
        .rank_where(query, params.relevance_limit, |position| position < recallable)
        .into_iter()
        .map(|ranked| match candidates[ranked.index] {
            Candidate::Summary(summary) => ContextItem::Summary {
                summary: summary.clone(),
                score: ranked.score,
            },
            Candidate::Turn(turn) => ContextItem::Relevant {
                turn: turn.clone(),
                score: ranked.score,
            },
        })
        .collect();
    let mut recent: Vec<ContextItem> = recent.iter().cloned().map(ContextItem::Recent).collect();

    let mut total: u32 = recent
        .iter()
        .chain(relevant.iter())
        .map(ContextItem::estimated_tokens)
        .sum();

    while total > params.token_budget {
        if let Some(item) = relevant.pop() {
            total -= item.estimated_tokens();
        } else if recent.len() > 1 {
            total -= recent.remove(0).estimated_tokens();
        } else {
            break;
        }
    }

    let budget_exceeded = total > params.token_budget;
    if budget_exceeded {
        warn!(
            estimated = total,
            budget = params.token_budget,
            "Most recent turn alone exceeds the token budget"
        );
    }

    let mut items = recent;
    items.extend(relevant);

    debug!(
        items = items.len(),
        estimated_tokens = total,
        budget = params.token_budget,
        "Context assembled"
    );

    AssembledContext {
        items,
        estimated_tokens: total,
        token_budget: params.token_budget,
        budget_exceeded,
    }
}
