//! Token estimation and budget management

use serde::{Deserialize, Serialize};

use recall_core::ConversationTurn;

/// Fixed cost charged per message for role and framing tokens.
pub const MESSAGE_OVERHEAD_TOKENS: u32 = 4;

/// Language-aware token estimation. Always rounds up so that a context which
/// "fits" by this estimate is never larger than the budget in practice.
pub fn estimate_tokens(text: &str) -> u32 {
    if text.is_empty() {
        return 0;
    }

    let ascii_chars = text.chars().filter(|c| c.is_ascii()).count();
    let cjk_chars = text.chars().filter(|c| is_cjk(*c)).count();
    let other_chars = text.chars().count() - ascii_chars - cjk_chars;

    let estimated =
        (ascii_chars as f64 / 4.0) + (cjk_chars as f64 * 1.5) + (other_chars as f64 * 1.0);

    estimated.ceil().max(1.0) as u32
}

fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}' |   // CJK Unified Ideographs
        '\u{3400}'..='\u{4DBF}' |   // CJK Extension A
        '\u{AC00}'..='\u{D7AF}' |   // Korean Hangul
        '\u{3040}'..='\u{30FF}' |   // Japanese Hiragana/Katakana
        '\u{31F0}'..='\u{31FF}'     // Katakana Extensions
    )
}

/// Cost of a text once framed as a prompt message.
pub fn estimate_message_tokens(text: &str) -> u32 {
    MESSAGE_OVERHEAD_TOKENS + estimate_tokens(text)
}

/// Cost of a stored turn, using the estimate cached at append time when present.
pub fn estimate_turn_tokens(turn: &ConversationTurn) -> u32 {
    if turn.token_estimate > 0 {
        MESSAGE_OVERHEAD_TOKENS + turn.token_estimate
    } else {
        estimate_message_tokens(&turn.text)
    }
}

pub fn fits<'a>(texts: impl IntoIterator<Item = &'a str>, budget: u32) -> bool {
    let total: u32 = texts.into_iter().map(estimate_message_tokens).sum();
    total <= budget
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenBudget {
    #[serde(default = "default_total_budget")]
    pub total: u32,

    #[serde(default = "default_warn_percent")]
    pub warn_at_percent: u8,
}

fn default_total_budget() -> u32 {
    6000
}

fn default_warn_percent() -> u8 {
    80
}

impl Default for TokenBudget {
    fn default() -> Self {
        Self {
            total: default_total_budget(),
            warn_at_percent: default_warn_percent(),
        }
    }
}

impl TokenBudget {
    pub fn new(total: u32) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    pub fn with_warn_at_percent(mut self, percent: u8) -> Self {
        self.warn_at_percent = percent.min(100);
        self
    }

    pub fn warn_threshold(&self) -> u32 {
        (self.total as f64 * (self.warn_at_percent as f64 / 100.0)) as u32
    }

    pub fn is_over_warn_threshold(&self, used: u32) -> bool {
        used >= self.warn_threshold()
    }

    pub fn usage_percent(&self, used: u32) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (used as f64 / self.total as f64) * 100.0
    }
}
