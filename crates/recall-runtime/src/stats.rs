use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use recall_core::TokenUsage;
use recall_memory::MemoryStats;

/// Completion accounting for one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageStats {
    pub requests: u64,
    pub successes: u64,
    pub failures: u64,
    pub streamed: u64,
    pub stream_fallbacks: u64,
    pub tokens: TokenUsage,
    pub total_response_ms: u64,
    #[serde(default)]
    pub errors_by_kind: BTreeMap<String, u64>,
}

impl UsageStats {
    pub fn record_success(&mut self, usage: &TokenUsage, elapsed: Duration, streamed: bool) {
        self.requests += 1;
        self.successes += 1;
        if streamed {
            self.streamed += 1;
        }
        self.tokens.accumulate(usage);
        self.total_response_ms += elapsed.as_millis() as u64;
    }

    pub fn record_failure(&mut self, kind: &str, elapsed: Duration) {
        self.requests += 1;
        self.failures += 1;
        self.total_response_ms += elapsed.as_millis() as u64;
        *self.errors_by_kind.entry(kind.to_string()).or_insert(0) += 1;
    }

    pub fn record_fallback(&mut self) {
        self.stream_fallbacks += 1;
    }

    pub fn average_response_ms(&self) -> Option<f64> {
        if self.requests == 0 {
            return None;
        }
        Some(self.total_response_ms as f64 / self.requests as f64)
    }

    pub fn success_rate(&self) -> f64 {
        if self.requests == 0 {
            return 0.0;
        }
        self.successes as f64 / self.requests as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub started_at: DateTime<Utc>,
    pub memory: MemoryStats,
    pub usage: UsageStats,
}
