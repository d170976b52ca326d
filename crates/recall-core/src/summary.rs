//! Long-term summary records

use std::borrow::Cow;
use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Compressed representation of a contiguous batch of turns.
///
/// Every field is derived from the source turns, so summarizing the same batch
/// twice yields equal summaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    #[serde(default)]
    pub period_label: String,
    #[serde(default)]
    pub topics: Vec<String>,
    pub digest_text: String,
    pub source_turn_count: usize,
    #[serde(default)]
    pub total_tokens: u32,
}

impl Summary {
    /// Text used when ranking the summary against a query: the digest, plus
    /// any topic the digest does not already mention. Each topic counts once.
    pub fn search_text(&self) -> Cow<'_, str> {
        let digest_words: HashSet<String> = self
            .digest_text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|word| !word.is_empty())
            .map(str::to_lowercase)
            .collect();
        let missing: Vec<&str> = self
            .topics
            .iter()
            .map(String::as_str)
            .filter(|topic| !digest_words.contains(&topic.to_lowercase()))
            .collect();

        if missing.is_empty() {
            return Cow::Borrowed(&self.digest_text);
        }
        Cow::Owned(format!("{} {}", self.digest_text, missing.join(" ")))
    }

    pub fn covers(&self, timestamp: DateTime<Utc>) -> bool {
        self.period_start <= timestamp && timestamp <= self.period_end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn make_summary(topics: Vec<&str>) -> Summary {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        Summary {
            period_start: start,
            period_end: end,
            period_label: "session".into(),
            topics: topics.into_iter().map(String::from).collect(),
            digest_text: "session: 2 turns about pizza.".into(),
            source_turn_count: 2,
            total_tokens: 12,
        }
    }

    #[test]
    fn test_search_text_counts_each_topic_once() {
        let summary = make_summary(vec!["pizza", "toppings"]);
        let text = summary.search_text();
        assert_eq!(text.matches("pizza").count(), 1);
        assert!(text.ends_with(" toppings"));
        assert!(text.starts_with("session: 2 turns"));

        let covered = make_summary(vec!["pizza"]);
        assert!(matches!(covered.search_text(), Cow::Borrowed(_)));
        assert_eq!(covered.search_text(), covered.digest_text);
    }

    #[test]
    fn test_covers() {
        let summary = make_summary(vec![]);
        assert!(summary.covers(Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap()));
        assert!(!summary.covers(Utc.with_ymd_and_hms(2024, 5, 1, 11, 0, 0).unwrap()));
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let json = serde_json::json!({
            "period_start": "2024-05-01T09:00:00Z",
            "period_end": "2024-05-01T10:00:00Z",
            "digest_text": "digest",
            "source_turn_count": 3
        });
        let summary: Summary = serde_json::from_value(json).unwrap();
        assert!(summary.topics.is_empty());
        assert_eq!(summary.total_tokens, 0);
        assert_eq!(summary.source_turn_count, 3);
    }
}
