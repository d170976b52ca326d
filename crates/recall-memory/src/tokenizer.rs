//! Term normalization and stopword filtering

use std::collections::BTreeSet;

/// Tokens shorter than this (in chars) carry no lexical signal.
pub const MIN_TERM_CHARS: usize = 3;

// Sorted so `is_stopword` can binary search. The assistant converses in both
// English and Spanish, so both lists are filtered.
const STOPWORDS: &[&str] = &[
    "about", "above", "after", "again", "all", "also", "and", "any", "are", "because", "been",
    "before", "being", "bien", "both", "but", "can", "como", "con", "could", "del", "desde",
    "did", "does", "doing", "donde", "down", "durante", "each", "ella", "entre", "esta", "este",
    "esto", "está", "few", "for", "from", "fue", "further", "had", "has", "hasta", "have",
    "having", "hay", "her", "here", "hers", "him", "his", "how", "into", "its", "just", "las",
    "los", "mine", "more", "most", "muy", "más", "not", "now", "off", "once", "only", "other",
    "our", "ours", "out", "over", "own", "para", "pero", "por", "puede", "que", "quien", "same",
    "ser", "she", "should", "sin", "sobre", "some", "son", "such", "sus", "también", "than",
    "that", "the", "their", "theirs", "them", "then", "there", "these", "they", "this", "those",
    "through", "todo", "todos", "too", "una", "under", "until", "very", "was", "were", "what",
    "when", "where", "which", "while", "who", "whom", "why", "will", "with", "would", "you",
    "your", "yours",
];

pub fn is_stopword(term: &str) -> bool {
    STOPWORDS.binary_search(&term).is_ok()
}

/// Lower-cases `text`, splits on non-alphanumeric boundaries and drops stopwords
/// and short tokens. Term order follows the input.
pub fn normalize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|raw| !raw.is_empty())
        .map(str::to_lowercase)
        .filter(|term| term.chars().count() >= MIN_TERM_CHARS && !is_stopword(term))
        .collect()
}

/// Distinct normalized terms of `text`.
pub fn term_set(text: &str) -> BTreeSet<String> {
    normalize(text).into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stopwords_sorted() {
        assert!(STOPWORDS.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_normalize_basic() {
        assert_eq!(normalize("I like pizza"), vec!["like", "pizza"]);
        assert_eq!(normalize("What's the weather?"), vec!["weather"]);
        assert_eq!(
            normalize("Tell me about pizza toppings"),
            vec!["tell", "pizza", "toppings"]
        );
    }

    #[test]
    fn test_normalize_lowercases_and_splits_punctuation() {
        assert_eq!(
            normalize("Rust,Tokio;SERDE--rocks"),
            vec!["rust", "tokio", "serde", "rocks"]
        );
    }

    #[test]
    fn test_normalize_empty_and_noise() {
        assert!(normalize("").is_empty());
        assert!(normalize("  ... !! ?? ").is_empty());
        assert!(normalize("a an to of").is_empty());
    }

    #[test]
    fn test_normalize_spanish_stopwords() {
        assert_eq!(
            normalize("Hablemos sobre la receta para una pizza"),
            vec!["hablemos", "receta", "pizza"]
        );
    }

    #[test]
    fn test_normalize_unicode_letters() {
        assert_eq!(normalize("Canción número"), vec!["canción", "número"]);
    }

    #[test]
    fn test_term_set_deduplicates() {
        let terms = term_set("pizza pizza PIZZA toppings");
        assert_eq!(terms.len(), 2);
        assert!(terms.contains("pizza"));
        assert!(terms.contains("toppings"));
    }
}
