//! Lexical relevance scoring (term frequency weighted by inverse document frequency)

use std::collections::{BTreeSet, HashMap};

use recall_core::ConversationTurn;

use crate::tokenizer::{normalize, term_set};

#[derive(Debug, Clone, Default)]
struct DocumentStats {
    term_counts: HashMap<String, u32>,
}

/// Corpus statistics over a chronologically ordered set of documents.
///
/// Position in the corpus doubles as recency: a later document is a more recent
/// one, and wins ties.
#[derive(Debug, Clone, Default)]
pub struct RelevanceIndex {
    documents: Vec<DocumentStats>,
    document_frequency: HashMap<String, usize>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedDocument {
    pub index: usize,
    pub score: f64,
}

impl RelevanceIndex {
    pub fn build<I, S>(documents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut index = Self::default();
        for document in documents {
            index.push(document.as_ref());
        }
        index
    }

    /// Adds a document at the most recent position, updating document frequencies.
    pub fn push(&mut self, text: &str) {
        let mut stats = DocumentStats::default();
        for term in normalize(text) {
            *stats.term_counts.entry(term).or_insert(0) += 1;
        }
        for term in stats.term_counts.keys() {
            *self.document_frequency.entry(term.clone()).or_insert(0) += 1;
        }
        self.documents.push(stats);
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Smoothed inverse document frequency; zero for terms absent from the corpus.
    pub fn idf(&self, term: &str) -> f64 {
        match self.document_frequency.get(term) {
            Some(&df) if df > 0 => {
                let n = self.documents.len() as f64;
                ((n + 1.0) / (df as f64 + 1.0)).ln() + 1.0
            }
            _ => 0.0,
        }
    }

    pub fn score_terms(&self, query_terms: &BTreeSet<String>, index: usize) -> f64 {
        let Some(stats) = self.documents.get(index) else {
            return 0.0;
        };
        query_terms
            .iter()
            .filter_map(|term| {
                stats
                    .term_counts
                    .get(term)
                    .map(|&tf| tf as f64 * self.idf(term))
            })
            .sum()
    }

    pub fn score(&self, query: &str, index: usize) -> f64 {
        self.score_terms(&term_set(query), index)
    }

    /// Top `limit` documents by score, ties broken by recency. Documents scoring
    /// zero are never returned, even to fill the limit.
    pub fn rank(&self, query: &str, limit: usize) -> Vec<RankedDocument> {
        self.rank_where(query, limit, |_| true)
    }

    /// Like [`rank`](Self::rank), but only documents whose position passes
    /// `eligible` are returned. Term weights still come from the whole corpus.
    pub fn rank_where<F>(&self, query: &str, limit: usize, eligible: F) -> Vec<RankedDocument>
    where
        F: Fn(usize) -> bool,
    {
        let query_terms = term_set(query);
        if limit == 0 || query_terms.is_empty() || self.is_empty() {
            return Vec::new();
        }

        let mut ranked: Vec<RankedDocument> = (0..self.documents.len())
            .filter(|&index| eligible(index))
            .map(|index| RankedDocument {
                index,
                score: self.score_terms(&query_terms, index),
            })
            .filter(|doc| doc.score > 0.0)
            .collect();

        ranked.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| b.index.cmp(&a.index))
        });
        ranked.truncate(limit);
        ranked
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ScoredTurn<'a> {
    pub turn: &'a ConversationTurn,
    pub score: f64,
}

/// Relevance of `turn` to `query`, with corpus statistics taken from `corpus`.
/// Returns 0 when `turn` is not part of the corpus.
pub fn score(query: &str, turn: &ConversationTurn, corpus: &[ConversationTurn]) -> f64 {
    let Some(position) = corpus.iter().position(|t| t.id == turn.id) else {
        return 0.0;
    };
    let index = RelevanceIndex::build(corpus.iter().map(|t| t.text.as_str()));
    index.score(query, position)
}

/// Ranks `turns` (chronological) against `query`.
pub fn search<'a>(query: &str, turns: &'a [ConversationTurn], limit: usize) -> Vec<ScoredTurn<'a>> {
    let index = RelevanceIndex::build(turns.iter().map(|t| t.text.as_str()));
    index
        .rank(query, limit)
        .into_iter()
        .map(|ranked| ScoredTurn {
            turn: &turns[ranked.index],
            score: ranked.score,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pizza_corpus() -> Vec<ConversationTurn> {
        vec![
            ConversationTurn::user("I like pizza"),
            ConversationTurn::user("What's the weather"),
            ConversationTurn::user("Tell me about pizza toppings"),
        ]
    }

    #[test]
    fn test_pizza_scenario_orders_by_score_then_recency() {
        let turns = pizza_corpus();
        let results = search("pizza", &turns, 2);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].turn.text, "Tell me about pizza toppings");
        assert_eq!(results[1].turn.text, "I like pizza");
        assert_eq!(results[0].score, results[1].score);
    }

    #[test]
    fn test_no_overlap_returns_empty() {
        let turns = pizza_corpus();
        assert!(search("quantum chromodynamics", &turns, 5).is_empty());
        assert!(search("", &turns, 5).is_empty());
        assert!(search("the and of", &turns, 5).is_empty());
    }

    #[test]
    fn test_empty_corpus_scores_zero() {
        let index = RelevanceIndex::build(Vec::<String>::new());
        assert!(index.is_empty());
        assert_eq!(index.score("pizza", 0), 0.0);
        assert!(index.rank("pizza", 3).is_empty());
        assert!(search("pizza", &[], 3).is_empty());
    }

    #[test]
    fn test_rarer_terms_weigh_more() {
        let index = RelevanceIndex::build([
            "pizza dough recipe",
            "pizza oven temperature",
            "pizza sauce basil",
            "sourdough starter",
        ]);
        assert!(index.idf("sourdough") > index.idf("pizza"));
        assert_eq!(index.idf("missing"), 0.0);
    }

    #[test]
    fn test_term_frequency_raises_score() {
        let turns = vec![
            ConversationTurn::user("rust compiler"),
            ConversationTurn::user("rust rust rust borrow checker"),
            ConversationTurn::user("gardening tips"),
        ];
        let results = search("rust", &turns, 3);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].turn.text, "rust rust rust borrow checker");
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn test_limit_respected_and_zero_limit() {
        let turns = vec![
            ConversationTurn::user("pizza one"),
            ConversationTurn::user("pizza two"),
            ConversationTurn::user("pizza three"),
        ];
        assert_eq!(search("pizza", &turns, 2).len(), 2);
        assert!(search("pizza", &turns, 0).is_empty());
    }

    #[test]
    fn test_score_is_stable() {
        let turns = pizza_corpus();
        let first = score("pizza toppings", &turns[2], &turns);
        let second = score("pizza toppings", &turns[2], &turns);
        assert!(first > 0.0);
        assert_eq!(first, second);
    }

    #[test]
    fn test_score_for_turn_outside_corpus() {
        let turns = pizza_corpus();
        let stranger = ConversationTurn::user("pizza");
        assert_eq!(score("pizza", &stranger, &turns), 0.0);
    }

    #[test]
    fn test_push_updates_document_frequency() {
        let mut index = RelevanceIndex::build(["pizza"]);
        let before = index.idf("pizza");
        index.push("weather report");
        assert_eq!(index.len(), 2);
        assert!(index.idf("pizza") > before);
    }

    #[test]
    fn test_rank_where_keeps_corpus_weights() {
        let index = RelevanceIndex::build([
            "I love pizza",
            "Great toppings",
            "toppings again",
            "toppings forever",
        ]);
        let ranked = index.rank_where("pizza toppings", 5, |position| position < 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].index, 0);
        assert_eq!(ranked[1].index, 1);
        assert!(ranked[0].score > ranked[1].score);
    }
}
