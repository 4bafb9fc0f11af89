//! Token-overlap scoring against the corpus.
//!
//! A sentence found verbatim (case and whitespace folded) inside a corpus
//! text scores 100. Otherwise the score is the share of the sentence's
//! distinct words that also occur in the document.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use super::{LocalMatch, LocalMatcher};
use crate::corpus::{CorpusDocument, CorpusSnapshot};

static RE_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").unwrap());

struct PreparedDocument {
    document: CorpusDocument,
    folded: String,
    tokens: HashSet<String>,
}

pub struct TokenOverlapMatcher {
    documents: Vec<PreparedDocument>,
}

impl TokenOverlapMatcher {
    pub fn new(snapshot: &CorpusSnapshot) -> Self {
        let documents = snapshot
            .entries()
            .iter()
            .map(|entry| {
                let folded = fold(&entry.text);
                let tokens = tokens(&folded);
                PreparedDocument {
                    document: entry.document.clone(),
                    folded,
                    tokens,
                }
            })
            .collect();

        Self { documents }
    }
}

/// Lowercases and collapses whitespace runs to single spaces.
fn fold(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn tokens(folded: &str) -> HashSet<String> {
    RE_WORD
        .find_iter(folded)
        .map(|m| m.as_str().to_string())
        .collect()
}

impl LocalMatcher for TokenOverlapMatcher {
    fn score(&self, sentence: &str, threshold: u8) -> LocalMatch {
        let folded = fold(sentence);
        let sentence_tokens = tokens(&folded);
        if folded.is_empty() || sentence_tokens.is_empty() {
            return LocalMatch::none();
        }

        let mut best = LocalMatch::none();
        for prepared in &self.documents {
            if prepared.folded.contains(&folded) {
                return LocalMatch {
                    score: 100.0,
                    document: Some(prepared.document.clone()),
                };
            }

            let shared = sentence_tokens.intersection(&prepared.tokens).count();
            let score = 100.0 * shared as f64 / sentence_tokens.len() as f64;
            if score > best.score {
                best = LocalMatch {
                    score,
                    document: Some(prepared.document.clone()),
                };
                if score >= 100.0 {
                    break;
                }
            }
        }

        if best.score < f64::from(threshold) {
            return LocalMatch::none();
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::test_support::snapshot;

    #[test]
    fn test_verbatim_substring_scores_100() {
        let matcher = TokenOverlapMatcher::new(&snapshot(&[
            ("a", "Unrelated material about gardening and soil."),
            ("b", "Intro.  The Quick brown fox\njumps over the lazy dog. Outro."),
        ]));

        let result = matcher.score("the quick brown fox jumps over the lazy dog.", 75);
        assert_eq!(result.score, 100.0);
        assert_eq!(result.document.unwrap().id, "b");
    }

    #[test]
    fn test_overlap_percentage() {
        let matcher = TokenOverlapMatcher::new(&snapshot(&[(
            "a",
            "alpha beta gamma delta appear in this reference text",
        )]));

        let result = matcher.score("alpha beta gamma delta epsilon", 0);
        assert_eq!(result.score, 80.0);
        assert_eq!(result.document.unwrap().id, "a");
    }

    #[test]
    fn test_best_document_wins() {
        let matcher = TokenOverlapMatcher::new(&snapshot(&[
            ("low", "alpha beta"),
            ("high", "alpha beta gamma delta"),
        ]));

        let result = matcher.score("alpha beta gamma delta epsilon", 50);
        assert_eq!(result.score, 80.0);
        assert_eq!(result.document.unwrap().id, "high");
    }

    #[test]
    fn test_below_threshold_is_no_match() {
        let matcher = TokenOverlapMatcher::new(&snapshot(&[("a", "alpha beta")]));

        let result = matcher.score("alpha beta gamma delta epsilon", 75);
        assert_eq!(result, LocalMatch::none());
    }

    #[test]
    fn test_repeated_words_count_once() {
        let matcher = TokenOverlapMatcher::new(&snapshot(&[("a", "the cat")]));
        let result = matcher.score("the the the cat sat", 0);
        assert!((result.score - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_corpus() {
        let matcher = TokenOverlapMatcher::new(&CorpusSnapshot::default());
        assert_eq!(matcher.score("any sentence at all", 0), LocalMatch::none());
    }
}
