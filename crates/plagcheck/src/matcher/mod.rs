//! Sentence matchers.
//!
//! Local matchers score a sentence against the corpus snapshot of the
//! current job. The internet matcher asks a web search provider for an
//! exact-phrase hit. Scores are percentages in `0.0..=100.0`.

pub mod fulltext;
pub mod internet;
pub mod local;
pub mod search;

use crate::config::LocalStrategy;
use crate::corpus::{CorpusDocument, CorpusSnapshot};
use crate::db::DatabaseError;

pub use fulltext::FullTextMatcher;
pub use internet::{InternetMatch, InternetMatcher};
pub use local::TokenOverlapMatcher;
pub use search::{SearchError, WebSearch};

/// Best local match for one sentence.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalMatch {
    pub score: f64,
    pub document: Option<CorpusDocument>,
}

impl LocalMatch {
    pub fn none() -> Self {
        Self {
            score: 0.0,
            document: None,
        }
    }
}

/// Scores sentences against a fixed corpus.
///
/// Results below `threshold` are reported as [`LocalMatch::none`].
pub trait LocalMatcher: Send + Sync {
    fn score(&self, sentence: &str, threshold: u8) -> LocalMatch;
}

/// Builds the matcher for the configured strategy over `snapshot`.
pub fn local_matcher(
    strategy: LocalStrategy,
    snapshot: &CorpusSnapshot,
) -> Result<Box<dyn LocalMatcher>, DatabaseError> {
    Ok(match strategy {
        LocalStrategy::TokenOverlap => Box::new(TokenOverlapMatcher::new(snapshot)),
        LocalStrategy::FullText => Box::new(FullTextMatcher::new(snapshot)?),
    })
}
