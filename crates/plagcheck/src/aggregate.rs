//! Per-sentence scoring and document-level similarity.
//!
//! Each sentence is scored locally and, unless the local score is already
//! 100, on the web. A sentence whose better score reaches the threshold is
//! plagiarized. `similarity_global` counts plagiarized sentences once, so
//! it is not the sum of the local and internet percentages.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::corpus::CorpusDocument;
use crate::matcher::{InternetMatcher, LocalMatcher};

#[derive(Error, Debug)]
pub enum AggregateError {
    #[error("No valid sentences were found in the document.")]
    NoSentences,
}

/// Which channels a check uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckMode {
    Local,
    Internet,
    #[default]
    Both,
}

impl CheckMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckMode::Local => "local",
            CheckMode::Internet => "internet",
            CheckMode::Both => "both",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "local" => Some(CheckMode::Local),
            "internet" => Some(CheckMode::Internet),
            "both" => Some(CheckMode::Both),
            _ => None,
        }
    }

    pub fn includes_local(&self) -> bool {
        matches!(self, CheckMode::Local | CheckMode::Both)
    }

    pub fn includes_internet(&self) -> bool {
        matches!(self, CheckMode::Internet | CheckMode::Both)
    }
}

impl std::fmt::Display for CheckMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CheckMode::parse(&s.to_lowercase())
            .ok_or_else(|| format!("unknown mode '{}', expected local, internet or both", s))
    }
}

/// Channel that produced a sentence's final score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Attribution {
    Local,
    Internet,
}

impl Attribution {
    pub fn label(&self) -> &'static str {
        match self {
            Attribution::Local => "Local",
            Attribution::Internet => "Internet",
        }
    }
}

/// Where a plagiarized sentence was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum MatchMetadata {
    Local {
        document_id: String,
        title: String,
        author: Option<String>,
        year: Option<u16>,
    },
    Internet {
        url: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceResult {
    pub text: String,
    pub score_local: f64,
    pub score_internet: f64,
    pub final_score: f64,
    pub plagiarized: bool,
    pub attribution: Attribution,
    pub metadata: Option<MatchMetadata>,
}

/// A corpus document's contribution to one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub document_id: String,
    pub title: String,
    pub author: Option<String>,
    pub year: Option<u16>,
    pub file_path: String,
    /// Sentences of the job attributed to this document.
    pub count: u32,
}

impl SourceRef {
    fn from_document(document: &CorpusDocument) -> Self {
        Self {
            document_id: document.id.clone(),
            title: document.title.clone(),
            author: document.author.clone(),
            year: document.year,
            file_path: document.file_path.clone(),
            count: 0,
        }
    }
}

/// Deduplicated sources of one job, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedSources {
    pub local: Vec<SourceRef>,
    pub internet: Vec<String>,
}

impl MatchedSources {
    pub fn is_empty(&self) -> bool {
        self.local.is_empty() && self.internet.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregationResult {
    /// Plagiarized sentences only, in document order.
    pub results: Vec<SentenceResult>,
    pub total_sentences: usize,
    pub similarity_local: u8,
    pub similarity_internet: u8,
    pub similarity_global: u8,
    pub sources: MatchedSources,
}

/// Truncating integer percentage of `count` over `total`.
fn percentage(count: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    (100 * count / total).min(100) as u8
}

/// Collects SourceRefs keyed by document id.
#[derive(Default)]
struct SourceTally {
    index: HashMap<String, usize>,
    local: Vec<SourceRef>,
    seen_urls: HashSet<String>,
    internet: Vec<String>,
}

impl SourceTally {
    fn record_local(&mut self, document: &CorpusDocument) {
        let position = match self.index.get(&document.id) {
            Some(&position) => position,
            None => {
                self.local.push(SourceRef::from_document(document));
                self.index.insert(document.id.clone(), self.local.len() - 1);
                self.local.len() - 1
            }
        };
        self.local[position].count += 1;
    }

    fn record_url(&mut self, url: &str) {
        if self.seen_urls.insert(url.to_string()) {
            self.internet.push(url.to_string());
        }
    }

    fn finish(self) -> MatchedSources {
        MatchedSources {
            local: self.local,
            internet: self.internet,
        }
    }
}

/// Runs the matchers over a job's sentences.
pub struct Aggregator<'a> {
    local: &'a dyn LocalMatcher,
    internet: &'a InternetMatcher,
    threshold: u8,
}

impl<'a> Aggregator<'a> {
    pub fn new(local: &'a dyn LocalMatcher, internet: &'a InternetMatcher, threshold: u8) -> Self {
        Self {
            local,
            internet,
            threshold,
        }
    }

    /// Scores every sentence in order. `on_sentence(done, total)` is called
    /// after each sentence.
    pub fn aggregate(
        &self,
        sentences: &[String],
        mode: CheckMode,
        on_sentence: &mut dyn FnMut(usize, usize),
    ) -> Result<AggregationResult, AggregateError> {
        let total = sentences.len();
        if total == 0 {
            return Err(AggregateError::NoSentences);
        }

        let threshold = f64::from(self.threshold);
        let mut tally = SourceTally::default();
        let mut results = Vec::new();
        let mut local_hits = 0usize;
        let mut internet_hits = 0usize;

        for (i, sentence) in sentences.iter().enumerate() {
            let mut score_local = 0.0;
            let mut local_document = None;
            if mode.includes_local() {
                let found = self.local.score(sentence, self.threshold);
                score_local = found.score;
                if score_local >= threshold {
                    local_hits += 1;
                    if let Some(document) = &found.document {
                        tally.record_local(document);
                    }
                }
                local_document = found.document;
            }

            let mut score_internet = 0.0;
            let mut url = None;
            if mode.includes_internet() && score_local < 100.0 {
                let found = self.internet.check(sentence);
                score_internet = found.score;
                if score_internet >= threshold {
                    internet_hits += 1;
                    if let Some(found_url) = &found.url {
                        tally.record_url(found_url);
                    }
                }
                url = found.url;
            }

            let final_score = score_local.max(score_internet);
            if final_score >= threshold {
                let attribution = if score_local >= score_internet {
                    Attribution::Local
                } else {
                    Attribution::Internet
                };
                let metadata = match attribution {
                    Attribution::Local => local_document.map(|d| MatchMetadata::Local {
                        document_id: d.id,
                        title: d.title,
                        author: d.author,
                        year: d.year,
                    }),
                    Attribution::Internet => url.map(|url| MatchMetadata::Internet { url }),
                };

                results.push(SentenceResult {
                    text: sentence.clone(),
                    score_local,
                    score_internet,
                    final_score,
                    plagiarized: true,
                    attribution,
                    metadata,
                });
            }

            on_sentence(i + 1, total);
        }

        let plagiarized = results.len();
        tracing::debug!(
            total,
            plagiarized,
            local_hits,
            internet_hits,
            "Aggregation finished"
        );

        Ok(AggregationResult {
            results,
            total_sentences: total,
            similarity_local: percentage(local_hits, total),
            similarity_internet: percentage(internet_hits, total),
            similarity_global: percentage(plagiarized, total),
            sources: tally.finish(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::IndexStatus;
    use crate::matcher::search::{SearchError, WebSearch};
    use crate::matcher::LocalMatch;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn document(id: &str) -> CorpusDocument {
        CorpusDocument {
            id: id.to_string(),
            filename: format!("{}.pdf", id),
            title: format!("Title {}", id),
            author: Some("Writer".to_string()),
            year: Some(2021),
            file_path: format!("corpus/{}.pdf", id),
            extracted_text_path: None,
            status: IndexStatus::Indexed,
        }
    }

    /// Local scores keyed by sentence text.
    struct ScriptedLocal(Vec<(&'static str, f64, Option<&'static str>)>);

    impl LocalMatcher for ScriptedLocal {
        fn score(&self, sentence: &str, threshold: u8) -> LocalMatch {
            self.0
                .iter()
                .find(|(text, _, _)| *text == sentence)
                .filter(|(_, score, _)| *score >= f64::from(threshold))
                .map(|(_, score, doc)| LocalMatch {
                    score: *score,
                    document: doc.map(document),
                })
                .unwrap_or_else(LocalMatch::none)
        }
    }

    /// Web hits keyed by a substring of the quoted query.
    struct ScriptedWeb {
        hits: Vec<(&'static str, &'static str)>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedWeb {
        fn new(hits: Vec<(&'static str, &'static str)>) -> Arc<Self> {
            Arc::new(Self {
                hits,
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    impl WebSearch for ScriptedWeb {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn search(&self, query: &str, _limit: usize) -> Result<Vec<String>, SearchError> {
            self.calls.lock().unwrap().push(query.to_string());
            Ok(self
                .hits
                .iter()
                .filter(|(needle, _)| query.contains(needle))
                .map(|(_, url)| url.to_string())
                .collect())
        }
    }

    fn sentences(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|s| s.to_string()).collect()
    }

    fn internet(web: Arc<ScriptedWeb>) -> InternetMatcher {
        InternetMatcher::new(web, 3, Duration::ZERO)
    }

    #[test]
    fn test_zero_sentences_is_an_error() {
        let local = ScriptedLocal(vec![]);
        let web = internet(ScriptedWeb::new(vec![]));
        let aggregator = Aggregator::new(&local, &web, 75);
        assert!(matches!(
            aggregator.aggregate(&[], CheckMode::Both, &mut |_, _| {}),
            Err(AggregateError::NoSentences)
        ));
    }

    #[test]
    fn test_two_of_five_local_hits() {
        let local = ScriptedLocal(vec![("s1", 100.0, Some("d1")), ("s3", 80.0, Some("d1"))]);
        let web = internet(ScriptedWeb::new(vec![]));
        let aggregator = Aggregator::new(&local, &web, 75);

        let result = aggregator
            .aggregate(&sentences(&["s1", "s2", "s3", "s4", "s5"]), CheckMode::Both, &mut |_, _| {})
            .unwrap();

        assert_eq!(result.total_sentences, 5);
        assert_eq!(result.similarity_local, 40);
        assert_eq!(result.similarity_internet, 0);
        assert_eq!(result.similarity_global, 40);
        assert_eq!(result.results.len(), 2);
        assert_eq!(result.sources.local.len(), 1);
        assert_eq!(result.sources.local[0].count, 2);
        assert!(result.results.iter().all(|r| r.plagiarized));
    }

    #[test]
    fn test_exact_local_match_skips_web_search() {
        let local = ScriptedLocal(vec![("copied verbatim", 100.0, Some("d1"))]);
        let web = ScriptedWeb::new(vec![("copied", "https://web.example")]);
        let matcher = internet(web.clone());
        let aggregator = Aggregator::new(&local, &matcher, 75);

        let result = aggregator
            .aggregate(&sentences(&["copied verbatim", "fresh text"]), CheckMode::Both, &mut |_, _| {})
            .unwrap();

        let calls = web.calls.lock().unwrap();
        assert_eq!(calls.as_slice(), ["\"fresh text\""]);
        assert_eq!(result.results[0].score_internet, 0.0);
        assert_eq!(result.results[0].attribution, Attribution::Local);
    }

    #[test]
    fn test_global_counts_unique_sentences() {
        let local = ScriptedLocal(vec![("both", 90.0, Some("d1"))]);
        let web = internet(ScriptedWeb::new(vec![("both", "https://web.example")]));
        let aggregator = Aggregator::new(&local, &web, 75);

        let result = aggregator
            .aggregate(&sentences(&["both", "none"]), CheckMode::Both, &mut |_, _| {})
            .unwrap();

        assert_eq!(result.similarity_local, 50);
        assert_eq!(result.similarity_internet, 50);
        assert_eq!(result.similarity_global, 50);
        let only = &result.results[0];
        assert_eq!(only.final_score, 100.0);
        assert_eq!(only.attribution, Attribution::Internet);
        assert_eq!(
            only.metadata,
            Some(MatchMetadata::Internet {
                url: "https://web.example".to_string()
            })
        );
    }

    #[test]
    fn test_modes_limit_channels() {
        let local = ScriptedLocal(vec![("a", 100.0, Some("d1"))]);
        let web = ScriptedWeb::new(vec![("b", "https://web.example")]);
        let matcher = internet(web.clone());
        let aggregator = Aggregator::new(&local, &matcher, 75);
        let input = sentences(&["a", "b"]);

        let local_only = aggregator.aggregate(&input, CheckMode::Local, &mut |_, _| {}).unwrap();
        assert_eq!(local_only.similarity_global, 50);
        assert!(web.calls.lock().unwrap().is_empty());

        let web_only = aggregator
            .aggregate(&input, CheckMode::Internet, &mut |_, _| {})
            .unwrap();
        assert_eq!(web_only.similarity_local, 0);
        assert_eq!(web_only.similarity_internet, 50);
        assert_eq!(web_only.sources.internet, vec!["https://web.example"]);
    }

    #[test]
    fn test_urls_are_deduplicated_in_order() {
        let local = ScriptedLocal(vec![]);
        let web = internet(ScriptedWeb::new(vec![
            ("one", "https://x.example"),
            ("two", "https://y.example"),
            ("three", "https://x.example"),
        ]));
        let aggregator = Aggregator::new(&local, &web, 75);

        let result = aggregator
            .aggregate(&sentences(&["one", "two", "three"]), CheckMode::Internet, &mut |_, _| {})
            .unwrap();
        assert_eq!(
            result.sources.internet,
            vec!["https://x.example", "https://y.example"]
        );
        assert_eq!(result.similarity_internet, 100);
    }

    #[test]
    fn test_percentages_truncate() {
        let local = ScriptedLocal(vec![("a", 100.0, Some("d1")), ("b", 100.0, Some("d2"))]);
        let web = internet(ScriptedWeb::new(vec![]));
        let aggregator = Aggregator::new(&local, &web, 75);

        let result = aggregator
            .aggregate(&sentences(&["a", "b", "c"]), CheckMode::Local, &mut |_, _| {})
            .unwrap();
        assert_eq!(result.similarity_local, 66);
        assert_eq!(result.sources.local.len(), 2);
    }

    #[test]
    fn test_progress_callback_sees_every_sentence() {
        let local = ScriptedLocal(vec![]);
        let web = internet(ScriptedWeb::new(vec![]));
        let aggregator = Aggregator::new(&local, &web, 75);

        let mut seen = Vec::new();
        aggregator
            .aggregate(&sentences(&["a", "b", "c"]), CheckMode::Local, &mut |done, total| {
                seen.push((done, total))
            })
            .unwrap();
        assert_eq!(seen, vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[test]
    fn test_check_mode_parsing() {
        assert_eq!("BOTH".parse::<CheckMode>().unwrap(), CheckMode::Both);
        assert_eq!("local".parse::<CheckMode>().unwrap(), CheckMode::Local);
        assert!("web".parse::<CheckMode>().is_err());
        assert!(CheckMode::Both.includes_local() && CheckMode::Both.includes_internet());
        assert!(!CheckMode::Local.includes_internet());
    }

    #[test]
    fn test_matched_sources_serialization_shape() {
        let sources = MatchedSources {
            local: vec![SourceRef::from_document(&document("d1"))],
            internet: vec!["https://x.example".to_string()],
        };
        let json = serde_json::to_value(&sources).unwrap();
        assert_eq!(json["local"][0]["document_id"], "d1");
        assert_eq!(json["internet"][0], "https://x.example");
    }
}
