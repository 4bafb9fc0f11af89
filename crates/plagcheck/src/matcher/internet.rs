//! Exact-phrase web matching with a per-matcher request delay.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::search::WebSearch;

/// Outcome of one web lookup: 100 with the first result URL, or 0.
#[derive(Debug, Clone, PartialEq)]
pub struct InternetMatch {
    pub score: f64,
    pub url: Option<String>,
}

impl InternetMatch {
    pub fn none() -> Self {
        Self {
            score: 0.0,
            url: None,
        }
    }
}

pub struct InternetMatcher {
    search: Arc<dyn WebSearch>,
    max_results: usize,
    delay: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl InternetMatcher {
    pub fn new(search: Arc<dyn WebSearch>, max_results: usize, delay: Duration) -> Self {
        if !search.is_enabled() {
            tracing::debug!(provider = search.name(), "Internet matching skipped for this job");
        }
        Self {
            search,
            max_results: max_results.max(1),
            delay,
            last_request: Mutex::new(None),
        }
    }

    /// Searches for the sentence as an exact phrase.
    ///
    /// Provider errors are logged and reported as no match. A disabled
    /// provider is never called and never delays the caller.
    pub fn check(&self, sentence: &str) -> InternetMatch {
        if !self.search.is_enabled() {
            return InternetMatch::none();
        }
        let query = exact_phrase_query(sentence);
        if query.len() <= 2 {
            return InternetMatch::none();
        }

        self.wait_turn();

        match self.search.search(&query, self.max_results) {
            Ok(urls) => match urls.into_iter().next() {
                Some(url) => InternetMatch {
                    score: 100.0,
                    url: Some(url),
                },
                None => InternetMatch::none(),
            },
            Err(e) => {
                tracing::warn!(provider = self.search.name(), error = %e, "Web search failed");
                InternetMatch::none()
            }
        }
    }

    /// Sleeps until `delay` has passed since the previous request.
    fn wait_turn(&self) {
        let mut last = match self.last_request.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.delay {
                std::thread::sleep(self.delay - elapsed);
            }
        }
        *last = Some(Instant::now());
    }
}

/// Wraps the sentence in double quotes, dropping quotes inside it.
fn exact_phrase_query(sentence: &str) -> String {
    let inner: String = sentence
        .chars()
        .filter(|c| !matches!(c, '"' | '“' | '”'))
        .collect();
    format!("\"{}\"", inner.split_whitespace().collect::<Vec<_>>().join(" "))
}
