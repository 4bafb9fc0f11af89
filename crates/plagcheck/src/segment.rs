//! Sentence segmentation.
//!
//! A rule-based tokenizer finds sentence boundaries at `.`, `!` and `?`
//! followed by whitespace and a plausible sentence start, ignoring known
//! abbreviations and initials for the configured language. When the
//! tokenizer cannot be built the segmenter falls back to splitting on
//! periods. Both paths apply the same noise filters.

use std::collections::HashSet;

use thiserror::Error;

/// Fragments of this many characters or fewer are dropped.
pub const MIN_SENTENCE_CHARS: usize = 10;

/// Fragments with fewer whitespace-separated tokens are dropped.
pub const MIN_SENTENCE_WORDS: usize = 3;

const ENGLISH_ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "vs", "etc", "e.g", "i.e", "fig", "figs",
    "no", "nos", "vol", "vols", "pp", "p", "al", "inc", "ltd", "co", "corp", "dept", "approx",
    "est", "ed", "eds", "jan", "feb", "mar", "apr", "jun", "jul", "aug", "sep", "sept", "oct",
    "nov", "dec", "cf", "ch", "sec", "u.s", "ph.d",
];

const INDONESIAN_ABBREVIATIONS: &[&str] = &[
    "dr", "drs", "dra", "prof", "ir", "h", "hj", "no", "hlm", "dll", "dsb", "dst", "tsb", "yth",
    "sdr", "sdri", "bpk", "ibu", "jl", "kab", "kec", "kel", "tgl", "telp", "dkk", "st", "s.pd",
    "m.pd", "s.t", "m.t", "s.kom", "m.kom", "m.si", "s.h", "m.h", "s.e", "vol", "thn",
];

#[derive(Error, Debug)]
pub enum SegmentError {
    #[error("No sentence tokenizer available for language '{0}'")]
    UnsupportedLanguage(String),
}

/// Boundary detector for one language.
#[derive(Debug, Clone)]
pub struct SentenceTokenizer {
    abbreviations: HashSet<&'static str>,
}

impl SentenceTokenizer {
    /// Builds the tokenizer for a language name or ISO 639-1 code.
    pub fn for_language(language: &str) -> Result<Self, SegmentError> {
        let list = match language.trim().to_lowercase().as_str() {
            "english" | "en" => ENGLISH_ABBREVIATIONS,
            "indonesian" | "id" => INDONESIAN_ABBREVIATIONS,
            _ => return Err(SegmentError::UnsupportedLanguage(language.to_string())),
        };

        Ok(Self {
            abbreviations: list.iter().copied().collect(),
        })
    }

    /// Splits text into raw sentences without applying noise filters.
    pub fn split(&self, text: &str) -> Vec<String> {
        let chars: Vec<(usize, char)> = text.char_indices().collect();
        let n = chars.len();
        let mut sentences = Vec::new();
        let mut start = 0usize;
        let mut i = 0usize;

        while i < n {
            let c = chars[i].1;
            if !matches!(c, '.' | '!' | '?') {
                i += 1;
                continue;
            }

            let mut j = i + 1;
            while j < n && matches!(chars[j].1, '.' | '!' | '?') {
                j += 1;
            }
            while j < n && is_closing(chars[j].1) {
                j += 1;
            }

            if j < n && !chars[j].1.is_whitespace() {
                i = j;
                continue;
            }

            let mut k = j;
            while k < n && chars[k].1.is_whitespace() {
                k += 1;
            }

            let next_starts_sentence = k >= n || is_sentence_start(chars[k].1);
            if !next_starts_sentence || (c == '.' && self.is_abbreviation(text, chars[i].0)) {
                i = j;
                continue;
            }

            let end = if j < n { chars[j].0 } else { text.len() };
            push_trimmed(&mut sentences, &text[start..end]);
            start = if k < n { chars[k].0 } else { text.len() };
            i = k;
        }

        if start < text.len() {
            push_trimmed(&mut sentences, &text[start..]);
        }

        sentences
    }

    /// Whether the word ending right before the period at `dot` is an
    /// abbreviation or an initial.
    fn is_abbreviation(&self, text: &str, dot: usize) -> bool {
        let before = &text[..dot];
        let word_start = before
            .rfind(|ch: char| ch.is_whitespace())
            .map(|p| p + 1)
            .unwrap_or(0);
        let word = before[word_start..]
            .trim_start_matches(|ch: char| matches!(ch, '(' | '[' | '"' | '\'' | '“' | '‘'))
            .to_lowercase();

        if word.is_empty() {
            return false;
        }

        let mut letters = word.chars();
        if let (Some(first), None) = (letters.next(), letters.next()) {
            if first.is_alphabetic() {
                return true;
            }
        }

        self.abbreviations.contains(word.as_str())
    }
}

fn is_closing(c: char) -> bool {
    matches!(c, '"' | '\'' | ')' | ']' | '”' | '’' | '»')
}

fn is_sentence_start(c: char) -> bool {
    c.is_uppercase()
        || c.is_numeric()
        || matches!(c, '"' | '\'' | '(' | '[' | '“' | '‘' | '«')
        || (c.is_alphabetic() && !c.is_lowercase())
}

fn push_trimmed(out: &mut Vec<String>, piece: &str) {
    let trimmed = piece.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

/// Whether a fragment is long enough to be checked as a sentence.
pub fn is_checkable(sentence: &str) -> bool {
    sentence.chars().count() > MIN_SENTENCE_CHARS
        && sentence.split_whitespace().count() >= MIN_SENTENCE_WORDS
}

/// Turns clean text into the ordered list of sentences to check.
pub struct Segmenter {
    tokenizer: Option<SentenceTokenizer>,
}

impl Segmenter {
    pub fn new(language: &str) -> Self {
        match SentenceTokenizer::for_language(language) {
            Ok(tokenizer) => Self {
                tokenizer: Some(tokenizer),
            },
            Err(e) => {
                tracing::warn!(error = %e, "Sentence tokenizer unavailable; splitting on periods");
                Self { tokenizer: None }
            }
        }
    }

    /// Returns the checkable sentences of `text` in document order.
    pub fn segment(&self, text: &str) -> Vec<String> {
        let raw = match &self.tokenizer {
            Some(tokenizer) => tokenizer.split(text),
            None => text.split('.').map(|s| s.trim().to_string()).collect(),
        };

        raw.into_iter().filter(|s| is_checkable(s)).collect()
    }

    pub fn uses_fallback(&self) -> bool {
        self.tokenizer.is_none()
    }
}
