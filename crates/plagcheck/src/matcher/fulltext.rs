//! Relevance-ranked matching over an in-memory SQLite FTS5 index.
//!
//! An exact phrase hit scores 100. Otherwise the top `bm25` rank of an
//! any-word query is scaled by ten and capped at 100. These scores are a
//! relevance signal, not an overlap percentage.

use std::sync::{LazyLock, Mutex};

use regex::Regex;
use rusqlite::{params, Connection, OptionalExtension};

use super::{LocalMatch, LocalMatcher};
use crate::corpus::{CorpusDocument, CorpusSnapshot};
use crate::db::DatabaseError;

static RE_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").unwrap());

const RELEVANCE_SCALE: f64 = 10.0;

pub struct FullTextMatcher {
    conn: Mutex<Connection>,
    documents: Vec<CorpusDocument>,
}

impl FullTextMatcher {
    pub fn new(snapshot: &CorpusSnapshot) -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(
            "CREATE VIRTUAL TABLE corpus_fts USING fts5(body, doc_index UNINDEXED);",
        )?;

        let mut documents = Vec::with_capacity(snapshot.len());
        {
            let mut insert =
                conn.prepare("INSERT INTO corpus_fts (body, doc_index) VALUES (?1, ?2)")?;
            for (index, entry) in snapshot.entries().iter().enumerate() {
                insert.execute(params![entry.text, index as i64])?;
                documents.push(entry.document.clone());
            }
        }

        Ok(Self {
            conn: Mutex::new(conn),
            documents,
        })
    }

    fn top_hit(&self, query: &str) -> Result<Option<(usize, f64)>, DatabaseError> {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        let hit = conn
            .query_row(
                "SELECT doc_index, bm25(corpus_fts) AS relevance FROM corpus_fts
                 WHERE corpus_fts MATCH ?1 ORDER BY relevance LIMIT 1",
                params![query],
                |r| Ok((r.get::<_, i64>(0)? as usize, r.get::<_, f64>(1)?)),
            )
            .optional()?;
        Ok(hit)
    }

    fn lookup(&self, sentence: &str) -> Result<LocalMatch, DatabaseError> {
        let words: Vec<String> = RE_WORD
            .find_iter(&sentence.to_lowercase())
            .map(|m| m.as_str().to_string())
            .collect();
        if words.is_empty() || self.documents.is_empty() {
            return Ok(LocalMatch::none());
        }

        if let Some((index, _)) = self.top_hit(&phrase_query(&words))? {
            return Ok(LocalMatch {
                score: 100.0,
                document: self.documents.get(index).cloned(),
            });
        }

        match self.top_hit(&any_word_query(&words))? {
            Some((index, rank)) => Ok(LocalMatch {
                score: (-rank * RELEVANCE_SCALE).clamp(0.0, 100.0),
                document: self.documents.get(index).cloned(),
            }),
            None => Ok(LocalMatch::none()),
        }
    }
}

fn phrase_query(words: &[String]) -> String {
    format!("\"{}\"", words.join(" "))
}

fn any_word_query(words: &[String]) -> String {
    words
        .iter()
        .map(|w| format!("\"{}\"", w))
        .collect::<Vec<_>>()
        .join(" OR ")
}

impl LocalMatcher for FullTextMatcher {
    fn score(&self, sentence: &str, threshold: u8) -> LocalMatch {
        match self.lookup(sentence) {
            Ok(found) if found.document.is_some() && found.score >= f64::from(threshold) => found,
            Ok(_) => LocalMatch::none(),
            Err(e) => {
                tracing::warn!(error = %e, "Full-text lookup failed; treating as no match");
                LocalMatch::none()
            }
        }
    }
}
