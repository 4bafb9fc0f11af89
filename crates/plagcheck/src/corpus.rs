//! The reference corpus as seen by the matchers.
//!
//! Matchers never query storage per sentence. A [`CorpusSnapshot`] is
//! loaded once per job from a [`CorpusSource`] and shared read-only by
//! every sentence of that job.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{corpus_repo, Database, DatabaseError};
use crate::error::StorageError;
use crate::processor::{sanitize_for_storage, ProcessorRegistry};
use crate::sanitize::{redact_path, sanitize_filename};

/// Directory under the media root holding imported reference documents.
pub const CORPUS_DIR: &str = "corpus";

/// Indexing state of a corpus document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexStatus {
    Pending,
    Indexed,
    Failed,
}

impl IndexStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexStatus::Pending => "pending",
            IndexStatus::Indexed => "indexed",
            IndexStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(IndexStatus::Pending),
            "indexed" => Some(IndexStatus::Indexed),
            "failed" => Some(IndexStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusDocument {
    pub id: String,
    pub filename: String,
    pub title: String,
    pub author: Option<String>,
    pub year: Option<u16>,
    /// Location of the original reference file.
    pub file_path: String,
    /// Pre-extracted plain text, absolute or relative to the media root.
    pub extracted_text_path: Option<String>,
    pub status: IndexStatus,
}

/// Read-only access to the documents that take part in matching.
pub trait CorpusSource: Send + Sync {
    fn indexed_documents(&self) -> Result<Vec<CorpusDocument>, DatabaseError>;
}

impl CorpusSource for Database {
    fn indexed_documents(&self) -> Result<Vec<CorpusDocument>, DatabaseError> {
        corpus_repo::list_indexed(self)
    }
}

/// An indexed document together with its text.
#[derive(Debug, Clone)]
pub struct CorpusEntry {
    pub document: CorpusDocument,
    pub text: String,
}

/// The indexed corpus of one job, texts already in memory.
#[derive(Debug, Clone, Default)]
pub struct CorpusSnapshot {
    entries: Vec<CorpusEntry>,
}

impl CorpusSnapshot {
    pub fn new(entries: Vec<CorpusEntry>) -> Self {
        Self { entries }
    }

    /// Loads every indexed document's text. Documents without a text
    /// pointer or whose text cannot be read are skipped.
    pub fn load(source: &dyn CorpusSource, media_root: &Path) -> Result<Self, DatabaseError> {
        let _span = tracing::info_span!("corpus.snapshot").entered();

        let mut entries = Vec::new();
        for document in source.indexed_documents()? {
            if document.status != IndexStatus::Indexed {
                continue;
            }

            let Some(text_path) = document.extracted_text_path.as_deref() else {
                tracing::warn!(document_id = %document.id, "Indexed document has no extracted text");
                continue;
            };

            let path = resolve(media_root, text_path);
            match std::fs::read(&path) {
                Ok(bytes) => {
                    let text = sanitize_for_storage(&String::from_utf8_lossy(&bytes));
                    entries.push(CorpusEntry { document, text });
                }
                Err(e) => {
                    tracing::warn!(
                        document_id = %document.id,
                        path = %redact_path(&path),
                        error = %e,
                        "Skipping unreadable corpus text"
                    );
                }
            }
        }

        tracing::debug!(documents = entries.len(), "Corpus snapshot loaded");
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[CorpusEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Descriptive fields supplied when a reference document is imported.
#[derive(Debug, Clone, Default)]
pub struct CorpusMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub year: Option<u16>,
}

/// Extracts `source` and registers it as an indexed corpus document.
///
/// The original file and its extracted text are copied under
/// `<media_root>/corpus/` so the corpus never depends on the caller's path.
pub fn import(
    db: &Database,
    media_root: &Path,
    source: &Path,
    metadata: CorpusMetadata,
    at: DateTime<Utc>,
) -> crate::error::Result<CorpusDocument> {
    let _span = tracing::info_span!("corpus.import", path = %redact_path(source)).entered();

    let extracted = ProcessorRegistry::new().process_path(source)?;
    let filename = sanitize_filename(
        source
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document"),
    );

    let dir = media_root.join(CORPUS_DIR);
    std::fs::create_dir_all(&dir).map_err(|e| StorageError::CreateDirectory {
        path: dir.clone(),
        source: e,
    })?;

    let id = Uuid::new_v4().to_string();
    let file_pointer = format!("{}/{}.{}", CORPUS_DIR, id, extracted.format.extension());
    let text_pointer = format!("{}/{}.extracted.txt", CORPUS_DIR, id);

    let file_path = media_root.join(&file_pointer);
    std::fs::copy(source, &file_path).map_err(|e| StorageError::WriteFile {
        path: file_path.clone(),
        source: e,
    })?;
    let text_path = media_root.join(&text_pointer);
    std::fs::write(&text_path, extracted.text.as_bytes()).map_err(|e| StorageError::WriteFile {
        path: text_path.clone(),
        source: e,
    })?;

    let title = metadata
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| {
            Path::new(&filename)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("Untitled")
                .to_string()
        });

    let document = CorpusDocument {
        id,
        filename,
        title,
        author: metadata.author.filter(|a| !a.trim().is_empty()),
        year: metadata.year,
        file_path: file_pointer,
        extracted_text_path: Some(text_pointer),
        status: IndexStatus::Indexed,
    };
    corpus_repo::register(db, &document, at)?;

    tracing::info!(document_id = %document.id, chars = extracted.text.chars().count(), "Corpus document imported");
    Ok(document)
}

fn resolve(media_root: &Path, pointer: &str) -> PathBuf {
    let path = Path::new(pointer);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        media_root.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedCorpus(Vec<CorpusDocument>);

    impl CorpusSource for FixedCorpus {
        fn indexed_documents(&self) -> Result<Vec<CorpusDocument>, DatabaseError> {
            Ok(self.0.clone())
        }
    }

    fn document(id: &str, text_path: Option<&str>) -> CorpusDocument {
        CorpusDocument {
            id: id.to_string(),
            filename: format!("{}.pdf", id),
            title: id.to_string(),
            author: None,
            year: None,
            file_path: format!("corpus/{}.pdf", id),
            extracted_text_path: text_path.map(str::to_string),
            status: IndexStatus::Indexed,
        }
    }

    #[test]
    fn test_load_skips_missing_and_unreadable_texts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("corpus")).unwrap();
        std::fs::write(dir.path().join("corpus/a.txt"), "Reference text A").unwrap();
        let absolute = dir.path().join("b.txt");
        std::fs::write(&absolute, "Reference text B").unwrap();

        let source = FixedCorpus(vec![
            document("a", Some("corpus/a.txt")),
            document("b", Some(absolute.to_str().unwrap())),
            document("gone", Some("corpus/gone.txt")),
            document("none", None),
        ]);

        let snapshot = CorpusSnapshot::load(&source, dir.path()).unwrap();
        let ids: Vec<&str> = snapshot
            .entries()
            .iter()
            .map(|e| e.document.id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(snapshot.entries()[0].text, "Reference text A");
    }

    #[test]
    fn test_load_ignores_non_indexed_rows() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "text").unwrap();
        let mut pending = document("a", Some("a.txt"));
        pending.status = IndexStatus::Pending;

        let snapshot = CorpusSnapshot::load(&FixedCorpus(vec![pending]), dir.path()).unwrap();
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_database_is_a_corpus_source() {
        let db = Database::open_in_memory().unwrap();
        corpus_repo::register(&db, &document("a", Some("a.txt")), chrono::Utc::now()).unwrap();
        let docs = db.indexed_documents().unwrap();
        assert_eq!(docs.len(), 1);
    }

    #[test]
    fn test_import_registers_indexed_document() {
        let media = tempfile::tempdir().unwrap();
        let input_dir = tempfile::tempdir().unwrap();
        let source = input_dir.path().join("plant notes.txt");
        std::fs::write(&source, "Chlorophyll absorbs mostly blue and red light.").unwrap();
        let db = Database::open_in_memory().unwrap();

        let document = import(
            &db,
            media.path(),
            &source,
            CorpusMetadata {
                title: None,
                author: Some("R. Green".to_string()),
                year: Some(2019),
            },
            chrono::Utc::now(),
        )
        .unwrap();

        assert_eq!(document.title, "plant notes");
        assert_eq!(document.status, IndexStatus::Indexed);
        assert!(media.path().join(&document.file_path).is_file());

        let snapshot = CorpusSnapshot::load(&db, media.path()).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.entries()[0].text, "Chlorophyll absorbs mostly blue and red light.");
        assert_eq!(snapshot.entries()[0].document.author.as_deref(), Some("R. Green"));
    }
}
