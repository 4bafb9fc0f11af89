//! Read access to the indexed reference corpus.
//!
//! Corpus documents are managed by separate tooling; the pipeline only
//! lists `indexed` rows. `register` and `set_status` exist for that
//! tooling and for tests.

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Row};

use super::{timestamp, Database, DatabaseError};
use crate::corpus::{CorpusDocument, IndexStatus};

impl ToSql for IndexStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for IndexStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        IndexStatus::parse(text)
            .ok_or_else(|| FromSqlError::Other(format!("unknown index status '{}'", text).into()))
    }
}

fn document_from_row(row: &Row<'_>) -> Result<CorpusDocument, rusqlite::Error> {
    Ok(CorpusDocument {
        id: row.get("id")?,
        filename: row.get("filename")?,
        title: row.get("title")?,
        author: row.get("author")?,
        year: row.get("year")?,
        file_path: row.get("file_path")?,
        extracted_text_path: row.get("extracted_text_path")?,
        status: row.get("status")?,
    })
}

/// Adds a corpus document row.
pub fn register(db: &Database, document: &CorpusDocument, at: DateTime<Utc>) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO corpus_documents
             (id, filename, title, author, year, file_path, extracted_text_path, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                document.id,
                document.filename,
                document.title,
                document.author,
                document.year,
                document.file_path,
                document.extracted_text_path,
                document.status,
                timestamp(at),
            ],
        )?;
        Ok(())
    })
}

pub fn set_status(db: &Database, id: &str, status: IndexStatus) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE corpus_documents SET status = ?2 WHERE id = ?1",
            params![id, status],
        )?;
        Ok(())
    })
}

/// All documents whose indexing finished, oldest first.
pub fn list_indexed(db: &Database) -> Result<Vec<CorpusDocument>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM corpus_documents WHERE status = 'indexed' ORDER BY created_at, rowid",
        )?;
        let rows = stmt
            .query_map([], document_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
