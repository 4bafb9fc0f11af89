//! Job repository: lifecycle operations for the `jobs` history table.
//!
//! Rows are created by admission in `pending` state and only ever moved
//! forward (`pending -> processing -> completed | failed`). Records are
//! never deleted; report artifacts are tracked by the `report_deleted*`
//! columns instead.

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::{get_json, get_timestamp, timestamp, Database, DatabaseError};
use crate::aggregate::{CheckMode, MatchedSources};

/// Lifecycle state of a check job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(JobStatus::Pending),
            "processing" => Some(JobStatus::Processing),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Processing)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for JobStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for JobStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        JobStatus::parse(text).ok_or_else(|| FromSqlError::Other(format!("unknown job status '{}'", text).into()))
    }
}

impl ToSql for CheckMode {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for CheckMode {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        CheckMode::parse(text).ok_or_else(|| FromSqlError::Other(format!("unknown check mode '{}'", text).into()))
    }
}

/// One history record.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub id: String,
    pub user_id: String,
    pub filename: String,
    pub mode: CheckMode,
    pub status: JobStatus,
    pub progress: u8,
    pub similarity_global: Option<u8>,
    pub similarity_local: Option<u8>,
    pub similarity_internet: Option<u8>,
    pub matched_sources: Option<MatchedSources>,
    /// Report location relative to the media root.
    pub report_path: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub report_deleted: bool,
    pub report_deleted_at: Option<DateTime<Utc>>,
    pub report_deleted_reason: Option<String>,
}

impl JobRecord {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            filename: row.get("filename")?,
            mode: row.get("source_mode")?,
            status: row.get("status")?,
            progress: row.get("progress")?,
            similarity_global: row.get("similarity_global")?,
            similarity_local: row.get("similarity_local")?,
            similarity_internet: row.get("similarity_internet")?,
            matched_sources: get_json(row, "matched_sources")?,
            report_path: row.get("report_path")?,
            error: row.get("error")?,
            created_at: get_timestamp(row, "created_at")?.unwrap_or_default(),
            started_at: get_timestamp(row, "started_at")?,
            completed_at: get_timestamp(row, "completed_at")?,
            report_deleted: row.get("report_deleted")?,
            report_deleted_at: get_timestamp(row, "report_deleted_at")?,
            report_deleted_reason: row.get("report_deleted_reason")?,
        })
    }

    /// Whether a report artifact is recorded and not marked deleted.
    pub fn has_live_report(&self) -> bool {
        self.status == JobStatus::Completed && self.report_path.is_some() && !self.report_deleted
    }
}

/// Data needed to create a pending job.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub id: String,
    pub user_id: String,
    pub filename: String,
    pub mode: CheckMode,
    pub created_at: DateTime<Utc>,
}

/// Results persisted when a job completes.
#[derive(Debug, Clone)]
pub struct CompletedJob {
    pub similarity_global: u8,
    pub similarity_local: u8,
    pub similarity_internet: u8,
    pub matched_sources: MatchedSources,
    pub report_path: String,
}

/// Inserts a pending job on an already locked connection.
pub(crate) fn insert_pending_on(conn: &Connection, job: &NewJob) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO jobs (id, user_id, filename, source_mode, status, progress, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
        params![
            job.id,
            job.user_id,
            job.filename,
            job.mode,
            JobStatus::Pending,
            timestamp(job.created_at),
        ],
    )?;
    Ok(())
}

/// Whether the user has a pending or processing job, on an already locked
/// connection.
pub(crate) fn has_active_on(conn: &Connection, user_id: &str) -> Result<bool, DatabaseError> {
    let count: u32 = conn.query_row(
        "SELECT COUNT(*) FROM jobs WHERE user_id = ?1 AND status IN ('pending', 'processing')",
        params![user_id],
        |r| r.get(0),
    )?;
    Ok(count > 0)
}

/// Inserts a new pending job row.
pub fn insert_pending(db: &Database, job: &NewJob) -> Result<(), DatabaseError> {
    db.with_conn(|conn| insert_pending_on(conn, job))
}

/// Whether the user has a pending or processing job.
pub fn has_active(db: &Database, user_id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| has_active_on(conn, user_id))
}

/// Moves a pending job to `processing` with progress 0.
///
/// Returns false when the job is missing or no longer pending.
pub fn mark_processing(db: &Database, id: &str, at: DateTime<Utc>) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET status = 'processing', progress = 0, started_at = ?2
             WHERE id = ?1 AND status = 'pending'",
            params![id, timestamp(at)],
        )?;
        Ok(changed > 0)
    })
}

/// Raises the progress of a processing job. Lower values are ignored.
pub fn update_progress(db: &Database, id: &str, progress: u8) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE jobs SET progress = MAX(progress, ?2)
             WHERE id = ?1 AND status = 'processing'",
            params![id, progress.min(100)],
        )?;
        Ok(())
    })
}

/// Stores the results of a successful run and moves the job to `completed`.
///
/// Returns false when the job is missing or already finished.
pub fn mark_completed(
    db: &Database,
    id: &str,
    outcome: &CompletedJob,
    at: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let sources = serde_json::to_string(&outcome.matched_sources)?;
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET status = 'completed', progress = 100,
             similarity_global = ?2, similarity_local = ?3, similarity_internet = ?4,
             matched_sources = ?5, report_path = ?6, error = NULL, completed_at = ?7
             WHERE id = ?1 AND status IN ('pending', 'processing')",
            params![
                id,
                outcome.similarity_global,
                outcome.similarity_local,
                outcome.similarity_internet,
                sources,
                outcome.report_path,
                timestamp(at),
            ],
        )?;
        Ok(changed > 0)
    })
}

/// Moves the job to `failed` with the message shown to its owner.
///
/// Returns false when the job is missing or already finished.
pub fn mark_failed(db: &Database, id: &str, error: &str, at: DateTime<Utc>) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET status = 'failed', error = ?2, completed_at = ?3
             WHERE id = ?1 AND status IN ('pending', 'processing')",
            params![id, error, timestamp(at)],
        )?;
        Ok(changed > 0)
    })
}

/// Fails every pending or processing job. Used at startup, when queued
/// work from a previous process can no longer run. Returns the number of
/// jobs changed.
pub fn fail_unfinished(db: &Database, error: &str, at: DateTime<Utc>) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET status = 'failed', error = ?1, completed_at = ?2
             WHERE status IN ('pending', 'processing')",
            params![error, timestamp(at)],
        )?;
        Ok(changed)
    })
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobRecord>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row("SELECT * FROM jobs WHERE id = ?1", params![id], JobRecord::from_row)
            .optional()?;
        Ok(row)
    })
}

/// Finds a job by ID only if it belongs to the given user.
pub fn find_for_user(db: &Database, id: &str, user_id: &str) -> Result<Option<JobRecord>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM jobs WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
                JobRecord::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Most recent jobs of a user, newest first.
pub fn recent_for_user(db: &Database, user_id: &str, limit: usize) -> Result<Vec<JobRecord>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM jobs WHERE user_id = ?1
             ORDER BY created_at DESC, rowid DESC LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![user_id, limit as i64], JobRecord::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Marks the report of a job as deleted.
///
/// Already-deleted records are left untouched so the original timestamp
/// and reason survive. Returns true when this call changed the record.
pub fn mark_report_deleted(
    db: &Database,
    id: &str,
    reason: &str,
    at: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET report_deleted = 1, report_deleted_at = ?2, report_deleted_reason = ?3
             WHERE id = ?1 AND report_deleted = 0",
            params![id, timestamp(at), reason],
        )?;
        Ok(changed > 0)
    })
}

/// Completed jobs with a live report that completed before `cutoff`.
pub fn list_expired_reports(db: &Database, cutoff: DateTime<Utc>) -> Result<Vec<JobRecord>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM jobs
             WHERE status = 'completed' AND report_deleted = 0 AND report_path IS NOT NULL
               AND completed_at < ?1
             ORDER BY completed_at",
        )?;
        let rows = stmt
            .query_map(params![timestamp(cutoff)], JobRecord::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
