//! The status view shown to a user before and after submitting.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::aggregate::CheckMode;
use crate::db::job_repo::{self, JobRecord, JobStatus};
use crate::db::{quota_repo, Database, DatabaseError};
use crate::storage::MediaStorage;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub has_active_job: bool,
    pub remaining_quota: u32,
    pub daily_limit: u32,
    pub recent: Vec<JobSummary>,
}

/// One history row as listed to its owner.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub id: String,
    pub filename: String,
    pub mode: CheckMode,
    pub status: JobStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity_global: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity_local: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity_internet: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub can_download: bool,
    pub report_deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_deleted_reason: Option<String>,
}

impl JobSummary {
    pub fn from_record(record: JobRecord, storage: &MediaStorage) -> Self {
        let can_download = report_available(storage, &record);
        Self {
            id: record.id,
            filename: record.filename,
            mode: record.mode,
            status: record.status,
            progress: record.progress,
            similarity_global: record.similarity_global,
            similarity_local: record.similarity_local,
            similarity_internet: record.similarity_internet,
            error: record.error,
            created_at: record.created_at,
            completed_at: record.completed_at,
            can_download,
            report_deleted: record.report_deleted,
            report_deleted_reason: record.report_deleted_reason,
        }
    }
}

/// Whether the record points at a report file that is still on disk.
pub fn report_available(storage: &MediaStorage, record: &JobRecord) -> bool {
    if !record.has_live_report() {
        return false;
    }
    record
        .report_path
        .as_deref()
        .and_then(|pointer| storage.resolve(pointer).ok())
        .is_some_and(|path| path.is_file())
}

/// Builds the status of `user_id` for `day`.
pub fn snapshot(
    db: &Database,
    storage: &MediaStorage,
    user_id: &str,
    default_limit: u32,
    recent_limit: usize,
    day: NaiveDate,
) -> Result<StatusSnapshot, DatabaseError> {
    let has_active_job = job_repo::has_active(db, user_id)?;
    let daily_limit = quota_repo::daily_limit(db, user_id, default_limit)?;
    let remaining_quota = quota_repo::remaining(db, user_id, day, default_limit)?;
    let recent = job_repo::recent_for_user(db, user_id, recent_limit)?
        .into_iter()
        .map(|record| JobSummary::from_record(record, storage))
        .collect();

    Ok(StatusSnapshot {
        has_active_job,
        remaining_quota,
        daily_limit,
        recent,
    })
}
