//! Retention sweep for stored reports.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::db::job_repo;
use crate::db::{Database, DatabaseError};
use crate::storage::MediaStorage;

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupSummary {
    /// Reports older than the retention window.
    pub expired: usize,
    /// Files removed from storage.
    pub removed: usize,
    /// Expired reports whose file was already gone.
    pub already_missing: usize,
    /// Files that could not be removed; retried on the next sweep.
    pub failed: usize,
}

pub fn expiry_reason(auto_delete_days: u32) -> String {
    format!("Auto-deleted after {} days", auto_delete_days)
}

/// Removes reports of jobs completed more than `auto_delete_days` before
/// `now` and marks them deleted. Zero days disables the sweep.
pub fn expire_reports(
    db: &Database,
    storage: &MediaStorage,
    auto_delete_days: u32,
    now: DateTime<Utc>,
) -> Result<CleanupSummary, DatabaseError> {
    let mut summary = CleanupSummary::default();
    if auto_delete_days == 0 {
        tracing::debug!("Report auto-delete disabled");
        return Ok(summary);
    }

    let cutoff = now - Duration::days(i64::from(auto_delete_days));
    let reason = expiry_reason(auto_delete_days);

    for record in job_repo::list_expired_reports(db, cutoff)? {
        summary.expired += 1;

        let removal = record
            .report_path
            .as_deref()
            .map(|pointer| storage.resolve(pointer).and_then(|path| storage.remove(&path)));

        match removal {
            Some(Ok(true)) => summary.removed += 1,
            Some(Ok(false)) | None => summary.already_missing += 1,
            Some(Err(e)) => {
                tracing::warn!(job_id = %record.id, error = %e, "Failed to remove expired report");
                summary.failed += 1;
                continue;
            }
        }

        job_repo::mark_report_deleted(db, &record.id, &reason, now)?;
    }

    if summary.expired > 0 {
        tracing::info!(
            expired = summary.expired,
            removed = summary.removed,
            already_missing = summary.already_missing,
            failed = summary.failed,
            "Expired reports cleaned up"
        );
    }

    Ok(summary)
}
