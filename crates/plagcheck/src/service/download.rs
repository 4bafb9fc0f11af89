//! Handing a finished report to its owner.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::config::DocumentFormat;
use crate::db::job_repo::{self, JobRecord, JobStatus};
use crate::db::Database;
use crate::error::DownloadError;
use crate::storage::MediaStorage;

/// Reason recorded when a report file disappeared from storage.
pub const FILE_NOT_FOUND_REASON: &str = "File not found";

#[derive(Debug, Clone)]
pub struct ReportDownload {
    /// Attachment name offered to the client.
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
    pub path: PathBuf,
}

/// `RESULT_<stem>.pdf` for the submitted file name.
pub fn download_name(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("report");
    format!("RESULT_{}.pdf", stem)
}

/// Loads the report of `job_id` if it belongs to `user_id`.
///
/// A report whose file is gone is marked deleted on the way out so the
/// history shows why it can no longer be downloaded.
pub fn fetch(
    db: &Database,
    storage: &MediaStorage,
    user_id: &str,
    job_id: &str,
    now: DateTime<Utc>,
) -> Result<ReportDownload, DownloadError> {
    let record = job_repo::find_for_user(db, job_id, user_id)?.ok_or(DownloadError::NotFound)?;

    if record.report_deleted {
        return Err(deleted(&record));
    }

    let pointer = match (record.status, record.report_path.as_deref()) {
        (JobStatus::Completed, Some(pointer)) => pointer,
        (status, _) => return Err(DownloadError::NotReady { status }),
    };

    let path = match storage.resolve(pointer) {
        Ok(path) if path.is_file() => path,
        _ => return Err(vanished(db, &record, now)?),
    };

    let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(vanished(db, &record, now)?),
        Err(e) => return Err(DownloadError::Io { path, source: e }),
    };

    tracing::info!(job_id, bytes = bytes.len(), "Report downloaded");

    Ok(ReportDownload {
        filename: download_name(&record.filename),
        content_type: DocumentFormat::Pdf.mime_type(),
        bytes,
        path,
    })
}

fn deleted(record: &JobRecord) -> DownloadError {
    DownloadError::Deleted {
        at: record.report_deleted_at,
        reason: record
            .report_deleted_reason
            .clone()
            .unwrap_or_else(|| "no reason recorded".to_string()),
    }
}

/// Marks a missing report deleted and returns the error for the stored state.
fn vanished(db: &Database, record: &JobRecord, now: DateTime<Utc>) -> Result<DownloadError, DownloadError> {
    tracing::warn!(job_id = %record.id, "Report file missing from storage");
    job_repo::mark_report_deleted(db, &record.id, FILE_NOT_FOUND_REASON, now)?;

    Ok(match job_repo::find_by_id(db, &record.id)? {
        Some(current) => deleted(&current),
        None => DownloadError::NotFound,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{CheckMode, MatchedSources};
    use crate::db::job_repo::{CompletedJob, NewJob};
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        db: Database,
        storage: MediaStorage,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let storage = MediaStorage::new(dir.path());
            Self {
                _dir: dir,
                db: Database::open_in_memory().unwrap(),
                storage,
            }
        }

        fn pending(&self, id: &str, filename: &str) {
            job_repo::insert_pending(
                &self.db,
                &NewJob {
                    id: id.to_string(),
                    user_id: "alice".to_string(),
                    filename: filename.to_string(),
                    mode: CheckMode::Both,
                    created_at: Utc::now(),
                },
            )
            .unwrap();
        }

        fn completed(&self, id: &str, filename: &str, pointer: &str) {
            self.pending(id, filename);
            job_repo::mark_processing(&self.db, id, Utc::now()).unwrap();
            job_repo::mark_completed(
                &self.db,
                id,
                &CompletedJob {
                    similarity_global: 0,
                    similarity_local: 0,
                    similarity_internet: 0,
                    matched_sources: MatchedSources::default(),
                    report_path: pointer.to_string(),
                },
                Utc::now(),
            )
            .unwrap();
        }
    }

    #[test]
    fn test_download_name() {
        assert_eq!(download_name("thesis.pdf"), "RESULT_thesis.pdf");
        assert_eq!(download_name("Pasted_Text_20260101_120000.txt"), "RESULT_Pasted_Text_20260101_120000.pdf");
        assert_eq!(download_name(""), "RESULT_report.pdf");
    }

    #[test]
    fn test_fetch_returns_report_bytes() {
        let fx = Fixture::new();
        let stored = fx.storage.write_report(b"%PDF-1.5 body").unwrap();
        fx.completed("job-1", "essay.docx", &stored.pointer);

        let download = fetch(&fx.db, &fx.storage, "alice", "job-1", Utc::now()).unwrap();
        assert_eq!(download.filename, "RESULT_essay.pdf");
        assert_eq!(download.content_type, "application/pdf");
        assert_eq!(download.bytes, b"%PDF-1.5 body");
    }

    #[test]
    fn test_other_users_cannot_download() {
        let fx = Fixture::new();
        let stored = fx.storage.write_report(b"%PDF").unwrap();
        fx.completed("job-1", "essay.pdf", &stored.pointer);

        assert!(matches!(
            fetch(&fx.db, &fx.storage, "mallory", "job-1", Utc::now()),
            Err(DownloadError::NotFound)
        ));
        assert!(matches!(
            fetch(&fx.db, &fx.storage, "alice", "nope", Utc::now()),
            Err(DownloadError::NotFound)
        ));
    }

    #[test]
    fn test_pending_job_is_not_ready() {
        let fx = Fixture::new();
        fx.pending("job-1", "essay.pdf");

        match fetch(&fx.db, &fx.storage, "alice", "job-1", Utc::now()) {
            Err(DownloadError::NotReady { status }) => assert_eq!(status, JobStatus::Pending),
            other => panic!("expected NotReady, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_file_is_marked_deleted() {
        let fx = Fixture::new();
        fx.completed("job-1", "essay.pdf", "reports/Report_gone.pdf");
        let now = Utc::now();

        match fetch(&fx.db, &fx.storage, "alice", "job-1", now) {
            Err(DownloadError::Deleted { reason, at }) => {
                assert_eq!(reason, FILE_NOT_FOUND_REASON);
                assert!(at.is_some());
            }
            other => panic!("expected Deleted, got {:?}", other),
        }

        let record = job_repo::find_by_id(&fx.db, "job-1").unwrap().unwrap();
        assert!(record.report_deleted);
        assert_eq!(record.report_deleted_reason.as_deref(), Some(FILE_NOT_FOUND_REASON));
    }

    #[test]
    fn test_deleted_report_keeps_original_reason() {
        let fx = Fixture::new();
        let stored = fx.storage.write_report(b"%PDF").unwrap();
        fx.completed("job-1", "essay.pdf", &stored.pointer);
        job_repo::mark_report_deleted(&fx.db, "job-1", "Auto-deleted after 30 days", Utc::now()).unwrap();

        match fetch(&fx.db, &fx.storage, "alice", "job-1", Utc::now()) {
            Err(DownloadError::Deleted { reason, .. }) => assert_eq!(reason, "Auto-deleted after 30 days"),
            other => panic!("expected Deleted, got {:?}", other),
        }
    }

    #[test]
    fn test_escaping_pointer_is_treated_as_missing() {
        let fx = Fixture::new();
        fx.completed("job-1", "essay.pdf", "../outside.pdf");

        assert!(matches!(
            fetch(&fx.db, &fx.storage, "alice", "job-1", Utc::now()),
            Err(DownloadError::Deleted { .. })
        ));
    }
}
