//! The checking service: admission, background processing and the
//! read-side surfaces a front end needs.

pub mod cleanup;
pub mod download;
pub mod status;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::admission::QuotaGuard;
use crate::aggregate::CheckMode;
use crate::broadcast::{JobProgressBroadcaster, JobProgressEvent};
use crate::config::Config;
use crate::db::job_repo::{self, NewJob};
use crate::db::settings_repo::{self, DetectionSettings};
use crate::db::{quota_repo, Database, DatabaseError};
use crate::error::{AdmissionError, DownloadError, Result};
use crate::intake::{self, Submission};
use crate::matcher::search::{self, WebSearch};
use crate::pipeline::{Pipeline, PipelineConfig};
use crate::storage::MediaStorage;
use crate::worker::{CheckJob, JobResult, WorkerPool};

pub use cleanup::CleanupSummary;
pub use download::ReportDownload;
pub use status::{JobSummary, StatusSnapshot};

/// Stored on jobs that were queued or running when the service stopped.
pub const INTERRUPTED_MESSAGE: &str = "The check was interrupted before it finished. Please submit the document again.";

pub struct CheckService {
    config: Arc<Config>,
    db: Database,
    storage: MediaStorage,
    guard: QuotaGuard,
    pool: WorkerPool,
    broadcaster: JobProgressBroadcaster,
}

impl CheckService {
    /// Starts the service with the search provider selected in the config.
    pub fn start(config: Config, db: Database) -> Result<Self> {
        let search = search::from_config(&config.internet);
        Self::start_with_search(config, db, search)
    }

    /// Starts the workers. Jobs a previous process left unfinished are
    /// failed first so their owners are not blocked forever, and their
    /// temporary inputs are removed.
    pub fn start_with_search(config: Config, db: Database, search: Arc<dyn WebSearch>) -> Result<Self> {
        let interrupted = job_repo::fail_unfinished(&db, INTERRUPTED_MESSAGE, Utc::now())?;
        if interrupted > 0 {
            tracing::warn!(count = interrupted, "Marked unfinished jobs from a previous run as failed");
        }
        let storage = MediaStorage::new(&config.media_root);
        match storage.clear_temp() {
            Ok(0) => {}
            Ok(removed) => tracing::info!(removed, "Removed temporary inputs left by a previous run"),
            Err(e) => tracing::warn!(error = %e, "Failed to clear temporary inputs"),
        }

        let pipeline_config = Arc::new(PipelineConfig::from_config(&config));
        let pipeline = Arc::new(Pipeline::new(pipeline_config, db.clone(), search));
        let broadcaster = JobProgressBroadcaster::default();
        let pool = WorkerPool::with_progress_sender(pipeline, config.worker_count, Some(broadcaster.sender()))?;

        tracing::info!(
            workers = config.worker_count.max(1),
            media_root = %config.media_root.display(),
            "Check service started"
        );

        Ok(Self {
            storage,
            guard: QuotaGuard::new(db.clone(), config.default_daily_limit),
            config: Arc::new(config),
            db,
            pool,
            broadcaster,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn storage(&self) -> &MediaStorage {
        &self.storage
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobProgressEvent> {
        self.broadcaster.subscribe()
    }

    /// Validates, admits and queues a submission. Returns the new job ids
    /// in submission order.
    ///
    /// Nothing is queued unless every file is valid and the whole batch
    /// fits in the user's remaining quota. Returns without waiting for a
    /// free worker.
    pub fn submit(
        &self,
        user_id: &str,
        mode: CheckMode,
        submission: &Submission,
    ) -> std::result::Result<Vec<String>, AdmissionError> {
        let inputs = intake::prepare(submission, &self.config.extraction, &self.storage, Local::now())?;
        let created_at = Utc::now();

        let jobs: Vec<CheckJob> = inputs
            .iter()
            .map(|input| CheckJob {
                id: Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                filename: input.filename.clone(),
                input_path: input.path.clone(),
                format: input.format,
                mode,
            })
            .collect();
        let records: Vec<NewJob> = jobs
            .iter()
            .map(|job| NewJob {
                id: job.id.clone(),
                user_id: job.user_id.clone(),
                filename: job.filename.clone(),
                mode,
                created_at,
            })
            .collect();

        if let Err(e) = self.guard.admit(user_id, &records) {
            intake::discard(&self.storage, &inputs);
            tracing::info!(user_id, error = %e, "Submission rejected");
            return Err(e);
        }

        for (index, job) in jobs.iter().enumerate() {
            self.broadcaster.start_job(&job.id, &job.filename);
            if self.pool.submit(job.clone()).is_err() {
                for abandoned in &jobs[index..] {
                    self.abandon(abandoned);
                }
                return Err(AdmissionError::ShuttingDown);
            }
        }

        tracing::info!(user_id, count = jobs.len(), mode = %mode, "Submission queued");
        Ok(jobs.into_iter().map(|job| job.id).collect())
    }

    /// Fails a job that will never run and removes its input.
    fn abandon(&self, job: &CheckJob) {
        if let Err(e) = job_repo::mark_failed(&self.db, &job.id, INTERRUPTED_MESSAGE, Utc::now()) {
            tracing::error!(job_id = %job.id, error = %e, "Failed to record interrupted job");
        }
        if let Err(e) = self.storage.remove(&job.input_path) {
            tracing::warn!(job_id = %job.id, error = %e, "Failed to remove temporary input");
        }
        self.broadcaster.send(JobProgressEvent::failed(&job.id, &job.filename, 0, INTERRUPTED_MESSAGE));
    }

    pub fn try_recv_result(&self) -> Option<JobResult> {
        self.pool.try_recv_result()
    }

    pub fn recv_result(&self) -> Option<JobResult> {
        self.pool.recv_result()
    }

    pub fn recv_result_timeout(&self, timeout: Duration) -> Option<JobResult> {
        self.pool.recv_result_timeout(timeout)
    }

    pub fn status(&self, user_id: &str) -> std::result::Result<StatusSnapshot, DatabaseError> {
        status::snapshot(
            &self.db,
            &self.storage,
            user_id,
            self.config.default_daily_limit,
            self.config.status.recent_limit,
            Local::now().date_naive(),
        )
    }

    pub fn download(&self, user_id: &str, job_id: &str) -> std::result::Result<ReportDownload, DownloadError> {
        download::fetch(&self.db, &self.storage, user_id, job_id, Utc::now())
    }

    /// Deletes reports older than the configured retention.
    pub fn cleanup_expired_reports(&self, now: DateTime<Utc>) -> std::result::Result<CleanupSummary, DatabaseError> {
        let settings = settings_repo::get(&self.db)?;
        cleanup::expire_reports(&self.db, &self.storage, settings.auto_delete_days, now)
    }

    pub fn settings(&self) -> std::result::Result<DetectionSettings, DatabaseError> {
        settings_repo::get(&self.db)
    }

    /// Takes effect for jobs that start after the call.
    pub fn update_settings(&self, settings: &DetectionSettings) -> std::result::Result<(), DatabaseError> {
        settings_repo::update(&self.db, settings, Utc::now())?;
        tracing::info!(
            threshold = settings.similarity_threshold,
            auto_delete_days = settings.auto_delete_days,
            "Detection settings updated"
        );
        Ok(())
    }

    pub fn set_daily_limit(&self, user_id: &str, limit: u32) -> std::result::Result<(), DatabaseError> {
        quota_repo::set_daily_limit(&self.db, user_id, limit)
    }

    /// Asks the workers to stop after their current job.
    pub fn request_stop(&self) {
        self.pool.shutdown();
    }

    pub fn is_stopping(&self) -> bool {
        self.pool.is_shutdown()
    }

    /// Waits for the workers. Jobs still queued are failed and their
    /// inputs removed. Returns how many jobs were interrupted.
    pub fn shutdown(self) -> usize {
        let Self {
            db,
            storage,
            pool,
            broadcaster,
            ..
        } = self;

        let leftover = pool.wait();
        for job in &leftover {
            if let Err(e) = job_repo::mark_failed(&db, &job.id, INTERRUPTED_MESSAGE, Utc::now()) {
                tracing::error!(job_id = %job.id, error = %e, "Failed to record interrupted job");
            }
            if let Err(e) = storage.remove(&job.input_path) {
                tracing::warn!(job_id = %job.id, error = %e, "Failed to remove temporary input");
            }
            broadcaster.send(JobProgressEvent::failed(&job.id, &job.filename, 0, INTERRUPTED_MESSAGE));
        }

        tracing::info!(interrupted = leftover.len(), "Check service stopped");
        leftover.len()
    }
}
