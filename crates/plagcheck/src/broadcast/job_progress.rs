//! Job progress broadcaster for live check status.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::db::job_repo::JobStatus;

/// Phase of a plagiarism check.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Queued,
    Extracting,
    Segmenting,
    Matching,
    Reporting,
    Completed,
    Failed,
}

impl std::fmt::Display for JobPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobPhase::Queued => write!(f, "Queued"),
            JobPhase::Extracting => write!(f, "Extracting text"),
            JobPhase::Segmenting => write!(f, "Splitting sentences"),
            JobPhase::Matching => write!(f, "Matching sentences"),
            JobPhase::Reporting => write!(f, "Generating report"),
            JobPhase::Completed => write!(f, "Completed"),
            JobPhase::Failed => write!(f, "Failed"),
        }
    }
}

impl JobPhase {
    fn status(&self) -> JobStatus {
        match self {
            JobPhase::Queued => JobStatus::Pending,
            JobPhase::Completed => JobStatus::Completed,
            JobPhase::Failed => JobStatus::Failed,
            _ => JobStatus::Processing,
        }
    }
}

/// Progress event for a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgressEvent {
    pub job_id: String,
    /// Display filename of the submission.
    pub filename: String,
    pub phase: JobPhase,
    pub status: JobStatus,
    /// Percentage in 0..=100.
    pub progress: u8,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Global similarity (set on completion).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity_global: Option<u8>,
    /// Storage pointer of the PDF report (set on completion).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_path: Option<String>,
    /// User-facing error (set on failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobProgressEvent {
    pub fn new(job_id: &str, filename: &str, phase: JobPhase, progress: u8, message: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            filename: filename.to_string(),
            phase,
            status: phase.status(),
            progress: progress.min(100),
            message: message.to_string(),
            timestamp: Utc::now(),
            similarity_global: None,
            report_path: None,
            error: None,
        }
    }

    pub fn completed(job_id: &str, filename: &str, similarity_global: u8, report_path: &str) -> Self {
        Self {
            similarity_global: Some(similarity_global),
            report_path: Some(report_path.to_string()),
            ..Self::new(job_id, filename, JobPhase::Completed, 100, "Check completed")
        }
    }

    pub fn failed(job_id: &str, filename: &str, progress: u8, error: &str) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(job_id, filename, JobPhase::Failed, progress, "Check failed")
        }
    }
}

/// Broadcasts job progress events to any number of subscribers.
#[derive(Clone)]
pub struct JobProgressBroadcaster {
    sender: Arc<broadcast::Sender<JobProgressEvent>>,
}

impl JobProgressBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn send(&self, event: JobProgressEvent) {
        // No receivers is fine.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobProgressEvent> {
        self.sender.subscribe()
    }

    /// Creates a tracker for a job and announces it as queued.
    pub fn start_job(&self, job_id: &str, filename: &str) -> JobProgressTracker {
        let tracker = JobProgressTracker::new(job_id, filename, Arc::clone(&self.sender));
        tracker.update_phase(JobPhase::Queued, 0, "Waiting for a worker");
        tracker
    }

    /// Inner sender for trackers created elsewhere.
    pub fn sender(&self) -> Arc<broadcast::Sender<JobProgressEvent>> {
        Arc::clone(&self.sender)
    }
}

impl Default for JobProgressBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

/// Sends the events of a single job.
pub struct JobProgressTracker {
    job_id: String,
    filename: String,
    sender: Arc<broadcast::Sender<JobProgressEvent>>,
}

impl JobProgressTracker {
    pub fn new(job_id: &str, filename: &str, sender: Arc<broadcast::Sender<JobProgressEvent>>) -> Self {
        Self {
            job_id: job_id.to_string(),
            filename: filename.to_string(),
            sender,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn update_phase(&self, phase: JobPhase, progress: u8, message: &str) {
        let _ = self.sender.send(JobProgressEvent::new(
            &self.job_id,
            &self.filename,
            phase,
            progress,
            message,
        ));
    }

    pub fn completed(&self, similarity_global: u8, report_path: &str) {
        let _ = self.sender.send(JobProgressEvent::completed(
            &self.job_id,
            &self.filename,
            similarity_global,
            report_path,
        ));
    }

    pub fn failed(&self, progress: u8, error: &str) {
        let _ = self.sender.send(JobProgressEvent::failed(
            &self.job_id,
            &self.filename,
            progress,
            error,
        ));
    }
}
