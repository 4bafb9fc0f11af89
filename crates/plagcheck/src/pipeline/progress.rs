use std::sync::Arc;

use tokio::sync::broadcast;

use crate::broadcast::job_progress::{JobPhase, JobProgressEvent, JobProgressTracker};

/// Events emitted by the pipeline while a check runs.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Phase {
        phase: JobPhase,
        progress: u8,
        message: String,
    },
    Completed {
        similarity_global: u8,
        report_path: String,
    },
    Failed {
        progress: u8,
        error: String,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for callers without observers.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Bridges pipeline events to the broadcast channel.
pub struct BroadcastProgress {
    tracker: JobProgressTracker,
}

impl BroadcastProgress {
    pub fn new(job_id: &str, filename: &str, sender: Arc<broadcast::Sender<JobProgressEvent>>) -> Self {
        Self {
            tracker: JobProgressTracker::new(job_id, filename, sender),
        }
    }
}

impl ProgressReporter for BroadcastProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Phase {
                phase,
                progress,
                message,
            } => {
                self.tracker.update_phase(phase, progress, &message);
            }
            ProgressEvent::Completed {
                similarity_global,
                report_path,
            } => {
                self.tracker.completed(similarity_global, &report_path);
            }
            ProgressEvent::Failed { progress, error } => {
                self.tracker.failed(progress, &error);
            }
        }
    }
}
