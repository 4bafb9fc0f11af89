//! Progress events for observers of running checks.

pub mod job_progress;

pub use job_progress::{JobPhase, JobProgressBroadcaster, JobProgressEvent, JobProgressTracker};
