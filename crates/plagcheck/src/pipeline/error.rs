use thiserror::Error;

use crate::aggregate::AggregateError;
use crate::db::DatabaseError;
use crate::error::{ExtractError, ReportError, StorageError};

/// Stored for failures that are not the submitter's fault.
pub const SYSTEM_ERROR_MESSAGE: &str = "A system error occurred while checking the document.";

/// Stored when the report could not be produced.
pub const REPORT_FAILED_MESSAGE: &str = "Failed to generate the PDF report. Please try again.";

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Text extraction failed: {0}")]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    #[error("Report generation failed: {0}")]
    Report(#[from] ReportError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Job {0} is no longer pending or running")]
    NotPending(String),

    #[error("Worker panicked: {0}")]
    Panicked(String),
}

impl PipelineError {
    /// Whether the failure is a recognized problem with the submission (or
    /// its report) rather than a system fault.
    pub fn is_user_facing(&self) -> bool {
        match self {
            PipelineError::Extract(e) => e.is_user_facing(),
            PipelineError::Aggregate(_) | PipelineError::Report(_) => true,
            _ => false,
        }
    }

    /// The message persisted on the history record. System faults never
    /// leak their diagnostics here.
    pub fn stored_message(&self) -> String {
        match self {
            PipelineError::Extract(e) if e.is_user_facing() => e.to_string(),
            PipelineError::Aggregate(e) => e.to_string(),
            PipelineError::Report(_) => REPORT_FAILED_MESSAGE.to_string(),
            _ => SYSTEM_ERROR_MESSAGE.to_string(),
        }
    }
}
