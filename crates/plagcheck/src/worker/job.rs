use std::path::PathBuf;

use crate::aggregate::{AggregationResult, CheckMode};
use crate::config::DocumentFormat;

/// A queued check: one admitted document waiting for a worker.
#[derive(Debug, Clone)]
pub struct CheckJob {
    /// Identity of the history record created at admission.
    pub id: String,
    pub user_id: String,
    /// Sanitized display filename.
    pub filename: String,
    /// Temporary input under the media root, removed by the job.
    pub input_path: PathBuf,
    pub format: DocumentFormat,
    pub mode: CheckMode,
}

impl CheckJob {
    pub fn mime_type(&self) -> String {
        self.format.mime_type()
    }
}

#[derive(Debug)]
pub struct JobResult {
    pub job_id: String,
    pub user_id: String,
    pub filename: String,
    pub success: bool,
    pub similarity_global: Option<u8>,
    pub similarity_local: Option<u8>,
    pub similarity_internet: Option<u8>,
    /// Storage pointer of the report.
    pub report_path: Option<String>,
    /// Message stored on the history record.
    pub error: Option<String>,
}

impl JobResult {
    pub fn success(job: &CheckJob, result: &AggregationResult, report_path: String) -> Self {
        Self {
            job_id: job.id.clone(),
            user_id: job.user_id.clone(),
            filename: job.filename.clone(),
            success: true,
            similarity_global: Some(result.similarity_global),
            similarity_local: Some(result.similarity_local),
            similarity_internet: Some(result.similarity_internet),
            report_path: Some(report_path),
            error: None,
        }
    }

    pub fn failure(job: &CheckJob, error: String) -> Self {
        Self {
            job_id: job.id.clone(),
            user_id: job.user_id.clone(),
            filename: job.filename.clone(),
            success: false,
            similarity_global: None,
            similarity_local: None,
            similarity_internet: None,
            report_path: None,
            error: Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::MatchedSources;

    fn job() -> CheckJob {
        CheckJob {
            id: "job-1".to_string(),
            user_id: "alice".to_string(),
            filename: "essay.docx".to_string(),
            input_path: PathBuf::from("/media/temp/abc.docx"),
            format: DocumentFormat::Docx,
            mode: CheckMode::Local,
        }
    }

    #[test]
    fn test_mime_type_follows_format() {
        assert_eq!(
            job().mime_type(),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        );
    }

    #[test]
    fn test_job_result_success() {
        let result = AggregationResult {
            results: vec![],
            total_sentences: 5,
            similarity_local: 40,
            similarity_internet: 0,
            similarity_global: 40,
            sources: MatchedSources::default(),
        };
        let outcome = JobResult::success(&job(), &result, "reports/Report_1.pdf".to_string());

        assert!(outcome.success);
        assert_eq!(outcome.job_id, "job-1");
        assert_eq!(outcome.similarity_global, Some(40));
        assert_eq!(outcome.similarity_internet, Some(0));
        assert!(outcome.error.is_none());
    }

    #[test]
    fn test_job_result_failure() {
        let outcome = JobResult::failure(&job(), "The PDF has no pages.".to_string());

        assert!(!outcome.success);
        assert!(outcome.report_path.is_none());
        assert_eq!(outcome.error.as_deref(), Some("The PDF has no pages."));
    }
}
