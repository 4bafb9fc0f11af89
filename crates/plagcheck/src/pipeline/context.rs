use crate::db::settings_repo::DetectionSettings;
use crate::worker::job::CheckJob;

pub struct PipelineContext {
    // Input
    pub job: CheckJob,

    // Loaded once when the job starts and used by every stage.
    pub settings: DetectionSettings,

    // Last checkpoint persisted on the history record.
    pub progress: u8,

    // Counts for the completion log line.
    pub sentence_count: usize,
    pub page_count: Option<usize>,
}

impl PipelineContext {
    pub fn new(job: CheckJob) -> Self {
        Self {
            job,
            settings: DetectionSettings::default(),
            progress: 0,
            sentence_count: 0,
            page_count: None,
        }
    }
}
