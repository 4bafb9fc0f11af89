//! Isolated environment for service-level tests.
//!
//! Each harness owns a temporary media root with a file-backed database,
//! a config pointing at both, and helpers to seed the reference corpus and
//! collect job results.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tempfile::TempDir;

use plagcheck::config::Config;
use plagcheck::corpus::{CorpusDocument, IndexStatus};
use plagcheck::db::corpus_repo;
use plagcheck::db::job_repo::{self, JobRecord};
use plagcheck::matcher::search::{DisabledSearch, WebSearch};
use plagcheck::{CheckService, Database, JobResult};

const RESULT_TIMEOUT: Duration = Duration::from_secs(60);

pub struct TestHarness {
    temp_dir: TempDir,
    pub media_root: PathBuf,
    pub config: Config,
    pub db: Database,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Creates a harness and lets the caller adjust the config first.
    pub fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let media_root = temp_dir.path().join("media");
        std::fs::create_dir_all(&media_root).expect("Failed to create media root");

        let mut config = Config {
            media_root: media_root.clone(),
            database_path: Some(temp_dir.path().join("plagcheck.db")),
            worker_count: 2,
            ..Config::default()
        };
        config.internet.request_delay_ms = 0;
        adjust(&mut config);

        let db = Database::open(&config.database_path()).expect("Failed to open database");

        Self {
            temp_dir,
            media_root,
            config,
            db,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Registers an indexed corpus document whose text is `text`.
    pub fn add_corpus_document(
        &self,
        id: &str,
        title: &str,
        author: Option<&str>,
        year: Option<u16>,
        text: &str,
    ) -> CorpusDocument {
        let dir = self.media_root.join("corpus");
        std::fs::create_dir_all(&dir).expect("Failed to create corpus dir");
        std::fs::write(dir.join(format!("{}.txt", id)), text).expect("Failed to write corpus text");

        let document = CorpusDocument {
            id: id.to_string(),
            filename: format!("{}.pdf", id),
            title: title.to_string(),
            author: author.map(str::to_string),
            year,
            file_path: format!("corpus/{}.pdf", id),
            extracted_text_path: Some(format!("corpus/{}.txt", id)),
            status: IndexStatus::Indexed,
        };
        corpus_repo::register(&self.db, &document, Utc::now()).expect("Failed to register corpus document");
        document
    }

    /// Starts a service with web search disabled.
    pub fn start(&self) -> CheckService {
        self.start_with_search(Arc::new(DisabledSearch))
    }

    pub fn start_with_search(&self, search: Arc<dyn WebSearch>) -> CheckService {
        CheckService::start_with_search(self.config.clone(), self.db.clone(), search)
            .expect("Failed to start service")
    }

    /// Collects `count` results, panicking if one takes too long.
    pub fn wait_for(&self, service: &CheckService, count: usize) -> Vec<JobResult> {
        (0..count)
            .map(|_| {
                service
                    .recv_result_timeout(RESULT_TIMEOUT)
                    .expect("Timed out waiting for a job result")
            })
            .collect()
    }

    pub fn job(&self, id: &str) -> JobRecord {
        job_repo::find_by_id(&self.db, id)
            .expect("Failed to load job")
            .expect("Job not found")
    }

    /// Absolute path of the report recorded for a job.
    pub fn report_file(&self, record: &JobRecord) -> PathBuf {
        self.media_root
            .join(record.report_path.as_deref().expect("Job has no report"))
    }

    /// Files currently left in the temporary upload directory.
    pub fn temp_files(&self) -> usize {
        match std::fs::read_dir(self.media_root.join("temp")) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
