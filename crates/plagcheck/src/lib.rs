pub mod admission;
pub mod aggregate;
pub mod broadcast;
pub mod config;
pub mod corpus;
pub mod db;
pub mod error;
pub mod intake;
pub mod logging;
pub mod matcher;
pub mod pipeline;
pub mod processor;
pub mod report;
pub mod sanitize;
pub mod secrets;
pub mod segment;
pub mod service;
pub mod storage;
pub mod worker;

pub use admission::QuotaGuard;
pub use aggregate::{AggregationResult, Aggregator, CheckMode, MatchedSources, SentenceResult};
pub use broadcast::{JobPhase, JobProgressBroadcaster, JobProgressEvent};
pub use config::{load_config, Config, DocumentFormat};
pub use corpus::{CorpusDocument, IndexStatus};
pub use db::settings_repo::DetectionSettings;
pub use db::{Database, DatabaseError};
pub use error::{
    AdmissionError, ConfigError, DownloadError, ExtractError, PlagcheckError, ReportError, Result,
    StorageError, WorkerError,
};
pub use intake::{Submission, Upload};
pub use matcher::{SearchError, WebSearch};
pub use pipeline::{Pipeline, PipelineConfig, PipelineContext};
pub use report::ReportSynthesizer;
pub use segment::Segmenter;
pub use service::{CheckService, CleanupSummary, JobSummary, ReportDownload, StatusSnapshot};
pub use storage::MediaStorage;
pub use worker::{CheckJob, JobResult, WorkerPool};
