use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlagcheckError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Admission error: {0}")]
    Admission(#[from] AdmissionError),

    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Download error: {0}")]
    Download(#[from] DownloadError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

/// Failures raised while turning an input into checkable text.
///
/// Every variant except `Io` and `Parse` describes a problem with the
/// submitted document and its message is shown to the user as-is.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Unsupported file format '{0}'. Only PDF and DOCX files are accepted.")]
    UnsupportedFormat(String),

    #[error("File is too large ({size} bytes). The maximum allowed size is {max} bytes.")]
    FileTooLarge { size: u64, max: u64 },

    #[error("The PDF is password protected. Please upload an unprotected file.")]
    PasswordProtected,

    #[error("The PDF has no pages.")]
    NoPages,

    #[error("The PDF appears to be a scanned image. Please upload a PDF with selectable text.")]
    LikelyScanned,

    #[error("Insufficient text extracted ({chars} characters). The document is likely image-only.")]
    InsufficientText { chars: usize },

    #[error("The document contains too little text ({chars} characters, minimum {min}).")]
    TooShort { chars: usize, min: usize },

    #[error("The text is too long ({chars} characters, maximum {max}).")]
    TooLong { chars: usize, max: usize },

    #[error("Failed to read document '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse document: {0}")]
    Parse(String),
}

impl ExtractError {
    /// True when the message describes the submitted document rather than
    /// an internal fault.
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, ExtractError::Io { .. } | ExtractError::Parse(_))
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove file '{path}': {source}")]
    RemoveFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read directory '{path}': {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Path escapes the media root: {0}")]
    OutsideRoot(PathBuf),
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(String),

    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to build PDF report: {0}")]
    Build(String),

    #[error("Failed to store PDF report: {0}")]
    Storage(#[from] StorageError),
}

/// Reasons a submission is turned away before any job is created.
#[derive(Error, Debug)]
pub enum AdmissionError {
    #[error("A check is already in progress. Please wait until it finishes.")]
    ActiveJob,

    #[error("Daily upload limit reached: {remaining} upload(s) left today, {requested} requested.")]
    QuotaExceeded { remaining: u32, requested: u32 },

    #[error("Nothing to check: no files or text were submitted.")]
    EmptySubmission,

    #[error("{0}")]
    InvalidInput(#[from] ExtractError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("The checking service is shutting down. Please try again later.")]
    ShuttingDown,
}

/// Why a report cannot be handed out.
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Report not found.")]
    NotFound,

    #[error("The report is not available yet (job is {status}).")]
    NotReady {
        status: crate::db::job_repo::JobStatus,
    },

    #[error("The report has been deleted: {reason}.")]
    Deleted {
        at: Option<chrono::DateTime<chrono::Utc>>,
        reason: String,
    },

    #[error("Failed to read report '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

pub type Result<T> = std::result::Result<T, PlagcheckError>;
