use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default = "default_media_root")]
    pub media_root: PathBuf,
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default = "default_daily_limit")]
    pub default_daily_limit: u32,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub segmentation: SegmentationConfig,
    #[serde(default)]
    pub local_matching: LocalMatchingConfig,
    #[serde(default)]
    pub internet: InternetConfig,
    #[serde(default)]
    pub status: StatusConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            media_root: default_media_root(),
            database_path: None,
            worker_count: default_worker_count(),
            default_daily_limit: default_daily_limit(),
            extraction: ExtractionConfig::default(),
            segmentation: SegmentationConfig::default(),
            local_matching: LocalMatchingConfig::default(),
            internet: InternetConfig::default(),
            status: StatusConfig::default(),
        }
    }
}

impl Config {
    /// Database file, falling back to `<media_root>/plagcheck.db`.
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| self.media_root.join("plagcheck.db"))
    }
}

fn default_media_root() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".plagcheck").join("media"))
        .unwrap_or_else(|| PathBuf::from("media"))
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

fn default_daily_limit() -> u32 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
    #[serde(default = "default_min_pasted_chars")]
    pub min_pasted_chars: usize,
    #[serde(default = "default_max_pasted_chars")]
    pub max_pasted_chars: usize,
}

fn default_max_upload_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_min_pasted_chars() -> usize {
    100
}

fn default_max_pasted_chars() -> usize {
    50_000
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: default_max_upload_bytes(),
            min_pasted_chars: default_min_pasted_chars(),
            max_pasted_chars: default_max_pasted_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentationConfig {
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "english".to_string()
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LocalStrategy {
    /// Verbatim substring check, then word-set overlap percentage.
    #[default]
    TokenOverlap,
    /// Relevance-ranked SQLite FTS5 search, scaled to 0-100.
    FullText,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocalMatchingConfig {
    #[serde(default)]
    pub strategy: LocalStrategy,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchProviderKind {
    #[default]
    Disabled,
    Brave,
    Searxng,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InternetConfig {
    #[serde(default)]
    pub provider: SearchProviderKind,
    /// Overrides the provider's default endpoint. Required for SearxNG.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Name of the environment variable holding the provider API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_api_key_env() -> String {
    "BRAVE_SEARCH_API_KEY".to_string()
}

fn default_max_results() -> usize {
    3
}

fn default_request_delay_ms() -> u64 {
    2000
}

fn default_timeout_ms() -> u64 {
    20_000
}

impl Default for InternetConfig {
    fn default() -> Self {
        Self {
            provider: SearchProviderKind::default(),
            endpoint: None,
            api_key_env: default_api_key_env(),
            max_results: default_max_results(),
            request_delay_ms: default_request_delay_ms(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusConfig {
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,
}

fn default_recent_limit() -> usize {
    5
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            recent_limit: default_recent_limit(),
        }
    }
}

/// Input formats the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Text,
}

impl DocumentFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "txt" => Some(Self::Text),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Text => "txt",
        }
    }

    pub fn mime_type(&self) -> String {
        mime_guess::from_ext(self.extension())
            .first()
            .map(|m| m.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string())
    }
}
