use std::path::{Path, PathBuf};

use crate::config::schema::{Config, SearchProviderKind};
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

/// `~/.plagcheck/config.json`, used when no path is given.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".plagcheck").join("config.json"))
}

/// Loads `path`, or the default file when it exists, or the built-in
/// defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<Config, ConfigError> {
    if let Some(path) = path {
        return load_config(path);
    }
    match default_config_path() {
        Some(default) if default.is_file() => load_config(default),
        _ => Ok(Config::default()),
    }
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "worker_count must be at least 1".to_string(),
        });
    }

    let extraction = &config.extraction;
    if extraction.min_pasted_chars > extraction.max_pasted_chars {
        return Err(ConfigError::Validation {
            message: format!(
                "extraction.min_pasted_chars ({}) exceeds extraction.max_pasted_chars ({})",
                extraction.min_pasted_chars, extraction.max_pasted_chars
            ),
        });
    }

    if config.internet.provider == SearchProviderKind::Searxng
        && config
            .internet
            .endpoint
            .as_deref()
            .map_or(true, |e| e.trim().is_empty())
    {
        return Err(ConfigError::Validation {
            message: "internet.endpoint is required for the searxng provider".to_string(),
        });
    }

    crate::segment::SentenceTokenizer::for_language(&config.segmentation.language).map_err(
        |e| ConfigError::Validation {
            message: e.to_string(),
        },
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::LocalStrategy;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_minimal_config() {
        let config = load_config_from_str(r#"{"version": "1.0"}"#).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.default_daily_limit, 5);
    }

    #[test]
    fn test_load_full_config() {
        let json = r#"{
            "version": "1.0",
            "media_root": "/srv/plagcheck",
            "worker_count": 2,
            "default_daily_limit": 10,
            "extraction": {"max_upload_bytes": 1048576},
            "segmentation": {"language": "indonesian"},
            "local_matching": {"strategy": "full_text"},
            "internet": {"provider": "searxng", "endpoint": "http://localhost:8888", "request_delay_ms": 0},
            "status": {"recent_limit": 10}
        }"#;
        let config = load_config_from_str(json).unwrap();
        assert_eq!(config.worker_count, 2);
        assert_eq!(config.default_daily_limit, 10);
        assert_eq!(config.extraction.max_upload_bytes, 1_048_576);
        assert_eq!(config.segmentation.language, "indonesian");
        assert_eq!(config.local_matching.strategy, LocalStrategy::FullText);
        assert_eq!(config.internet.provider, SearchProviderKind::Searxng);
        assert_eq!(config.internet.request_delay_ms, 0);
        assert_eq!(config.status.recent_limit, 10);
    }

    #[test]
    fn test_schema_rejects_unknown_field() {
        let result = load_config_from_str(r#"{"version": "1.0", "ocr": {}}"#);
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_schema_rejects_unknown_strategy() {
        let result =
            load_config_from_str(r#"{"version": "1.0", "local_matching": {"strategy": "fuzzy"}}"#);
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_schema_rejects_wrong_version() {
        let result = load_config_from_str(r#"{"version": "2.0"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_searxng_requires_endpoint() {
        let result =
            load_config_from_str(r#"{"version": "1.0", "internet": {"provider": "searxng"}}"#);
        match result {
            Err(ConfigError::Validation { message }) => assert!(message.contains("endpoint")),
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_language_is_rejected() {
        let result =
            load_config_from_str(r#"{"version": "1.0", "segmentation": {"language": "klingon"}}"#);
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_pasted_limits_must_be_ordered() {
        let result = load_config_from_str(
            r#"{"version": "1.0", "extraction": {"min_pasted_chars": 500, "max_pasted_chars": 100}}"#,
        );
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_invalid_json() {
        let result = load_config_from_str("{ not json");
        assert!(matches!(result, Err(ConfigError::ParseJson(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"version": "1.0", "worker_count": 3}}"#).unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.worker_count, 3);
    }

    #[test]
    fn test_missing_file() {
        let result = load_config("/nonexistent/plagcheck.json");
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let result = load_or_default(Some(Path::new("/nonexistent/plagcheck.json")));
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }
}
