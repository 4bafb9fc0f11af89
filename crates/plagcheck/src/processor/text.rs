use std::path::Path;

use crate::config::schema::DocumentFormat;
use crate::error::ExtractError;
use crate::processor::normalize::{sanitize_for_storage, visible_len};
use crate::processor::{DocumentProcessor, ExtractedText};

/// Reads pasted text that intake stored as a plain-text temp file.
///
/// The content is used verbatim apart from the storage-safety filter;
/// length limits are enforced when the text is submitted.
pub struct TextProcessor;

impl TextProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TextProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentProcessor for TextProcessor {
    fn process(&self, path: &Path) -> Result<ExtractedText, ExtractError> {
        let _span = tracing::info_span!("processor.text").entered();

        let bytes = std::fs::read(path).map_err(|e| ExtractError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let text = sanitize_for_storage(String::from_utf8_lossy(&bytes).trim());

        Ok(ExtractedText {
            text,
            format: DocumentFormat::Text,
            page_count: None,
        })
    }

    fn supports(&self, format: DocumentFormat) -> bool {
        matches!(format, DocumentFormat::Text)
    }
}

/// Checks pasted text against the configured length window and returns the
/// trimmed text.
pub fn validate_pasted(text: &str, min_chars: usize, max_chars: usize) -> Result<String, ExtractError> {
    let trimmed = text.trim();
    let chars = visible_len(trimmed);
    if chars < min_chars {
        return Err(ExtractError::TooShort {
            chars,
            min: min_chars,
        });
    }
    if chars > max_chars {
        return Err(ExtractError::TooLong {
            chars,
            max: max_chars,
        });
    }
    Ok(trimmed.to_string())
}
