pub mod docx;
pub mod normalize;
pub mod pdf;
pub mod text;

use std::path::Path;

use crate::config::schema::DocumentFormat;
use crate::error::ExtractError;

pub use normalize::{clean_text, normalize, sanitize_for_storage};

/// Normalized, storage-safe text produced by an extractor.
#[derive(Debug, Clone)]
pub struct ExtractedText {
    pub text: String,
    pub format: DocumentFormat,
    /// Number of pages for paginated formats.
    pub page_count: Option<usize>,
}

pub trait DocumentProcessor: Send + Sync {
    fn process(&self, path: &Path) -> Result<ExtractedText, ExtractError>;
    fn supports(&self, format: DocumentFormat) -> bool;
}

pub struct ProcessorRegistry {
    processors: Vec<Box<dyn DocumentProcessor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        let processors: Vec<Box<dyn DocumentProcessor>> = vec![
            Box::new(pdf::PdfProcessor::new()),
            Box::new(docx::DocxProcessor::new()),
            Box::new(text::TextProcessor::new()),
        ];

        Self { processors }
    }

    /// Extracts text from `path` using the processor for the declared format.
    pub fn process(&self, path: &Path, format: DocumentFormat) -> Result<ExtractedText, ExtractError> {
        for processor in &self.processors {
            if processor.supports(format) {
                return processor.process(path);
            }
        }

        Err(ExtractError::UnsupportedFormat(format.extension().to_string()))
    }

    /// Extracts text choosing the processor from the file extension.
    pub fn process_path(&self, path: &Path) -> Result<ExtractedText, ExtractError> {
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let format = DocumentFormat::from_extension(extension)
            .ok_or_else(|| ExtractError::UnsupportedFormat(extension.to_string()))?;

        self.process(path, format)
    }
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
