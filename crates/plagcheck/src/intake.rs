//! Turns a submission into temporary inputs under the media root.
//!
//! Every upload is validated before anything is written, so a rejected
//! submission leaves nothing behind.

use std::path::PathBuf;

use chrono::{DateTime, Local};

use crate::config::{DocumentFormat, ExtractionConfig};
use crate::error::{AdmissionError, ExtractError};
use crate::processor::text::validate_pasted;
use crate::sanitize::sanitize_filename;
use crate::storage::MediaStorage;

/// A file as received from the client.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }
}

/// What a user asks to have checked.
#[derive(Debug, Clone)]
pub enum Submission {
    Files(Vec<Upload>),
    Text(String),
}

/// A validated input written to the temp area.
#[derive(Debug, Clone)]
pub struct PreparedInput {
    pub filename: String,
    pub path: PathBuf,
    pub format: DocumentFormat,
}

/// Accepted upload formats. Plain text only arrives as pasted text.
fn upload_format(filename: &str) -> Result<DocumentFormat, ExtractError> {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .unwrap_or("")
        .to_lowercase();
    match DocumentFormat::from_extension(&extension) {
        Some(format @ (DocumentFormat::Pdf | DocumentFormat::Docx)) => Ok(format),
        _ => Err(ExtractError::UnsupportedFormat(extension)),
    }
}

/// Display name of pasted text submitted at `at`.
pub fn pasted_text_name(at: DateTime<Local>) -> String {
    format!("Pasted_Text_{}.txt", at.format("%Y%m%d_%H%M%S"))
}

/// Validates `submission` and writes its inputs to the temp area.
pub fn prepare(
    submission: &Submission,
    limits: &ExtractionConfig,
    storage: &MediaStorage,
    now: DateTime<Local>,
) -> Result<Vec<PreparedInput>, AdmissionError> {
    match submission {
        Submission::Text(text) => {
            let text = validate_pasted(text, limits.min_pasted_chars, limits.max_pasted_chars)?;
            let path = storage.write_temp(text.as_bytes(), DocumentFormat::Text.extension())?;
            Ok(vec![PreparedInput {
                filename: pasted_text_name(now),
                path,
                format: DocumentFormat::Text,
            }])
        }
        Submission::Files(uploads) => {
            let mut validated = Vec::with_capacity(uploads.len());
            for upload in uploads {
                let format = upload_format(&upload.filename)?;
                let size = upload.bytes.len() as u64;
                if size > limits.max_upload_bytes {
                    return Err(ExtractError::FileTooLarge {
                        size,
                        max: limits.max_upload_bytes,
                    }
                    .into());
                }
                validated.push((upload, format));
            }

            let mut prepared: Vec<PreparedInput> = Vec::with_capacity(validated.len());
            for (upload, format) in validated {
                match storage.write_temp(&upload.bytes, format.extension()) {
                    Ok(path) => prepared.push(PreparedInput {
                        filename: sanitize_filename(&upload.filename),
                        path,
                        format,
                    }),
                    Err(e) => {
                        discard(storage, &prepared);
                        return Err(e.into());
                    }
                }
            }
            Ok(prepared)
        }
    }
}

/// Removes prepared temporaries of a submission that was not admitted.
pub fn discard(storage: &MediaStorage, inputs: &[PreparedInput]) {
    for input in inputs {
        if let Err(e) = storage.remove(&input.path) {
            tracing::warn!(error = %e, "Failed to remove temporary input");
        }
    }
}
