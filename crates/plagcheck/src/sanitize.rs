//! Helpers for sanitizing data before it enters tracing spans or the
//! media store.
//!
//! Traces are safe to share for debugging. Uploaded file names are
//! reduced to a safe display form before they reach disk or the database.

use std::path::Path;

/// Longest display filename kept after sanitizing.
pub const MAX_FILENAME_CHARS: usize = 200;

/// Returns only the filename component of a path (no directory).
///
/// Safe for span fields: reveals the file name without exposing the full path.
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Reduces a client supplied filename to a safe display name.
///
/// Directory components are dropped, anything outside `[A-Za-z0-9._ -]`
/// becomes `_`, and the result is capped at [`MAX_FILENAME_CHARS`] while
/// keeping the extension.
pub fn sanitize_filename(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name)
        .trim();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();

    if cleaned.is_empty() {
        return "document".to_string();
    }

    if cleaned.chars().count() <= MAX_FILENAME_CHARS {
        return cleaned;
    }

    match cleaned.rfind('.') {
        Some(dot) if cleaned.len() - dot <= 10 => {
            let ext = &cleaned[dot..];
            let stem: String = cleaned[..dot]
                .chars()
                .take(MAX_FILENAME_CHARS - ext.chars().count())
                .collect();
            format!("{}{}", stem, ext)
        }
        _ => cleaned.chars().take(MAX_FILENAME_CHARS).collect(),
    }
}
