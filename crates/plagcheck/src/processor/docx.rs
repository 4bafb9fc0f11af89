use std::io::Read;
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::config::schema::DocumentFormat;
use crate::error::ExtractError;
use crate::processor::normalize::{normalize, visible_len};
use crate::processor::{DocumentProcessor, ExtractedText};

/// Combined paragraph and table text below this is rejected.
const MIN_DOCX_CHARS: usize = 100;

/// Upper bound on the `word/document.xml` bytes read into memory.
const MAX_DOCUMENT_XML_BYTES: u64 = 64 * 1024 * 1024;

pub struct DocxProcessor;

impl DocxProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DocxProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentProcessor for DocxProcessor {
    fn process(&self, path: &Path) -> Result<ExtractedText, ExtractError> {
        let _span = tracing::info_span!("processor.docx").entered();

        let file = std::fs::File::open(path).map_err(|e| ExtractError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut archive = zip::ZipArchive::new(file)
            .map_err(|e| ExtractError::Parse(format!("Failed to open DOCX: {}", e)))?;

        let raw = extract_docx_text(&mut archive)?;
        let text = normalize(&raw);

        let chars = visible_len(&text);
        if chars < MIN_DOCX_CHARS {
            return Err(ExtractError::TooShort {
                chars,
                min: MIN_DOCX_CHARS,
            });
        }

        Ok(ExtractedText {
            text,
            format: DocumentFormat::Docx,
            page_count: None,
        })
    }

    fn supports(&self, format: DocumentFormat) -> bool {
        matches!(format, DocumentFormat::Docx)
    }
}

fn extract_docx_text<R: Read + std::io::Seek>(
    archive: &mut zip::ZipArchive<R>,
) -> Result<String, ExtractError> {
    let document_xml = archive
        .by_name("word/document.xml")
        .map_err(|e| ExtractError::Parse(format!("Failed to find document.xml: {}", e)))?;

    let mut xml_content = String::new();
    document_xml
        .take(MAX_DOCUMENT_XML_BYTES)
        .read_to_string(&mut xml_content)
        .map_err(|e| ExtractError::Parse(format!("Failed to read document.xml: {}", e)))?;

    parse_docx_xml(&xml_content)
}

/// Collects body paragraphs in order, then appends the text of every table
/// cell, one cell per line.
fn parse_docx_xml(xml: &str) -> Result<String, ExtractError> {
    let mut reader = Reader::from_str(xml);

    let mut paragraphs: Vec<String> = Vec::new();
    let mut cells: Vec<String> = Vec::new();

    let mut paragraph = String::new();
    let mut cell = String::new();
    let mut in_text_element = false;
    let mut table_depth = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text_element = true,
                b"tbl" => table_depth += 1,
                b"tc" if table_depth > 0 => cell.clear(),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"tab" | b"br" | b"cr" => paragraph.push(' '),
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text_element = false,
                b"p" => {
                    let text = std::mem::take(&mut paragraph);
                    if table_depth > 0 {
                        if !cell.is_empty() {
                            cell.push(' ');
                        }
                        cell.push_str(text.trim());
                    } else {
                        paragraphs.push(text.trim().to_string());
                    }
                }
                b"tc" if table_depth > 0 => {
                    let text = cell.trim().to_string();
                    if !text.is_empty() {
                        cells.push(text);
                    }
                    cell.clear();
                }
                b"tbl" => table_depth = table_depth.saturating_sub(1),
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_text_element {
                    let raw = String::from_utf8_lossy(&e);
                    let decoded = quick_xml::escape::unescape(&raw)
                        .map(|c| c.into_owned())
                        .unwrap_or_else(|_| raw.to_string());
                    paragraph.push_str(&decoded);
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if in_text_element {
                    if let Ok(Some(ch)) = e.resolve_char_ref() {
                        paragraph.push(ch);
                    } else if let Ok(name) = e.decode() {
                        if let Some(resolved) = quick_xml::escape::resolve_xml_entity(&name) {
                            paragraph.push_str(resolved);
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ExtractError::Parse(format!("XML parsing error: {}", e)));
            }
            _ => {}
        }
    }

    let mut text = paragraphs.join("\n");
    if !cells.is_empty() {
        text.push('\n');
        text.push_str(&cells.join("\n"));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn body(inner: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
            inner
        )
    }

    fn para(text: &str) -> String {
        format!(r#"<w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#, text)
    }

    fn write_docx(document_xml: &str) -> NamedTempFile {
        let file = NamedTempFile::with_suffix(".docx").unwrap();
        let mut zip = zip::ZipWriter::new(std::fs::File::create(file.path()).unwrap());
        let options = zip::write::SimpleFileOptions::default();
        zip.start_file("word/document.xml", options).unwrap();
        zip.write_all(document_xml.as_bytes()).unwrap();
        zip.finish().unwrap();
        file
    }

    #[test]
    fn test_supports_docx_format() {
        let processor = DocxProcessor::new();
        assert!(processor.supports(DocumentFormat::Docx));
        assert!(!processor.supports(DocumentFormat::Pdf));
    }

    #[test]
    fn test_paragraphs_then_tables() {
        let xml = body(&format!(
            "{}<w:tbl><w:tr><w:tc>{}</w:tc><w:tc>{}</w:tc></w:tr></w:tbl>{}",
            para("Opening paragraph."),
            para("Cell one"),
            para("Cell two"),
            para("Closing paragraph.")
        ));
        let text = parse_docx_xml(&xml).unwrap();
        assert_eq!(
            text,
            "Opening paragraph.\nClosing paragraph.\nCell one\nCell two"
        );
    }

    #[test]
    fn test_runs_keep_spacing_and_entities() {
        let xml = body(
            r#"<w:p><w:r><w:t>Fish</w:t></w:r><w:r><w:t xml:space="preserve"> &amp; chips</w:t></w:r></w:p>"#,
        );
        assert_eq!(parse_docx_xml(&xml).unwrap(), "Fish & chips");
    }

    #[test]
    fn test_process_docx_file() {
        let sentence = "Academic writing requires careful citation of every borrowed idea.";
        let xml = body(&format!("{}{}", para(sentence), para(sentence)));
        let file = write_docx(&xml);

        let extracted = DocxProcessor::new().process(file.path()).unwrap();
        assert_eq!(extracted.format, DocumentFormat::Docx);
        assert!(extracted.text.starts_with("Academic writing"));
        assert_eq!(extracted.text.lines().count(), 2);
    }

    #[test]
    fn test_short_docx_is_rejected() {
        let file = write_docx(&body(&para("Too short to check.")));
        match DocxProcessor::new().process(file.path()) {
            Err(ExtractError::TooShort { min, .. }) => assert_eq!(min, MIN_DOCX_CHARS),
            other => panic!("Expected TooShort, got {:?}", other.map(|e| e.text)),
        }
    }

    #[test]
    fn test_not_a_zip() {
        let mut file = NamedTempFile::with_suffix(".docx").unwrap();
        file.write_all(b"plain bytes").unwrap();
        assert!(matches!(
            DocxProcessor::new().process(file.path()),
            Err(ExtractError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_document_xml() {
        let file = NamedTempFile::with_suffix(".docx").unwrap();
        let mut zip = zip::ZipWriter::new(std::fs::File::create(file.path()).unwrap());
        zip.start_file("other.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"<x/>").unwrap();
        zip.finish().unwrap();

        match DocxProcessor::new().process(file.path()) {
            Err(ExtractError::Parse(msg)) => assert!(msg.contains("document.xml")),
            other => panic!("Expected Parse error, got {:?}", other.map(|e| e.text)),
        }
    }
}
