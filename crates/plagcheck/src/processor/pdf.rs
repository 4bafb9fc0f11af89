use std::path::Path;
use std::sync::LazyLock;

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId};
use regex::bytes::Regex;

use crate::config::schema::DocumentFormat;
use crate::error::ExtractError;
use crate::processor::normalize::{normalize, visible_len};
use crate::processor::{DocumentProcessor, ExtractedText};

/// A page yielding fewer characters than this triggers the next strategy.
const MIN_PAGE_CHARS: usize = 20;

/// Below this the first page is treated as a scanned image.
const MIN_FIRST_PAGE_CHARS: usize = 20;

/// Minimum viable size of the whole document after normalization.
const MIN_TOTAL_CHARS: usize = 50;

/// TJ kerning adjustments more negative than this are read as word gaps.
const TJ_SPACE_THRESHOLD: f64 = -200.0;

static RE_LITERAL_STRING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?-u)\(((?:[^()\\]|\\.)*)\)").unwrap());

/// Per-page text strategies, tried in order until one yields enough text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStrategy {
    /// lopdf's own page text extraction.
    Primary,
    /// Text objects (`BT`..`ET`) as blocks; image paints are skipped.
    Blocks,
    /// Show-text spans regrouped into lines by positioning operators.
    Spans,
    /// Operator dump of the content stream with markup stripped.
    RawStream,
}

const STRATEGIES: [PageStrategy; 4] = [
    PageStrategy::Primary,
    PageStrategy::Blocks,
    PageStrategy::Spans,
    PageStrategy::RawStream,
];

pub struct PdfProcessor;

impl PdfProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PdfProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentProcessor for PdfProcessor {
    fn process(&self, path: &Path) -> Result<ExtractedText, ExtractError> {
        let _span = tracing::info_span!("processor.pdf").entered();

        let pdf_bytes = std::fs::read(path).map_err(|e| ExtractError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let doc = load_document(&pdf_bytes)?;
        let pages = doc.get_pages();

        // Validation: non-empty, unprotected, first page carries real text.
        if pages.is_empty() {
            return Err(ExtractError::NoPages);
        }

        let mut page_texts = Vec::with_capacity(pages.len());
        for (index, (page_num, page_id)) in pages.iter().enumerate() {
            let text = extract_page(&doc, *page_num, *page_id);
            if index == 0 && visible_len(&text) < MIN_FIRST_PAGE_CHARS {
                tracing::info!(
                    chars = visible_len(&text),
                    "First page has almost no text; treating as scanned"
                );
                return Err(ExtractError::LikelyScanned);
            }
            page_texts.push(text);
        }

        let text = normalize(&page_texts.join("\n\n"));
        let chars = visible_len(&text);
        if chars < MIN_TOTAL_CHARS {
            return Err(ExtractError::InsufficientText { chars });
        }

        tracing::debug!(pages = pages.len(), chars, "PDF text extracted");

        Ok(ExtractedText {
            text,
            format: DocumentFormat::Pdf,
            page_count: Some(pages.len()),
        })
    }

    fn supports(&self, format: DocumentFormat) -> bool {
        matches!(format, DocumentFormat::Pdf)
    }
}

fn load_document(bytes: &[u8]) -> Result<Document, ExtractError> {
    let doc = Document::load_mem(bytes).map_err(|e| {
        let message = e.to_string();
        let lowered = message.to_lowercase();
        if lowered.contains("decrypt") || lowered.contains("encrypt") || lowered.contains("password")
        {
            ExtractError::PasswordProtected
        } else {
            ExtractError::Parse(format!("Failed to load PDF: {}", message))
        }
    })?;

    if doc.trailer.get(b"Encrypt").is_ok() {
        return Err(ExtractError::PasswordProtected);
    }

    Ok(doc)
}

/// Runs the strategy chain for one page and keeps the longest result.
fn extract_page(doc: &Document, page_num: u32, page_id: ObjectId) -> String {
    let mut best = String::new();

    for strategy in STRATEGIES {
        let text = run_strategy(doc, page_num, page_id, strategy).unwrap_or_default();
        if visible_len(&text) > visible_len(&best) {
            best = text;
        }
        if visible_len(&best) >= MIN_PAGE_CHARS {
            if strategy != PageStrategy::Primary {
                tracing::debug!(page = page_num, ?strategy, "Page recovered by fallback");
            }
            break;
        }
    }

    best
}

pub fn run_strategy(
    doc: &Document,
    page_num: u32,
    page_id: ObjectId,
    strategy: PageStrategy,
) -> Option<String> {
    match strategy {
        PageStrategy::Primary => doc.extract_text(&[page_num]).ok(),
        PageStrategy::Blocks => page_operations(doc, page_id).map(|ops| text_blocks(&ops)),
        PageStrategy::Spans => page_operations(doc, page_id).map(|ops| text_spans(&ops)),
        PageStrategy::RawStream => doc
            .get_page_content(page_id)
            .ok()
            .map(|raw| strip_stream_markup(&raw)),
    }
}

fn page_operations(doc: &Document, page_id: ObjectId) -> Option<Vec<Operation>> {
    let raw = doc.get_page_content(page_id).ok()?;
    Content::decode(&raw).ok().map(|c| c.operations)
}

fn text_blocks(ops: &[Operation]) -> String {
    let mut blocks = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    for op in ops {
        match op.operator.as_str() {
            "BT" => {
                in_text = true;
                current.clear();
            }
            "ET" => {
                in_text = false;
                if !current.trim().is_empty() {
                    blocks.push(current.trim().to_string());
                }
                current.clear();
            }
            // XObject paints (images, forms) carry no inline text.
            "Do" | "BI" | "ID" | "EI" => {}
            "T*" | "Td" | "TD" | "Tm" if in_text => {
                if !current.is_empty() && !current.ends_with(' ') {
                    current.push(' ');
                }
            }
            _ if in_text => {
                if let Some(text) = shown_text(op) {
                    if matches!(op.operator.as_str(), "'" | "\"") && !current.is_empty() {
                        current.push(' ');
                    }
                    current.push_str(&text);
                }
            }
            _ => {}
        }
    }

    blocks.join("\n")
}

fn text_spans(ops: &[Operation]) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut line = String::new();
    let mut line_y: Option<f64> = None;
    let mut y = 0.0_f64;

    for op in ops {
        match op.operator.as_str() {
            "Tm" => {
                if let Some(ty) = op.operands.get(5).and_then(as_number) {
                    y = ty;
                }
            }
            "Td" | "TD" => {
                if let Some(ty) = op.operands.get(1).and_then(as_number) {
                    y += ty;
                }
            }
            "T*" | "'" | "\"" => {
                flush(&mut line, &mut lines);
                line_y = None;
            }
            _ => {}
        }

        if let Some(span) = shown_text(op) {
            if line_y.is_some_and(|ly| (ly - y).abs() > 0.5) {
                flush(&mut line, &mut lines);
            }
            line_y = Some(y);
            if !line.is_empty() && !line.ends_with(' ') && !span.starts_with(' ') {
                line.push(' ');
            }
            line.push_str(&span);
        }
    }
    flush(&mut line, &mut lines);

    lines.join("\n")
}

fn flush(line: &mut String, lines: &mut Vec<String>) {
    if !line.trim().is_empty() {
        lines.push(line.trim().to_string());
    }
    line.clear();
}

/// Decodes the string operands of a show-text operator.
fn shown_text(op: &Operation) -> Option<String> {
    match op.operator.as_str() {
        "Tj" | "'" => op.operands.first().and_then(decode_string),
        "\"" => op.operands.get(2).and_then(decode_string),
        "TJ" => {
            let items = op.operands.first()?.as_array().ok()?;
            let mut out = String::new();
            for item in items {
                match item {
                    Object::String(..) => {
                        if let Some(s) = decode_string(item) {
                            out.push_str(&s);
                        }
                    }
                    other => {
                        if as_number(other).is_some_and(|n| n < TJ_SPACE_THRESHOLD) {
                            out.push(' ');
                        }
                    }
                }
            }
            Some(out)
        }
        _ => None,
    }
}

fn decode_string(obj: &Object) -> Option<String> {
    match obj {
        Object::String(bytes, _) => Some(decode_pdf_bytes(bytes)),
        _ => None,
    }
}

/// UTF-16BE when a byte order mark is present, otherwise Latin-1.
fn decode_pdf_bytes(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|&b| b as char).collect()
}

fn as_number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

/// Keeps only the literal strings of a raw content stream.
fn strip_stream_markup(raw: &[u8]) -> String {
    let mut pieces = Vec::new();
    for caps in RE_LITERAL_STRING.captures_iter(raw) {
        if let Some(m) = caps.get(1) {
            let unescaped = unescape_literal(m.as_bytes());
            let text = decode_pdf_bytes(&unescaped);
            if !text.trim().is_empty() {
                pieces.push(text);
            }
        }
    }
    pieces.join(" ")
}

fn unescape_literal(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b != b'\\' || i + 1 >= bytes.len() {
            out.push(b);
            i += 1;
            continue;
        }
        let next = bytes[i + 1];
        i += 2;
        match next {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0C),
            b'0'..=b'7' => {
                let mut value = u32::from(next - b'0');
                let mut digits = 1;
                while digits < 3 && i < bytes.len() && (b'0'..=b'7').contains(&bytes[i]) {
                    value = value * 8 + u32::from(bytes[i] - b'0');
                    i += 1;
                    digits += 1;
                }
                out.push((value & 0xFF) as u8);
            }
            b'\n' | b'\r' => {}
            other => out.push(other),
        }
    }
    out
}
