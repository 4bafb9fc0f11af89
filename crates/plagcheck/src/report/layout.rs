//! Minimal page layout on top of raw PDF content streams.
//!
//! Text width is estimated at half the font size per character, which is
//! close enough for Helvetica to wrap prose and table cells.

use std::fmt::Write as _;

pub const PAGE_WIDTH: f64 = 595.0;
pub const PAGE_HEIGHT: f64 = 842.0;
pub const MARGIN: f64 = 50.0;
pub const CONTENT_WIDTH: f64 = PAGE_WIDTH - 2.0 * MARGIN;

const TOP: f64 = PAGE_HEIGHT - MARGIN;
const CELL_PADDING: f64 = 4.0;
const CHAR_WIDTH_FACTOR: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Regular,
    Bold,
    Italic,
}

impl Font {
    /// Resource name registered in the page resources.
    pub fn resource(&self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
            Font::Italic => "F3",
        }
    }

    pub fn base_font(&self) -> &'static str {
        match self {
            Font::Regular => "Helvetica",
            Font::Bold => "Helvetica-Bold",
            Font::Italic => "Helvetica-Oblique",
        }
    }
}

pub struct Column<'a> {
    pub title: &'a str,
    pub width: f64,
}

fn leading(size: f64) -> f64 {
    size * 1.3
}

fn text_width(text: &str, size: f64) -> f64 {
    text.chars().count() as f64 * size * CHAR_WIDTH_FACTOR
}

/// Escapes text for a PDF literal string in WinAnsi encoding.
///
/// Latin-1 letters become octal escapes; characters the standard fonts
/// cannot show become `?`.
pub fn escape_pdf_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            '\n' | '\r' | '\t' => out.push(' '),
            ' '..='~' => out.push(ch),
            '\u{A0}'..='\u{FF}' => {
                let _ = write!(out, "\\{:03o}", ch as u32);
            }
            _ => out.push('?'),
        }
    }
    out
}

/// Greedy word wrap to `max_width` points. Words longer than a line are
/// split.
pub fn wrap_text(text: &str, size: f64, max_width: f64) -> Vec<String> {
    let max_chars = ((max_width / (size * CHAR_WIDTH_FACTOR)).floor() as usize).max(1);
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > max_chars {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let rest = word.split_off(max_chars);
            lines.push(word.into_iter().collect());
            word = rest;
        }

        let current_len = current.chars().count();
        if current_len > 0 && current_len + 1 + word.len() > max_chars {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.extend(word);
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// Accumulates page content streams top to bottom.
pub struct Layout {
    pages: Vec<String>,
    current: String,
    y: f64,
}

impl Default for Layout {
    fn default() -> Self {
        Self::new()
    }
}

impl Layout {
    pub fn new() -> Self {
        Self {
            pages: Vec::new(),
            current: String::new(),
            y: TOP,
        }
    }

    pub fn page_break(&mut self) {
        self.pages.push(std::mem::take(&mut self.current));
        self.y = TOP;
    }

    /// Starts a new page unless `height` still fits on this one.
    fn ensure(&mut self, height: f64) {
        if self.y - height < MARGIN && self.y < TOP {
            self.page_break();
        }
    }

    pub fn space(&mut self, height: f64) {
        self.y -= height;
        if self.y < MARGIN {
            self.page_break();
        }
    }

    fn text_at(&mut self, x: f64, y: f64, font: Font, size: f64, text: &str) {
        let _ = writeln!(
            self.current,
            "BT /{} {} Tf {:.2} {:.2} Td ({}) Tj ET",
            font.resource(),
            size,
            x,
            y,
            escape_pdf_text(text)
        );
    }

    pub fn paragraph(&mut self, text: &str, font: Font, size: f64) {
        for line in wrap_text(text, size, CONTENT_WIDTH) {
            self.ensure(leading(size));
            self.y -= leading(size);
            self.text_at(MARGIN, self.y, font, size, &line);
        }
    }

    pub fn centered(&mut self, text: &str, font: Font, size: f64) {
        self.ensure(leading(size));
        self.y -= leading(size);
        let x = ((PAGE_WIDTH - text_width(text, size)) / 2.0).max(MARGIN);
        self.text_at(x, self.y, font, size, text);
    }

    /// Draws a bordered table. The header row repeats after page breaks.
    pub fn table(&mut self, columns: &[Column<'_>], rows: &[Vec<String>], size: f64) {
        let header: Vec<String> = columns.iter().map(|c| c.title.to_string()).collect();
        self.table_row(columns, &header, Font::Bold, size, true);

        for row in rows {
            let height = self.row_height(columns, row, size);
            if self.y - height < MARGIN {
                self.page_break();
                self.table_row(columns, &header, Font::Bold, size, true);
            }
            self.table_row(columns, row, Font::Regular, size, false);
        }
    }

    fn wrapped_cells(&self, columns: &[Column<'_>], row: &[String], size: f64) -> Vec<Vec<String>> {
        columns
            .iter()
            .enumerate()
            .map(|(i, column)| {
                let text = row.get(i).map(String::as_str).unwrap_or("");
                wrap_text(text, size, column.width - 2.0 * CELL_PADDING)
            })
            .collect()
    }

    fn row_height(&self, columns: &[Column<'_>], row: &[String], size: f64) -> f64 {
        let lines = self
            .wrapped_cells(columns, row, size)
            .iter()
            .map(Vec::len)
            .max()
            .unwrap_or(1);
        lines as f64 * leading(size) + 2.0 * CELL_PADDING
    }

    fn table_row(&mut self, columns: &[Column<'_>], row: &[String], font: Font, size: f64, shaded: bool) {
        let height = self.row_height(columns, row, size);
        self.ensure(height);

        let top = self.y;
        let bottom = top - height;
        let total_width: f64 = columns.iter().map(|c| c.width).sum();

        if shaded {
            let _ = writeln!(
                self.current,
                "0.9 g {:.2} {:.2} {:.2} {:.2} re f 0 g",
                MARGIN, bottom, total_width, height
            );
        }

        let cells = self.wrapped_cells(columns, row, size);
        let mut x = MARGIN;
        for (column, lines) in columns.iter().zip(cells) {
            let _ = writeln!(
                self.current,
                "0.5 w {:.2} {:.2} {:.2} {:.2} re S",
                x, bottom, column.width, height
            );
            let mut baseline = top - CELL_PADDING - size;
            for line in lines {
                self.text_at(x + CELL_PADDING, baseline, font, size, &line);
                baseline -= leading(size);
            }
            x += column.width;
        }

        self.y = bottom;
    }

    /// Content streams of all pages. A trailing empty page is dropped.
    pub fn finish(mut self) -> Vec<String> {
        if !self.current.is_empty() || self.pages.is_empty() {
            self.pages.push(std::mem::take(&mut self.current));
        }
        self.pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_pdf_text() {
        assert_eq!(escape_pdf_text("a (b) \\ c"), "a \\(b\\) \\\\ c");
        assert_eq!(escape_pdf_text("café"), "caf\\351");
        assert_eq!(escape_pdf_text("日本"), "??");
        assert_eq!(escape_pdf_text("line\nbreak"), "line break");
    }

    #[test]
    fn test_wrap_text_respects_width() {
        // 10pt text, 100pt wide: 20 characters per line.
        let lines = wrap_text("the quick brown fox jumps over the lazy dog", 10.0, 100.0);
        assert_eq!(lines, vec!["the quick brown fox", "jumps over the lazy", "dog"]);
        assert!(lines.iter().all(|l| l.chars().count() <= 20));
    }

    #[test]
    fn test_wrap_text_splits_long_words() {
        let lines = wrap_text("abcdefghijkl", 10.0, 50.0);
        assert_eq!(lines, vec!["abcdefghij", "kl"]);
    }

    #[test]
    fn test_wrap_empty_text_yields_one_line() {
        assert_eq!(wrap_text("", 10.0, 100.0), vec![String::new()]);
    }

    #[test]
    fn test_long_content_breaks_pages() {
        let mut layout = Layout::new();
        for i in 0..200 {
            layout.paragraph(&format!("Line number {}", i), Font::Regular, 10.0);
        }
        let pages = layout.finish();
        assert!(pages.len() > 1);
        assert!(pages[0].contains("(Line number 0)"));
    }

    #[test]
    fn test_table_repeats_header_after_break() {
        let mut layout = Layout::new();
        let columns = [
            Column {
                title: "Name",
                width: 200.0,
            },
            Column {
                title: "Value",
                width: 295.0,
            },
        ];
        let rows: Vec<Vec<String>> = (0..80)
            .map(|i| vec![format!("row {}", i), "x".to_string()])
            .collect();
        layout.table(&columns, &rows, 10.0);

        let pages = layout.finish();
        assert!(pages.len() > 1);
        assert!(pages.iter().all(|p| p.contains("(Name)")));
    }

    #[test]
    fn test_trailing_break_adds_no_blank_page() {
        let mut layout = Layout::new();
        layout.paragraph("Only text", Font::Regular, 10.0);
        layout.page_break();
        assert_eq!(layout.finish().len(), 1);
    }
}
