//! Fixture documents and web search fakes.

#![allow(dead_code)]

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};

use lopdf::{dictionary, Document, Object, Stream};

use plagcheck::matcher::search::{SearchError, WebSearch};

/// Builds a text PDF with one page per entry, one line per sentence.
pub struct PdfBuilder {
    pages: Vec<Vec<String>>,
}

impl PdfBuilder {
    pub fn new() -> Self {
        Self { pages: Vec::new() }
    }

    pub fn page(mut self, lines: &[&str]) -> Self {
        self.pages.push(lines.iter().map(|l| l.to_string()).collect());
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids = Vec::new();
        for lines in &self.pages {
            let mut content = String::from("BT /F1 11 Tf 50 760 Td 14 TL\n");
            for line in lines {
                content.push_str(&format!("({} ) Tj T*\n", line));
            }
            content.push_str("ET");

            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
                "Resources" => resources_id,
                "Contents" => content_id,
            });
            kids.push(Object::from(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("Failed to serialize fixture PDF");
        bytes
    }
}

impl Default for PdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds a minimal DOCX with one paragraph per entry.
pub struct DocxBuilder {
    paragraphs: Vec<String>,
}

impl DocxBuilder {
    pub fn new() -> Self {
        Self {
            paragraphs: Vec::new(),
        }
    }

    pub fn paragraph(mut self, text: &str) -> Self {
        self.paragraphs.push(text.to_string());
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let body: String = self
            .paragraphs
            .iter()
            .map(|p| format!(r#"<w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#, p))
            .collect();
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
            body
        );

        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut cursor);
            let options = zip::write::SimpleFileOptions::default();
            zip.start_file("word/document.xml", options)
                .expect("Failed to start DOCX entry");
            zip.write_all(xml.as_bytes()).expect("Failed to write DOCX entry");
            zip.finish().expect("Failed to finish DOCX");
        }
        cursor.into_inner()
    }
}

impl Default for DocxBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Finds a page for queries containing one of the given phrases.
pub struct PhraseSearch {
    phrases: Vec<(String, String)>,
    calls: AtomicUsize,
}

impl PhraseSearch {
    pub fn new(entries: &[(&str, &str)]) -> Self {
        Self {
            phrases: entries
                .iter()
                .map(|(phrase, url)| (phrase.to_lowercase(), url.to_string()))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl WebSearch for PhraseSearch {
    fn name(&self) -> &'static str {
        "phrase"
    }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<String>, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let query = query.to_lowercase();
        Ok(self
            .phrases
            .iter()
            .filter(|(phrase, _)| query.contains(phrase.as_str()))
            .map(|(_, url)| url.clone())
            .take(limit)
            .collect())
    }
}

/// Holds every search until [`GateSearch::open`] is called.
#[derive(Default)]
pub struct GateSearch {
    open: Mutex<bool>,
    changed: Condvar,
}

impl GateSearch {
    pub fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.changed.notify_all();
    }
}

impl WebSearch for GateSearch {
    fn name(&self) -> &'static str {
        "gate"
    }

    fn search(&self, _query: &str, _limit: usize) -> Result<Vec<String>, SearchError> {
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.changed.wait(open).unwrap();
        }
        Ok(Vec::new())
    }
}
