//! PDF report synthesis.
//!
//! Reports are written with lopdf using the standard Helvetica fonts and
//! uncompressed content streams.

pub mod layout;

use chrono::{DateTime, Local};
use lopdf::{dictionary, Document, Object, Stream};

use crate::aggregate::{AggregationResult, CheckMode, MatchMetadata, SentenceResult};
use crate::error::ReportError;
use crate::storage::{MediaStorage, StoredReport};

use layout::{Column, Font, Layout, MARGIN, PAGE_HEIGHT, PAGE_WIDTH};

/// Sentences longer than this are shortened in the detail table.
pub const SENTENCE_PREVIEW_CHARS: usize = 80;

pub const NO_PLAGIARISM_NOTICE: &str = "No plagiarism detected.";

const BODY_SIZE: f64 = 10.0;
const TABLE_SIZE: f64 = 9.0;
const HEADING_SIZE: f64 = 12.0;
const TITLE_SIZE: f64 = 16.0;

/// Everything a report shows about one job.
pub struct ReportInput<'a> {
    pub filename: &'a str,
    pub checked_at: DateTime<Local>,
    pub threshold: u8,
    pub mode: CheckMode,
    pub result: &'a AggregationResult,
}

pub struct ReportSynthesizer {
    storage: MediaStorage,
}

impl ReportSynthesizer {
    pub fn new(storage: MediaStorage) -> Self {
        Self { storage }
    }

    /// Renders the report to PDF bytes.
    pub fn render(&self, input: &ReportInput<'_>) -> Result<Vec<u8>, ReportError> {
        build_pdf(compose(input), input.filename)
    }

    /// Renders the report and stores it under the reports directory.
    pub fn generate(&self, input: &ReportInput<'_>) -> Result<StoredReport, ReportError> {
        let bytes = self.render(input)?;
        let stored = self.storage.write_report(&bytes)?;
        tracing::debug!(pointer = %stored.pointer, bytes = bytes.len(), "Report written");
        Ok(stored)
    }
}

fn heading(layout: &mut Layout, text: &str) {
    layout.space(10.0);
    layout.paragraph(text, Font::Bold, HEADING_SIZE);
    layout.space(4.0);
}

fn compose(input: &ReportInput<'_>) -> Vec<String> {
    let result = input.result;
    let mut layout = Layout::new();

    layout.centered("Plagiarism Check Report", Font::Bold, TITLE_SIZE);
    layout.space(8.0);
    layout.paragraph(&format!("File: {}", input.filename), Font::Regular, BODY_SIZE);
    layout.paragraph(
        &format!("Checked at: {}", input.checked_at.format("%Y-%m-%d %H:%M")),
        Font::Regular,
        BODY_SIZE,
    );
    layout.paragraph(&format!("Check mode: {}", input.mode), Font::Regular, BODY_SIZE);
    layout.paragraph(
        &format!("Similarity threshold: {}%", input.threshold),
        Font::Regular,
        BODY_SIZE,
    );
    layout.paragraph(
        &format!("Sentences checked: {}", result.total_sentences),
        Font::Regular,
        BODY_SIZE,
    );

    heading(&mut layout, "Similarity Summary");
    layout.table(
        &[
            Column {
                title: "Measure",
                width: 245.0,
            },
            Column {
                title: "Similarity",
                width: 250.0,
            },
        ],
        &[
            vec!["Global".to_string(), format!("{}%", result.similarity_global)],
            vec!["Local corpus".to_string(), format!("{}%", result.similarity_local)],
            vec!["Internet".to_string(), format!("{}%", result.similarity_internet)],
        ],
        TABLE_SIZE,
    );

    if !result.sources.local.is_empty() {
        heading(&mut layout, "Local Sources");
        let rows: Vec<Vec<String>> = result
            .sources
            .local
            .iter()
            .enumerate()
            .map(|(i, source)| {
                vec![
                    (i + 1).to_string(),
                    source.title.clone(),
                    source.author.clone().unwrap_or_else(|| "-".to_string()),
                    source
                        .year
                        .map(|y| y.to_string())
                        .unwrap_or_else(|| "N/A".to_string()),
                    source.count.to_string(),
                ]
            })
            .collect();
        layout.table(
            &[
                Column {
                    title: "No",
                    width: 30.0,
                },
                Column {
                    title: "Title",
                    width: 215.0,
                },
                Column {
                    title: "Author",
                    width: 120.0,
                },
                Column {
                    title: "Year",
                    width: 50.0,
                },
                Column {
                    title: "Sentences",
                    width: 80.0,
                },
            ],
            &rows,
            TABLE_SIZE,
        );
    }

    if !result.sources.internet.is_empty() {
        heading(&mut layout, "Internet Sources");
        for (i, url) in result.sources.internet.iter().enumerate() {
            layout.paragraph(&format!("{}. {}", i + 1, url), Font::Regular, BODY_SIZE);
        }
    }

    layout.page_break();
    heading(&mut layout, "Sentence Details");
    if result.results.is_empty() {
        layout.paragraph(NO_PLAGIARISM_NOTICE, Font::Italic, BODY_SIZE);
    } else {
        let rows: Vec<Vec<String>> = result
            .results
            .iter()
            .enumerate()
            .map(|(i, sentence)| detail_row(i + 1, sentence))
            .collect();
        layout.table(
            &[
                Column {
                    title: "No",
                    width: 30.0,
                },
                Column {
                    title: "Sentence",
                    width: 215.0,
                },
                Column {
                    title: "Source",
                    width: 60.0,
                },
                Column {
                    title: "Score",
                    width: 50.0,
                },
                Column {
                    title: "Reference",
                    width: 140.0,
                },
            ],
            &rows,
            TABLE_SIZE,
        );
    }

    heading(&mut layout, "Legend");
    for line in [
        "Global: share of sentences whose best score reaches the threshold.",
        "Local corpus: share of sentences matched against indexed documents.",
        "Internet: share of sentences found verbatim on the web.",
        "Score: the higher of the local and internet scores of a sentence.",
    ] {
        layout.paragraph(line, Font::Regular, TABLE_SIZE);
    }

    layout.finish()
}

fn detail_row(number: usize, sentence: &SentenceResult) -> Vec<String> {
    let reference = match &sentence.metadata {
        Some(MatchMetadata::Local {
            title, author, year, ..
        }) => {
            let author = author.as_deref().unwrap_or("-");
            match year {
                Some(year) => format!("{} ({}, {})", title, author, year),
                None => format!("{} ({})", title, author),
            }
        }
        Some(MatchMetadata::Internet { url }) => url.clone(),
        None => "-".to_string(),
    };

    vec![
        number.to_string(),
        preview(&sentence.text),
        sentence.attribution.label().to_string(),
        format!("{:.1}%", sentence.final_score),
        reference,
    ]
}

/// First [`SENTENCE_PREVIEW_CHARS`] characters, with an ellipsis when cut.
pub fn preview(text: &str) -> String {
    if text.chars().count() <= SENTENCE_PREVIEW_CHARS {
        return text.to_string();
    }
    let mut short: String = text.chars().take(SENTENCE_PREVIEW_CHARS).collect();
    short.push_str("...");
    short
}

fn footer(page: usize, total: usize) -> String {
    let text = format!("Page {} of {}", page, total);
    format!(
        "BT /{} 8 Tf {:.2} {:.2} Td ({}) Tj ET\n",
        Font::Regular.resource(),
        PAGE_WIDTH - MARGIN - 40.0,
        MARGIN / 2.0,
        text
    )
}

fn build_pdf(pages: Vec<String>, filename: &str) -> Result<Vec<u8>, ReportError> {
    let mut doc = Document::with_version("1.5");

    let pages_id = doc.new_object_id();
    let resources_id = doc.new_object_id();

    let mut fonts = lopdf::Dictionary::new();
    for font in [Font::Regular, Font::Bold, Font::Italic] {
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => font.base_font(),
            "Encoding" => "WinAnsiEncoding",
        });
        fonts.set(font.resource(), font_id);
    }

    doc.objects.insert(
        resources_id,
        Object::Dictionary(dictionary! {
            "Font" => fonts,
        }),
    );

    let total = pages.len();
    let mut page_ids = Vec::with_capacity(total);
    for (i, mut content) in pages.into_iter().enumerate() {
        content.push_str(&footer(i + 1, total));

        let content_id = doc.add_object(Object::Stream(Stream::new(
            dictionary! {},
            content.into_bytes(),
        )));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), (PAGE_WIDTH as i64).into(), (PAGE_HEIGHT as i64).into()],
            "Resources" => resources_id,
            "Contents" => content_id,
        });
        page_ids.push(page_id);
    }

    let kids: Vec<Object> = page_ids.iter().map(|id| (*id).into()).collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => total as i64,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal(format!("Plagiarism report: {}", filename)),
        "Producer" => Object::string_literal("plagcheck"),
    });
    doc.trailer.set("Info", info_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| ReportError::Build(e.to_string()))?;

    Ok(buffer)
}
