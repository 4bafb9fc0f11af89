//! Text clean-up applied to every extractor's output.

use std::sync::LazyLock;

use regex::Regex;

static RE_HORIZONTAL_WS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t\x0C\x0B]+").unwrap());
static RE_BLANK_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

fn is_allowed(c: char) -> bool {
    if c.is_ascii() {
        c.is_ascii_alphanumeric()
            || c.is_ascii_whitespace()
            || matches!(
                c,
                '_' | '.' | ',' | '!' | '?' | ';' | ':' | '(' | ')' | '-' | '"' | '\'' | '/'
            )
    } else {
        // Basic multilingual plane only; astral symbols are dropped.
        (c as u32) <= 0xFFFF
    }
}

/// Normalizes extracted text.
///
/// Characters outside the allow-list become spaces, horizontal whitespace
/// runs collapse to one space, every line is trimmed and runs of blank
/// lines shrink to a single blank line.
pub fn clean_text(raw: &str) -> String {
    let unified = raw.replace("\r\n", "\n").replace('\r', "\n");

    let filtered: String = unified
        .chars()
        .map(|c| if is_allowed(c) { c } else { ' ' })
        .collect();

    let collapsed = RE_HORIZONTAL_WS.replace_all(&filtered, " ");

    let trimmed_lines: Vec<&str> = collapsed.split('\n').map(str::trim).collect();
    let joined = trimmed_lines.join("\n");

    RE_BLANK_RUNS.replace_all(&joined, "\n\n").trim().to_string()
}

/// Removes what the database and the corpus index cannot hold: four-byte
/// UTF-8 sequences and raw control characters other than tab and newlines.
pub fn sanitize_for_storage(text: &str) -> String {
    text.chars()
        .filter(|c| c.len_utf8() < 4)
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\t' | '\r'))
        .collect()
}

/// Full normalization used before extracted text leaves an extractor.
pub fn normalize(raw: &str) -> String {
    sanitize_for_storage(&clean_text(raw))
}

/// Number of characters ignoring surrounding whitespace.
pub fn visible_len(text: &str) -> usize {
    text.trim().chars().count()
}
