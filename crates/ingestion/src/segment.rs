//! Paragraph and section segmentation
//!
//! Splits raw extracted text into paragraphs on blank lines, merging
//! fragments shorter than the configured minimum into their predecessor,
//! and detects section headers heuristically (numbered, ALL CAPS, or short
//! Title Case lines).

use regex_lite::Regex;
use std::sync::OnceLock;

/// Default minimum paragraph length; shorter ones are merged with the
/// previous paragraph.
pub const DEFAULT_MIN_PARAGRAPH_LEN: usize = 50;

/// Split text into paragraphs on blank lines.
///
/// Whitespace within a paragraph is collapsed to single spaces. Paragraphs
/// shorter than `min_length` are merged into the previous paragraph so a
/// stray line break does not create a citation target of its own - except
/// fragments that look like display equations, which must stay standalone
/// for equation lifting.
pub fn split_into_paragraphs(text: &str, min_length: usize) -> Vec<String> {
    let mut raw_paragraphs: Vec<String> = Vec::new();
    let mut current_lines: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current_lines.is_empty() {
                raw_paragraphs.push(current_lines.join(" "));
                current_lines.clear();
            }
        } else {
            current_lines.push(line);
        }
    }
    if !current_lines.is_empty() {
        raw_paragraphs.push(current_lines.join(" "));
    }

    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();

    for para in raw_paragraphs {
        let para = para.split_whitespace().collect::<Vec<_>>().join(" ");
        if para.is_empty() {
            continue;
        }

        if para.len() < min_length
            && !current.is_empty()
            && !crate::equations::is_equation_text(&para)
        {
            current.push(' ');
            current.push_str(&para);
        } else {
            if !current.is_empty() {
                paragraphs.push(current);
            }
            current = para;
        }
    }

    if !current.is_empty() {
        paragraphs.push(current);
    }

    paragraphs
}

fn header_patterns() -> &'static [Regex; 3] {
    static PATTERNS: OnceLock<[Regex; 3]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            // Numbered sections: "1 Introduction", "2.1 Background"
            Regex::new(r"^(\d+\.?\d*\.?\s+[A-Z][A-Za-z\s-]+)$").unwrap(),
            // All caps short text: "ABSTRACT", "RELATED WORK"
            Regex::new(r"^([A-Z][A-Z\s]{2,30})$").unwrap(),
            // Title case short text: "Model Architecture"
            Regex::new(r"^([A-Z][a-z]+(?:\s+[A-Z][a-z]+){0,4})$").unwrap(),
        ]
    })
}

/// Detect whether a paragraph looks like a section header.
pub fn detect_section_header(text: &str) -> Option<String> {
    let text = text.trim();

    // Headers are short
    if text.len() > 100 {
        return None;
    }

    for pattern in header_patterns() {
        if let Some(caps) = pattern.captures(text) {
            if let Some(m) = caps.get(1) {
                return Some(m.as_str().trim().to_string());
            }
        }
    }

    None
}
