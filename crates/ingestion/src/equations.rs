//! Equation detection
//!
//! Recognizes display-equation paragraphs in segmented text and lifts them
//! into Equation records. Detected equation text is captured as-is and
//! never rewritten afterwards; the citation pipeline depends on equation
//! text staying exactly what was sourced.

use regex_lite::Regex;
use std::sync::OnceLock;
use veridoc_common::document::Equation;

/// Upper bound on a display equation's length. Anything longer is prose
/// that happens to contain an equals sign.
const MAX_EQUATION_LEN: usize = 200;

/// Words that frequently appear in prose sentences around '=' but rarely in
/// display equations. Two or more of them disqualify a candidate.
const PROSE_MARKERS: &[&str] = &[
    "the", "is", "are", "was", "were", "this", "that", "which", "where", "with", "when", "then",
    "and", "has", "have",
];

fn function_form() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // "Name(args) = ..." - the classic display equation shape
    RE.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*\(.*\)\s*=").unwrap())
}

/// Heuristic test for a display-equation paragraph.
pub fn is_equation_text(text: &str) -> bool {
    let text = text.trim();

    if text.is_empty() || text.len() > MAX_EQUATION_LEN || !text.contains('=') {
        return false;
    }

    // Function-application form is an immediate accept
    if function_form().is_match(text) {
        return true;
    }

    // Reject sentence-like text around the equals sign
    let lower = text.to_lowercase();
    let prose_hits = lower
        .split_whitespace()
        .filter(|w| PROSE_MARKERS.contains(w))
        .count();
    if prose_hits >= 2 {
        return false;
    }

    // Mathematical notation density: operators, sub/superscripts, brackets
    let math_chars = text
        .chars()
        .filter(|c| "=+-*/^_()[]{}<>|\\".contains(*c))
        .count();
    let word_count = text.split_whitespace().count();

    math_chars >= 3 && word_count <= 12
}

/// Generate a stable equation ID (1-indexed).
pub fn generate_equation_id(index: usize) -> String {
    format!("eq{}", index + 1)
}

/// Build an Equation record from detected text, capturing it verbatim.
pub fn build_equation(index: usize, text: &str, associated_paragraph_id: &str) -> Equation {
    Equation {
        equation_id: generate_equation_id(index),
        equation_text: text.to_string(),
        associated_paragraph_id: associated_paragraph_id.to_string(),
    }
}
