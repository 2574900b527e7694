//! PDF text extraction
//!
//! Extracts text content from PDF files using lopdf. The content stream
//! scan is deliberately simple (text between BT and ET operators); academic
//! PDFs with embedded fonts beyond that are reported per page and skipped
//! rather than failing the whole document.

use crate::errors::IngestionError;
use std::path::Path;
use tracing::{debug, warn};

/// Extract text content from a PDF file on disk.
pub fn extract_text_from_pdf(path: &Path) -> Result<String, IngestionError> {
    let doc = lopdf::Document::load(path).map_err(|e| IngestionError::PdfParseError {
        path: path.display().to_string(),
        message: format!("Failed to load PDF: {}", e),
    })?;
    extract_text_from_doc(&doc, &path.display().to_string())
}

/// Extract text content from PDF bytes (uploads).
pub fn extract_text_from_bytes(bytes: &[u8], name: &str) -> Result<String, IngestionError> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| IngestionError::PdfParseError {
        path: name.to_string(),
        message: format!("Failed to load PDF: {}", e),
    })?;
    extract_text_from_doc(&doc, name)
}

fn extract_text_from_doc(doc: &lopdf::Document, name: &str) -> Result<String, IngestionError> {
    let pages = doc.get_pages();
    debug!(page_count = pages.len(), "Extracting text from PDF");

    let mut page_texts = Vec::new();
    for (page_num, page_id) in pages.iter() {
        match doc.get_page_content(*page_id) {
            Ok(content) => {
                let text = extract_text_from_content(&content);
                if !text.trim().is_empty() {
                    page_texts.push(text);
                }
            }
            Err(e) => {
                warn!(page = page_num, error = %e, "Failed to read page content, skipping");
            }
        }
    }

    if page_texts.is_empty() {
        return Err(IngestionError::PdfParseError {
            path: name.to_string(),
            message: "No text content extracted from PDF".to_string(),
        });
    }

    // Blank line between pages so paragraph segmentation has boundaries
    Ok(page_texts.join("\n\n"))
}

/// Extract text from a PDF content stream.
///
/// Scans for text between BT and ET operators; each text block becomes one
/// line so downstream segmentation sees line structure.
fn extract_text_from_content(content: &[u8]) -> String {
    let content_str = String::from_utf8_lossy(content);
    let mut text = String::new();
    let mut in_text_block = false;
    let mut current_text = String::new();

    for line in content_str.lines() {
        let trimmed = line.trim();

        if trimmed == "BT" {
            in_text_block = true;
            continue;
        }

        if trimmed == "ET" {
            in_text_block = false;
            if !current_text.is_empty() {
                text.push_str(current_text.trim());
                text.push('\n');
                current_text.clear();
            }
            continue;
        }

        if in_text_block {
            if let Some(text_content) = extract_text_from_operator(trimmed) {
                current_text.push_str(&text_content);
                current_text.push(' ');
            }
        }
    }

    text
}

/// Extract text from a PDF text-showing operator line (Tj, TJ, ', ").
fn extract_text_from_operator(line: &str) -> Option<String> {
    if line.ends_with("Tj") || line.ends_with('\'') || line.ends_with('"') {
        if let (Some(start), Some(end)) = (line.find('('), line.rfind(')')) {
            if start < end {
                return Some(decode_pdf_string(&line[start + 1..end]));
            }
        }
    }

    // [(text) num (text) num] TJ - array form
    if line.ends_with("TJ") {
        let mut result = String::new();
        let mut in_paren = false;
        let mut current = String::new();

        for ch in line.chars() {
            match ch {
                '(' => in_paren = true,
                ')' => {
                    in_paren = false;
                    result.push_str(&decode_pdf_string(&current));
                    current.clear();
                }
                _ if in_paren => current.push(ch),
                _ => {}
            }
        }

        if !result.is_empty() {
            return Some(result);
        }
    }

    None
}

/// Decode PDF string escapes
fn decode_pdf_string(s: &str) -> String {
    let mut result = String::new();
    let mut chars = s.chars();

    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('r') => result.push('\r'),
                Some('t') => result.push('\t'),
                Some('\\') => result.push('\\'),
                Some('(') => result.push('('),
                Some(')') => result.push(')'),
                Some(c) => result.push(c),
                None => {}
            }
        } else {
            result.push(ch);
        }
    }

    result
}
