//! Veridoc Ingestion
//!
//! Turns source files (PDF or plain text) into the Document structure the
//! pipeline queries:
//! 1. extract raw text
//! 2. split into paragraphs, detect section headers
//! 3. lift display-equation paragraphs into Equation records
//! 4. pre-extract entities for every paragraph
//! 5. assemble the Document, which validates ID uniqueness atomically
//!
//! Paragraph IDs are stable `sN_pM` (1-indexed); equation IDs are `eqN`.
//! A duplicate ID anywhere aborts ingestion - no partially-valid Document
//! is ever returned.

pub mod equations;
pub mod errors;
pub mod pdf;
pub mod segment;

use errors::IngestionError;
use std::path::Path;
use std::time::Instant;
use veridoc_common::document::{Document, Equation, Paragraph, Section};
use veridoc_common::entities::{EntityExtractor, HeuristicEntityExtractor};
use veridoc_common::metrics;

/// Options controlling ingestion.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Minimum paragraph length (shorter fragments merge into the previous
    /// paragraph)
    pub min_paragraph_len: usize,

    /// Detect display equations and lift them out of the paragraph flow
    pub detect_equations: bool,

    /// Pre-extract entities for every paragraph
    pub extract_entities: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            min_paragraph_len: segment::DEFAULT_MIN_PARAGRAPH_LEN,
            detect_equations: true,
            extract_entities: true,
        }
    }
}

/// Generate a stable paragraph ID (1-indexed for readability).
fn generate_paragraph_id(section_index: usize, paragraph_index: usize) -> String {
    format!("s{}_p{}", section_index + 1, paragraph_index + 1)
}

/// Parse raw text into a Document.
pub fn parse_text_to_document(
    text: &str,
    title: &str,
    options: &IngestOptions,
) -> Result<Document, IngestionError> {
    let start = Instant::now();
    let paragraphs = segment::split_into_paragraphs(text, options.min_paragraph_len);

    if paragraphs.is_empty() {
        return Err(IngestionError::EmptyDocument);
    }

    let extractor = HeuristicEntityExtractor::new();

    let mut sections: Vec<Section> = Vec::new();
    let mut equations: Vec<Equation> = Vec::new();
    let mut current_title = "Document Start".to_string();
    let mut current_paragraphs: Vec<Paragraph> = Vec::new();
    let mut section_index = 0usize;
    let mut paragraph_index = 0usize;

    for para_text in paragraphs {
        // Section boundary?
        if let Some(header) = segment::detect_section_header(&para_text) {
            if current_paragraphs.is_empty() {
                // No content yet: just take the better title
                current_title = header;
            } else {
                sections.push(Section {
                    title: std::mem::replace(&mut current_title, header),
                    paragraphs: std::mem::take(&mut current_paragraphs),
                });
                section_index += 1;
                paragraph_index = 0;
            }
            continue;
        }

        // Display equation? Lift it out, anchored to the preceding paragraph.
        if options.detect_equations && equations::is_equation_text(&para_text) {
            if let Some(previous) = current_paragraphs.last_mut() {
                let equation =
                    equations::build_equation(equations.len(), &para_text, &previous.paragraph_id);
                previous.equation_refs.push(equation.equation_id.clone());
                equations.push(equation);
                continue;
            }
            // No preceding paragraph to anchor to: keep it as a paragraph
        }

        let mut paragraph = Paragraph::new(
            generate_paragraph_id(section_index, paragraph_index),
            para_text,
        );
        if options.extract_entities {
            paragraph.entities = Some(extractor.extract(&paragraph.text));
        }
        current_paragraphs.push(paragraph);
        paragraph_index += 1;
    }

    if !current_paragraphs.is_empty() {
        sections.push(Section {
            title: current_title,
            paragraphs: current_paragraphs,
        });
    }

    if sections.is_empty() {
        return Err(IngestionError::EmptyDocument);
    }

    let paragraph_count: usize = sections.iter().map(|s| s.paragraphs.len()).sum();
    let document = Document::new(title, sections, equations)?;

    metrics::record_ingestion(start.elapsed().as_secs_f64(), paragraph_count);
    tracing::info!(
        title = %title,
        sections = document.sections.len(),
        paragraphs = paragraph_count,
        equations = document.equations.len(),
        "Document ingested"
    );

    Ok(document)
}

/// Parse a PDF file into a Document.
pub fn parse_pdf_to_document(
    path: &Path,
    title: Option<&str>,
    options: &IngestOptions,
) -> Result<Document, IngestionError> {
    let title = title
        .map(str::to_string)
        .or_else(|| {
            path.file_stem()
                .map(|stem| stem.to_string_lossy().to_string())
        })
        .unwrap_or_else(|| "Untitled".to_string());

    let text = pdf::extract_text_from_pdf(path)?;
    parse_text_to_document(&text, &title, options)
}

/// Parse PDF bytes (an upload) into a Document.
pub fn parse_pdf_bytes_to_document(
    bytes: &[u8],
    title: &str,
    options: &IngestOptions,
) -> Result<Document, IngestionError> {
    let text = pdf::extract_text_from_bytes(bytes, title)?;
    parse_text_to_document(&text, title, options)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Abstract

The dominant sequence transduction models are based on complex recurrent or \
convolutional neural networks that include an encoder and a decoder.

1 Introduction

Attention mechanisms have become an integral part of sequence modeling, \
allowing modeling of dependencies without regard to their distance.

2 Attention

An attention function can be described as mapping a query Q and a set of \
key-value pairs K, V to an output computed as a weighted sum.

Attention(Q, K, V) = softmax(QK^T / sqrt(d_k))V

Multi-head attention allows the model to jointly attend to information from \
different representation subspaces at different positions.
";

    #[test]
    fn test_sections_detected() {
        let doc = parse_text_to_document(SAMPLE, "Attention", &IngestOptions::default()).unwrap();

        let titles: Vec<&str> = doc.sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Abstract", "1 Introduction", "2 Attention"]);
    }

    #[test]
    fn test_paragraph_ids_stable_and_one_indexed() {
        let doc = parse_text_to_document(SAMPLE, "Attention", &IngestOptions::default()).unwrap();

        assert!(doc.paragraph("s1_p1").is_some());
        assert!(doc.paragraph("s2_p1").is_some());
        assert!(doc.paragraph("s3_p1").is_some());
        assert!(doc.paragraph("s3_p2").is_some());
    }

    #[test]
    fn test_equation_lifted_and_anchored() {
        let doc = parse_text_to_document(SAMPLE, "Attention", &IngestOptions::default()).unwrap();

        assert_eq!(doc.equations.len(), 1);
        let eq = &doc.equations[0];
        assert_eq!(eq.equation_id, "eq1");
        assert_eq!(eq.equation_text, "Attention(Q, K, V) = softmax(QK^T / sqrt(d_k))V");
        // Anchored to the paragraph preceding it
        assert_eq!(eq.associated_paragraph_id, "s3_p1");

        // And back-referenced from that paragraph
        let origin = doc.paragraph("s3_p1").unwrap();
        assert_eq!(origin.equation_refs, vec!["eq1"]);
    }

    #[test]
    fn test_equation_is_not_a_paragraph() {
        let doc = parse_text_to_document(SAMPLE, "Attention", &IngestOptions::default()).unwrap();

        // The equation must not appear in any paragraph text
        for para in doc.iter_paragraphs() {
            assert!(!para.text.contains("softmax(QK^T"));
        }
    }

    #[test]
    fn test_entities_pre_extracted() {
        let doc = parse_text_to_document(SAMPLE, "Attention", &IngestOptions::default()).unwrap();

        let para = doc.paragraph("s3_p1").unwrap();
        let entities = para.entities.as_ref().expect("entities pre-extracted");
        assert!(entities.variables.contains(&"Q".to_string()));
        assert!(entities.concepts.contains(&"attention".to_string()));
    }

    #[test]
    fn test_entity_extraction_can_be_disabled() {
        let options = IngestOptions {
            extract_entities: false,
            ..IngestOptions::default()
        };
        let doc = parse_text_to_document(SAMPLE, "Attention", &options).unwrap();
        assert!(doc.iter_paragraphs().all(|p| p.entities.is_none()));
    }

    #[test]
    fn test_equation_detection_can_be_disabled() {
        let options = IngestOptions {
            detect_equations: false,
            ..IngestOptions::default()
        };
        let doc = parse_text_to_document(SAMPLE, "Attention", &options).unwrap();
        assert!(doc.equations.is_empty());
        // The formula stays in the paragraph flow instead
        assert!(doc
            .iter_paragraphs()
            .any(|p| p.text.contains("softmax(QK^T")));
    }

    #[test]
    fn test_empty_text_rejected() {
        assert!(matches!(
            parse_text_to_document("", "Empty", &IngestOptions::default()),
            Err(IngestionError::EmptyDocument)
        ));
        assert!(matches!(
            parse_text_to_document("\n\n  \n", "Empty", &IngestOptions::default()),
            Err(IngestionError::EmptyDocument)
        ));
    }

    #[test]
    fn test_all_ids_unique() {
        let doc = parse_text_to_document(SAMPLE, "Attention", &IngestOptions::default()).unwrap();

        let mut ids = doc.paragraph_ids();
        ids.extend(doc.equations.iter().map(|e| e.equation_id.clone()));
        let unique: std::collections::HashSet<&String> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
    }
}
