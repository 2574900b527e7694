//! Document model
//!
//! A Document is the unit of ingestion and querying:
//! - ordered Sections of Paragraphs
//! - a flat list of Equations, each tied to its origin paragraph
//! - an ID index built once at construction and immutable afterwards
//!
//! Paragraph and equation IDs share one namespace. Construction fails
//! atomically on any duplicate, so a partially-valid Document is never
//! observable by the pipeline.

use crate::errors::AppError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Entities extracted from a piece of evidence text.
///
/// Variables keep their original case (identity is case-sensitive) but are
/// deduplicated case-insensitively; concepts are lowercased and deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entities {
    pub variables: Vec<String>,
    pub concepts: Vec<String>,
}

impl Entities {
    /// Case-insensitive variable membership
    pub fn contains_variable(&self, var: &str) -> bool {
        self.variables
            .iter()
            .any(|v| v.eq_ignore_ascii_case(var))
    }

    /// Concept membership (concepts are stored lowercased)
    pub fn contains_concept(&self, concept: &str) -> bool {
        let concept = concept.to_lowercase();
        self.concepts.iter().any(|c| *c == concept)
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty() && self.concepts.is_empty()
    }
}

/// A prose paragraph with a stable unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paragraph {
    /// Stable unique ID, e.g. "s1_p2"
    pub paragraph_id: String,

    /// Raw paragraph text
    pub text: String,

    /// Pre-computed entities, if ingestion ran the extractor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<Entities>,

    /// IDs of equations this paragraph references
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub equation_refs: Vec<String>,
}

impl Paragraph {
    pub fn new(paragraph_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            paragraph_id: paragraph_id.into(),
            text: text.into(),
            entities: None,
            equation_refs: Vec::new(),
        }
    }
}

/// An equation, preserved verbatim.
///
/// `equation_text` is never normalized, simplified, or reformatted:
/// downstream citation trust assumes the text is exactly what was sourced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Equation {
    /// Stable unique ID, e.g. "eq1" (same namespace as paragraph IDs)
    pub equation_id: String,

    /// Verbatim equation text
    pub equation_text: String,

    /// The paragraph this equation originated from
    pub associated_paragraph_id: String,
}

/// A titled run of paragraphs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    pub paragraphs: Vec<Paragraph>,
}

/// Location of an evidence unit inside a Document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EvidenceLocation {
    Paragraph { section: usize, index: usize },
    Equation { index: usize },
}

/// An ingested document.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub title: String,
    pub sections: Vec<Section>,
    pub equations: Vec<Equation>,

    /// ID -> location lookup, built once in `new`
    #[serde(skip)]
    index: HashMap<String, EvidenceLocation>,
}

impl Document {
    /// Build a document, validating that every paragraph and equation ID is
    /// unique across the shared namespace. Fails atomically: on a duplicate,
    /// no Document value exists.
    pub fn new(
        title: impl Into<String>,
        sections: Vec<Section>,
        equations: Vec<Equation>,
    ) -> Result<Self, AppError> {
        let mut index = HashMap::new();

        for (si, section) in sections.iter().enumerate() {
            for (pi, para) in section.paragraphs.iter().enumerate() {
                let previous = index.insert(
                    para.paragraph_id.clone(),
                    EvidenceLocation::Paragraph { section: si, index: pi },
                );
                if previous.is_some() {
                    return Err(AppError::DuplicateEvidenceId {
                        id: para.paragraph_id.clone(),
                    });
                }
            }
        }

        for (ei, eq) in equations.iter().enumerate() {
            let previous = index.insert(
                eq.equation_id.clone(),
                EvidenceLocation::Equation { index: ei },
            );
            if previous.is_some() {
                return Err(AppError::DuplicateEvidenceId {
                    id: eq.equation_id.clone(),
                });
            }
        }

        Ok(Self {
            title: title.into(),
            sections,
            equations,
            index,
        })
    }

    /// Look up a paragraph by ID.
    pub fn paragraph(&self, id: &str) -> Option<&Paragraph> {
        match self.index.get(id)? {
            EvidenceLocation::Paragraph { section, index } => {
                Some(&self.sections[*section].paragraphs[*index])
            }
            EvidenceLocation::Equation { .. } => None,
        }
    }

    /// Resolve paragraph IDs in the given order, silently skipping unknown
    /// IDs and IDs that name equations.
    pub fn paragraphs(&self, ids: &[String]) -> Vec<Paragraph> {
        ids.iter()
            .filter_map(|id| self.paragraph(id).cloned())
            .collect()
    }

    /// Look up an equation by ID.
    pub fn equation(&self, id: &str) -> Option<&Equation> {
        match self.index.get(id)? {
            EvidenceLocation::Equation { index } => Some(&self.equations[*index]),
            EvidenceLocation::Paragraph { .. } => None,
        }
    }

    /// Gather the equations relevant to a set of paragraphs, deduplicated by
    /// equation ID in first-seen order:
    /// (a) every equation whose `associated_paragraph_id` is in the set,
    ///     in document equation order;
    /// (b) every equation ID listed in a paragraph's `equation_refs`,
    ///     resolved through the index, in paragraph order.
    pub fn equations_for_paragraphs(&self, paragraph_ids: &[String]) -> Vec<Equation> {
        let id_set: std::collections::HashSet<&str> =
            paragraph_ids.iter().map(String::as_str).collect();

        let mut seen = std::collections::HashSet::new();
        let mut result = Vec::new();

        for eq in &self.equations {
            if id_set.contains(eq.associated_paragraph_id.as_str())
                && seen.insert(eq.equation_id.clone())
            {
                result.push(eq.clone());
            }
        }

        for pid in paragraph_ids {
            let Some(para) = self.paragraph(pid) else {
                continue;
            };
            for ref_id in &para.equation_refs {
                if let Some(eq) = self.equation(ref_id) {
                    if seen.insert(eq.equation_id.clone()) {
                        result.push(eq.clone());
                    }
                }
            }
        }

        result
    }

    /// All paragraph IDs in document order.
    pub fn paragraph_ids(&self) -> Vec<String> {
        self.sections
            .iter()
            .flat_map(|s| s.paragraphs.iter().map(|p| p.paragraph_id.clone()))
            .collect()
    }

    /// Iterate paragraphs in document order.
    pub fn iter_paragraphs(&self) -> impl Iterator<Item = &Paragraph> {
        self.sections.iter().flat_map(|s| s.paragraphs.iter())
    }

    /// Total paragraph count.
    pub fn paragraph_count(&self) -> usize {
        self.sections.iter().map(|s| s.paragraphs.len()).sum()
    }

    /// True if the ID names a paragraph or an equation in this document.
    pub fn contains_id(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn para(id: &str, text: &str) -> Paragraph {
        Paragraph::new(id, text)
    }

    fn eq(id: &str, text: &str, para_id: &str) -> Equation {
        Equation {
            equation_id: id.into(),
            equation_text: text.into(),
            associated_paragraph_id: para_id.into(),
        }
    }

    fn attention_doc() -> Document {
        let mut p1 = para("s1_p1", "An attention function maps a query and key-value pairs.");
        p1.equation_refs = vec!["eq1".into()];
        Document::new(
            "Attention Is All You Need",
            vec![
                Section {
                    title: "Attention".into(),
                    paragraphs: vec![
                        p1,
                        para("s1_p2", "Scaled dot-product attention divides by sqrt(d_k)."),
                    ],
                },
                Section {
                    title: "Results".into(),
                    paragraphs: vec![para("s2_p1", "The model achieves 28.4 BLEU.")],
                },
            ],
            vec![
                eq("eq1", "Attention(Q, K, V) = softmax(QK^T / sqrt(d_k))V", "s1_p1"),
                eq("eq2", "MultiHead(Q, K, V) = Concat(head_1, ..., head_h)W^O", "s2_p1"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_lookup_by_id() {
        let doc = attention_doc();
        assert!(doc.paragraph("s1_p1").is_some());
        assert!(doc.paragraph("missing").is_none());
        assert!(doc.equation("eq1").is_some());
        // An equation ID is not a paragraph and vice versa
        assert!(doc.paragraph("eq1").is_none());
        assert!(doc.equation("s1_p1").is_none());
    }

    #[test]
    fn test_paragraphs_preserve_order_and_skip_unknown() {
        let doc = attention_doc();
        let paras = doc.paragraphs(&[
            "s2_p1".to_string(),
            "nope".to_string(),
            "s1_p1".to_string(),
        ]);
        let ids: Vec<&str> = paras.iter().map(|p| p.paragraph_id.as_str()).collect();
        assert_eq!(ids, vec!["s2_p1", "s1_p1"]);
    }

    #[test]
    fn test_equations_for_paragraphs_two_sources_deduped() {
        let doc = attention_doc();
        // s1_p1 is associated with eq1 AND references eq1; dedup keeps one.
        let eqs = doc.equations_for_paragraphs(&["s1_p1".to_string()]);
        let ids: Vec<&str> = eqs.iter().map(|e| e.equation_id.as_str()).collect();
        assert_eq!(ids, vec!["eq1"]);

        // s2_p1 picks up eq2 via association only.
        let eqs = doc.equations_for_paragraphs(&["s2_p1".to_string()]);
        let ids: Vec<&str> = eqs.iter().map(|e| e.equation_id.as_str()).collect();
        assert_eq!(ids, vec!["eq2"]);
    }

    #[test]
    fn test_duplicate_paragraph_id_rejected() {
        let result = Document::new(
            "Bad",
            vec![Section {
                title: "S".into(),
                paragraphs: vec![para("s1_p1", "one"), para("s1_p1", "two")],
            }],
            vec![],
        );
        assert!(matches!(
            result,
            Err(AppError::DuplicateEvidenceId { ref id }) if id == "s1_p1"
        ));
    }

    #[test]
    fn test_duplicate_across_sections_rejected() {
        let result = Document::new(
            "Bad",
            vec![
                Section {
                    title: "A".into(),
                    paragraphs: vec![para("shared", "one")],
                },
                Section {
                    title: "B".into(),
                    paragraphs: vec![para("shared", "two")],
                },
            ],
            vec![],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_equation_id_colliding_with_paragraph_id_rejected() {
        // One shared namespace: an equation reusing a paragraph ID is fatal.
        let result = Document::new(
            "Bad",
            vec![Section {
                title: "S".into(),
                paragraphs: vec![para("s1_p1", "text")],
            }],
            vec![eq("s1_p1", "E = mc^2", "s1_p1")],
        );
        assert!(matches!(
            result,
            Err(AppError::DuplicateEvidenceId { ref id }) if id == "s1_p1"
        ));
    }

    #[test]
    fn test_verbatim_equation_text() {
        let doc = attention_doc();
        assert_eq!(
            doc.equation("eq1").unwrap().equation_text,
            "Attention(Q, K, V) = softmax(QK^T / sqrt(d_k))V"
        );
    }

    #[test]
    fn test_paragraph_ids_document_order() {
        let doc = attention_doc();
        assert_eq!(doc.paragraph_ids(), vec!["s1_p1", "s1_p2", "s2_p1"]);
        assert_eq!(doc.paragraph_count(), 3);
    }

    #[test]
    fn test_entities_membership() {
        let entities = Entities {
            variables: vec!["Q".into(), "d_k".into()],
            concepts: vec!["attention".into()],
        };
        assert!(entities.contains_variable("q"));
        assert!(entities.contains_variable("D_K"));
        assert!(!entities.contains_variable("W"));
        assert!(entities.contains_concept("Attention"));
        assert!(!entities.contains_concept("softmax"));
    }
}
