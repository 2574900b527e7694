//! Retriever - candidate ID resolution
//!
//! Resolves candidate IDs into evidence objects. Unknown IDs are silently
//! skipped rather than errored: the planner may pass through caller-supplied
//! IDs that do not exist, and "no evidence" is a normal downstream outcome
//! (the Explainer refuses).
//!
//! Equations come along implicitly: an equation is retrieved when its origin
//! paragraph is retrieved, or when a retrieved paragraph references it.

use veridoc_common::document::{Document, Equation, Paragraph};

/// Retriever output, written once into the workflow state.
#[derive(Debug, Clone)]
pub struct RetrieverOutput {
    pub paragraphs: Vec<Paragraph>,
    pub equations: Vec<Equation>,
}

/// Resolve candidates to paragraphs (order-preserving, skip-unknown) and
/// gather their equations (dedup by ID, first-seen order).
pub fn retrieve(document: &Document, candidate_ids: &[String]) -> RetrieverOutput {
    let paragraphs = document.paragraphs(candidate_ids);

    let retrieved_ids: Vec<String> = paragraphs
        .iter()
        .map(|p| p.paragraph_id.clone())
        .collect();
    let equations = document.equations_for_paragraphs(&retrieved_ids);

    tracing::debug!(
        candidates = candidate_ids.len(),
        paragraphs = paragraphs.len(),
        equations = equations.len(),
        "Evidence retrieved"
    );

    RetrieverOutput {
        paragraphs,
        equations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veridoc_common::document::Section;

    fn doc_with_equations() -> Document {
        let mut p2 = Paragraph::new("s1_p2", "The scaling factor uses d_k as in the formula.");
        p2.equation_refs = vec!["eq1".into()];

        Document::new(
            "Doc",
            vec![Section {
                title: "S".into(),
                paragraphs: vec![
                    Paragraph::new("s1_p1", "An attention function maps queries to outputs."),
                    p2,
                    Paragraph::new("s1_p3", "Unrelated closing remarks."),
                ],
            }],
            vec![
                Equation {
                    equation_id: "eq1".into(),
                    equation_text: "Attention(Q, K, V) = softmax(QK^T / sqrt(d_k))V".into(),
                    associated_paragraph_id: "s1_p1".into(),
                },
                Equation {
                    equation_id: "eq2".into(),
                    equation_text: "FFN(x) = max(0, xW_1 + b_1)W_2 + b_2".into(),
                    associated_paragraph_id: "s1_p3".into(),
                },
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_unknown_ids_silently_skipped() {
        let doc = doc_with_equations();
        let output = retrieve(
            &doc,
            &["s1_p1".to_string(), "missing".to_string(), "s1_p3".to_string()],
        );

        let ids: Vec<&str> = output
            .paragraphs
            .iter()
            .map(|p| p.paragraph_id.as_str())
            .collect();
        assert_eq!(ids, vec!["s1_p1", "s1_p3"]);
    }

    #[test]
    fn test_order_preserved() {
        let doc = doc_with_equations();
        let output = retrieve(&doc, &["s1_p3".to_string(), "s1_p1".to_string()]);

        let ids: Vec<&str> = output
            .paragraphs
            .iter()
            .map(|p| p.paragraph_id.as_str())
            .collect();
        assert_eq!(ids, vec!["s1_p3", "s1_p1"]);
    }

    #[test]
    fn test_equation_via_association() {
        let doc = doc_with_equations();
        let output = retrieve(&doc, &["s1_p1".to_string()]);

        let ids: Vec<&str> = output
            .equations
            .iter()
            .map(|e| e.equation_id.as_str())
            .collect();
        assert_eq!(ids, vec!["eq1"]);
    }

    #[test]
    fn test_equation_via_reference_list() {
        // s1_p2 is not eq1's origin but references it
        let doc = doc_with_equations();
        let output = retrieve(&doc, &["s1_p2".to_string()]);

        let ids: Vec<&str> = output
            .equations
            .iter()
            .map(|e| e.equation_id.as_str())
            .collect();
        assert_eq!(ids, vec!["eq1"]);
    }

    #[test]
    fn test_equations_deduped_across_sources() {
        // s1_p1 is eq1's origin and s1_p2 references eq1: one copy
        let doc = doc_with_equations();
        let output = retrieve(&doc, &["s1_p1".to_string(), "s1_p2".to_string()]);

        let ids: Vec<&str> = output
            .equations
            .iter()
            .map(|e| e.equation_id.as_str())
            .collect();
        assert_eq!(ids, vec!["eq1"]);
    }

    #[test]
    fn test_empty_candidates_empty_output() {
        let doc = doc_with_equations();
        let output = retrieve(&doc, &[]);
        assert!(output.paragraphs.is_empty());
        assert!(output.equations.is_empty());
    }
}
