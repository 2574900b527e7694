//! Composer - constrained multi-sentence narrative generation
//!
//! Generates an explanatory narrative strictly from the retrieved evidence,
//! then verifies it sentence by sentence. The composer may only paraphrase
//! evidence: every sentence must cite exactly one supplied evidence ID, no
//! new variable entity may appear, and no technical concept outside the
//! evidence may appear. Any failure discards the whole narrative - a
//! partially-verified draft is never returned.
//!
//! Ordinary concept words (query, input, output, ...) are exempt from the
//! concept check: natural paraphrase needs them and they carry no grounding
//! risk. The closed technical vocabulary below is what gets enforced.

use crate::state::{ComposedNarrative, EvidenceGroup, SentenceClaim};
use serde::Deserialize;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use veridoc_common::document::{Equation, Paragraph};
use veridoc_common::entities::EntityExtractor;
use veridoc_common::errors::{AppError, Result};
use veridoc_common::llm::json_extract::extract_object;
use veridoc_common::llm::LanguageModel;
use veridoc_common::metrics;

/// Technical domain concepts that must be grounded in the evidence when
/// they appear in a composed sentence. A fixed, closed vocabulary: a subset
/// of the extractor's concept list covering architectures, precise
/// operations, and metrics.
const TECHNICAL_CONCEPTS: &[&str] = &[
    "attention",
    "self-attention",
    "self attention",
    "multi-head attention",
    "multi-head",
    "multihead",
    "scaled dot-product",
    "dot-product attention",
    "cross-attention",
    "cross attention",
    "transformer",
    "encoder",
    "decoder",
    "positional encoding",
    "position encoding",
    "feed-forward",
    "feedforward",
    "ffn",
    "residual connection",
    "layer normalization",
    "layer norm",
    "layernorm",
    "dropout",
    "lstm",
    "cnn",
    "rnn",
    "softmax",
    "label smoothing",
    "warmup",
    "adam",
    "cross-entropy",
    "bleu",
    "bleu score",
    "perplexity",
];

/// Composer output, written once into the workflow state.
#[derive(Debug, Clone)]
pub struct ComposerOutput {
    /// The verified narrative, or None when composition was skipped or the
    /// draft was rejected
    pub narrative: Option<ComposedNarrative>,
    pub passed: bool,
    pub reason: String,
}

/// Wire shape of the model's narrative payload.
#[derive(Debug, Deserialize)]
struct NarrativePayload {
    #[serde(default)]
    sentences: Vec<SentencePayload>,
}

#[derive(Debug, Deserialize)]
struct SentencePayload {
    #[serde(default)]
    text: String,
    #[serde(default)]
    citation: String,
}

/// Build the constrained composition prompt.
pub fn build_composer_prompt(
    paragraphs: &[Paragraph],
    equations: &[Equation],
    linked_evidence: &[EvidenceGroup],
    question: &str,
) -> String {
    let mut prompt = String::from(
        "You are a research paper explanation composer. Compose a short explanatory narrative \
         answering the question, under these rules:\n\
         1. You may ONLY paraphrase the evidence provided below.\n\
         2. You may NOT introduce new entities, variables, or claims beyond what each cited \
         piece of evidence individually states.\n\
         3. Every sentence MUST cite exactly one evidence ID.\n\
         4. Do NOT combine evidence into claims that no single piece supports.\n\n\
         Respond with ONLY a JSON object:\n\
         {\n    \"composed_explanation\": string,\n    \"sentences\": [{\"text\": string, \"citation\": string}]\n}\n",
    );

    prompt.push_str("\n=== EVIDENCE ===\n");
    for p in paragraphs {
        prompt.push_str(&format!("[{}]\n{}\n\n", p.paragraph_id, p.text));
    }
    for e in equations {
        prompt.push_str(&format!(
            "[{}] (from {})\n{}\n\n",
            e.equation_id, e.associated_paragraph_id, e.equation_text
        ));
    }
    prompt.push_str("=== END EVIDENCE ===\n");

    if !linked_evidence.is_empty() {
        prompt.push_str("\n=== LINKED EVIDENCE ===\n");
        prompt.push_str("These evidence units share entities and may be explained together:\n");
        for group in linked_evidence {
            let mut shared: Vec<&str> = group
                .shared_variables
                .iter()
                .map(String::as_str)
                .collect();
            shared.extend(group.shared_concepts.iter().map(String::as_str));
            prompt.push_str(&format!(
                "- {} (shared: {})\n",
                group.source_ids.join(", "),
                shared.join(", ")
            ));
        }
        prompt.push_str("=== END LINKED EVIDENCE ===\n");
    }

    prompt.push_str(&format!("\nQUESTION: {}\n\nNow provide your response as JSON:", question));
    prompt
}

/// Verify composed sentences against the supplied evidence, failing fast.
/// Returns `(passed, reason)`.
pub fn verify_sentences(
    sentences: &[SentenceClaim],
    valid_ids: &HashSet<String>,
    paragraphs: &[Paragraph],
    equations: &[Equation],
    extractor: &dyn EntityExtractor,
) -> (bool, String) {
    // (1) non-empty sentence list
    if sentences.is_empty() {
        return (false, "No sentences in composed explanation".to_string());
    }

    // (2) every sentence cited
    for (i, sentence) in sentences.iter().enumerate() {
        if sentence.citation.trim().is_empty() {
            return (false, format!("Sentence {} lacks a citation", i + 1));
        }
    }

    // (3) citations name supplied evidence
    for (i, sentence) in sentences.iter().enumerate() {
        if !valid_ids.contains(&sentence.citation) {
            return (
                false,
                format!(
                    "Invalid citation '{}' in sentence {}",
                    sentence.citation,
                    i + 1
                ),
            );
        }
    }

    // Entity union across ALL supplied evidence
    let mut evidence_variables: HashSet<String> = HashSet::new();
    let mut evidence_concepts: HashSet<String> = HashSet::new();
    for p in paragraphs {
        let entities = p
            .entities
            .clone()
            .unwrap_or_else(|| extractor.extract(&p.text));
        evidence_variables.extend(entities.variables.iter().map(|v| v.to_lowercase()));
        evidence_concepts.extend(entities.concepts.iter().cloned());
    }
    for e in equations {
        let entities = extractor.extract(&e.equation_text);
        evidence_variables.extend(entities.variables.iter().map(|v| v.to_lowercase()));
        evidence_concepts.extend(entities.concepts.iter().cloned());
    }

    // (4) no new variable entity
    for (i, sentence) in sentences.iter().enumerate() {
        let detected = extractor.extract(&sentence.text);
        for var in &detected.variables {
            if !evidence_variables.contains(&var.to_lowercase()) {
                return (
                    false,
                    format!(
                        "Sentence {} introduces variable '{}' not present in the supplied evidence",
                        i + 1,
                        var
                    ),
                );
            }
        }

        // (5) no ungrounded technical concept
        for concept in &detected.concepts {
            if TECHNICAL_CONCEPTS.contains(&concept.as_str())
                && !evidence_concepts.contains(concept)
            {
                return (
                    false,
                    format!(
                        "Sentence {} uses technical concept '{}' not present in the supplied evidence",
                        i + 1,
                        concept
                    ),
                );
            }
        }
    }

    (
        true,
        format!("Passed: {} sentence(s) verified against supplied evidence", sentences.len()),
    )
}

/// Parse the model's narrative payload into sentence claims.
fn parse_narrative(raw: &str) -> Result<Vec<SentenceClaim>> {
    let value = extract_object(raw)?;
    let payload: NarrativePayload =
        serde_json::from_value(value).map_err(|e| AppError::MalformedModelOutput {
            message: format!("narrative payload shape: {}", e),
        })?;

    Ok(payload
        .sentences
        .into_iter()
        .map(|s| SentenceClaim {
            text: s.text,
            citation: s.citation,
        })
        .collect())
}

/// Compose and verify an explanatory narrative from the retrieved evidence.
pub async fn compose(
    paragraphs: &[Paragraph],
    equations: &[Equation],
    linked_evidence: &[EvidenceGroup],
    question: &str,
    llm: &dyn LanguageModel,
    extractor: &dyn EntityExtractor,
    timeout: Duration,
) -> Result<ComposerOutput> {
    // No evidence: nothing to compose from, and the model is not invoked.
    if paragraphs.is_empty() && equations.is_empty() {
        return Ok(ComposerOutput {
            narrative: None,
            passed: false,
            reason: "No evidence available to compose from".to_string(),
        });
    }

    let prompt = build_composer_prompt(paragraphs, equations, linked_evidence, question);

    let start = Instant::now();
    let response = llm.generate(&prompt, timeout).await;
    metrics::record_llm_call(start.elapsed().as_secs_f64(), "compose", response.is_ok());
    let response = response?;

    let sentences = parse_narrative(&response.content)?;

    let valid_ids: HashSet<String> = paragraphs
        .iter()
        .map(|p| p.paragraph_id.clone())
        .chain(equations.iter().map(|e| e.equation_id.clone()))
        .collect();

    let (passed, reason) =
        verify_sentences(&sentences, &valid_ids, paragraphs, equations, extractor);

    if !passed {
        // The whole narrative is discarded; nothing partial survives.
        metrics::record_composer_rejection();
        tracing::warn!(reason = %reason, "Composed narrative rejected");
        return Ok(ComposerOutput {
            narrative: None,
            passed: false,
            reason,
        });
    }

    let text = sentences
        .iter()
        .map(|s| format!("{} [{}]", s.text, s.citation))
        .collect::<Vec<_>>()
        .join(" ");

    Ok(ComposerOutput {
        narrative: Some(ComposedNarrative { text, sentences }),
        passed: true,
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use veridoc_common::document::Entities;
    use veridoc_common::entities::HeuristicEntityExtractor;
    use veridoc_common::llm::MockLanguageModel;

    fn attention_paragraphs() -> Vec<Paragraph> {
        let mut p1 = Paragraph::new(
            "s1_p1",
            "An attention function can be described as mapping a query and a set of key-value \
             pairs to an output, where the query, keys, values, and output are all vectors.",
        );
        p1.entities = Some(Entities {
            variables: vec!["Q".into(), "K".into(), "V".into()],
            concepts: vec!["attention".into(), "query".into()],
        });

        let mut p2 = Paragraph::new(
            "s1_p2",
            "We call our particular attention Scaled Dot-Product Attention. The input consists \
             of queries and keys of dimension d_k, and values of dimension d_v.",
        );
        p2.entities = Some(Entities {
            variables: vec!["d_k".into(), "d_v".into()],
            concepts: vec!["attention".into(), "scaled dot-product".into()],
        });

        let mut p3 = Paragraph::new(
            "s1_p3",
            "We compute the dot products of the query with all keys, divide each by sqrt(d_k), \
             and apply a softmax function to obtain the weights on the values.",
        );
        p3.entities = Some(Entities {
            variables: vec!["d_k".into()],
            concepts: vec!["softmax".into(), "attention".into()],
        });

        vec![p1, p2, p3]
    }

    fn equation() -> Equation {
        Equation {
            equation_id: "eq1".into(),
            equation_text: "Attention(Q, K, V) = softmax(QK^T / sqrt(d_k))V".into(),
            associated_paragraph_id: "s1_p1".into(),
        }
    }

    fn valid_composition_response() -> String {
        serde_json::json!({
            "composed_explanation": "Attention maps queries to outputs using key-value pairs. [s1_p1] The computation uses scaled dot-product with dimension d_k. [s1_p2] A softmax function determines the weights. [s1_p3]",
            "sentences": [
                {"text": "Attention maps queries to outputs using key-value pairs.", "citation": "s1_p1"},
                {"text": "The computation uses scaled dot-product with dimension d_k.", "citation": "s1_p2"},
                {"text": "A softmax function determines the weights.", "citation": "s1_p3"},
            ]
        })
        .to_string()
    }

    fn extractor() -> HeuristicEntityExtractor {
        HeuristicEntityExtractor::new()
    }

    #[tokio::test]
    async fn test_no_evidence_skips_model() {
        let mock = MockLanguageModel::new();

        let output = compose(&[], &[], &[], "q", &mock, &extractor(), Duration::from_secs(1))
            .await
            .unwrap();

        assert!(output.narrative.is_none());
        assert!(!output.passed);
        assert_eq!(mock.invocation_count(), 0);
    }

    #[tokio::test]
    async fn test_composes_from_multiple_paragraphs() {
        let mock = MockLanguageModel::with_default_response(valid_composition_response());

        let output = compose(
            &attention_paragraphs(),
            &[],
            &[],
            "How is attention computed?",
            &mock,
            &extractor(),
            Duration::from_secs(1),
        )
        .await
        .unwrap();

        assert!(output.passed);
        let narrative = output.narrative.unwrap();
        assert_eq!(narrative.sentences.len(), 3);
        assert!(narrative.text.contains("[s1_p1]"));
        assert!(narrative.text.contains("[s1_p3]"));
    }

    #[tokio::test]
    async fn test_equation_citation_accepted() {
        let response = serde_json::json!({
            "composed_explanation": "Attention maps queries to outputs. [s1_p1] The formula applies softmax scaling. [eq1]",
            "sentences": [
                {"text": "Attention maps queries to outputs.", "citation": "s1_p1"},
                {"text": "The formula applies softmax scaling.", "citation": "eq1"},
            ]
        })
        .to_string();
        let mock = MockLanguageModel::with_default_response(response);

        let paragraphs = attention_paragraphs();
        let output = compose(
            &paragraphs[..1],
            &[equation()],
            &[],
            "What is the attention formula?",
            &mock,
            &extractor(),
            Duration::from_secs(1),
        )
        .await
        .unwrap();

        assert!(output.passed, "reason: {}", output.reason);
        assert!(output.narrative.unwrap().text.contains("[eq1]"));
    }

    #[tokio::test]
    async fn test_missing_citation_rejects_narrative() {
        let response = serde_json::json!({
            "composed_explanation": "Attention is a mechanism. The computation uses softmax. [s1_p3]",
            "sentences": [
                {"text": "Attention is a mechanism.", "citation": ""},
                {"text": "The computation uses softmax.", "citation": "s1_p3"},
            ]
        })
        .to_string();
        let mock = MockLanguageModel::with_default_response(response);

        let output = compose(
            &attention_paragraphs(),
            &[],
            &[],
            "q",
            &mock,
            &extractor(),
            Duration::from_secs(1),
        )
        .await
        .unwrap();

        assert!(!output.passed);
        assert!(output.narrative.is_none());
        assert!(output.reason.contains("lacks a citation"));
    }

    #[tokio::test]
    async fn test_invalid_citation_rejects_narrative() {
        let response = serde_json::json!({
            "composed_explanation": "Attention uses queries. [s1_p1] This is from an invalid source. [s99_p99]",
            "sentences": [
                {"text": "Attention uses queries.", "citation": "s1_p1"},
                {"text": "This is from an invalid source.", "citation": "s99_p99"},
            ]
        })
        .to_string();
        let mock = MockLanguageModel::with_default_response(response);

        let output = compose(
            &attention_paragraphs(),
            &[],
            &[],
            "q",
            &mock,
            &extractor(),
            Duration::from_secs(1),
        )
        .await
        .unwrap();

        assert!(!output.passed);
        assert!(output.narrative.is_none());
        assert!(output.reason.contains("Invalid citation"));
        assert!(output.reason.contains("s99_p99"));
    }

    #[tokio::test]
    async fn test_new_variable_rejects_whole_narrative() {
        // W is not among the evidence variables; even though the other
        // sentence is valid, the whole narrative must go.
        let response = serde_json::json!({
            "composed_explanation": "Attention maps queries to outputs. [s1_p1] The weight matrix W transforms queries. [s1_p1]",
            "sentences": [
                {"text": "Attention maps queries to outputs.", "citation": "s1_p1"},
                {"text": "The weight matrix W transforms queries.", "citation": "s1_p1"},
            ]
        })
        .to_string();
        let mock = MockLanguageModel::with_default_response(response);

        let paragraphs = attention_paragraphs();
        let output = compose(
            &paragraphs[..1],
            &[],
            &[],
            "q",
            &mock,
            &extractor(),
            Duration::from_secs(1),
        )
        .await
        .unwrap();

        assert!(!output.passed);
        assert!(output.narrative.is_none());
        assert!(output.reason.contains("'W'"));
    }

    #[tokio::test]
    async fn test_ungrounded_technical_concept_rejected() {
        // Only the first attention paragraph is supplied; "bleu" is a
        // technical concept with no grounding in it.
        let response = serde_json::json!({
            "composed_explanation": "Attention achieves high BLEU scores through weighting. [s1_p1]",
            "sentences": [
                {"text": "Attention achieves high BLEU scores through weighting.", "citation": "s1_p1"},
            ]
        })
        .to_string();
        let mock = MockLanguageModel::with_default_response(response);

        let paragraphs = attention_paragraphs();
        let output = compose(
            &paragraphs[..1],
            &[],
            &[],
            "How does attention affect BLEU?",
            &mock,
            &extractor(),
            Duration::from_secs(1),
        )
        .await
        .unwrap();

        assert!(!output.passed);
        assert!(output.reason.to_lowercase().contains("bleu"));
    }

    #[tokio::test]
    async fn test_merge_valid_when_both_sources_present() {
        let mut bleu_para = Paragraph::new(
            "s2_p1",
            "On the WMT 2014 task the big transformer model outperforms prior models by over 2.0 BLEU.",
        );
        bleu_para.entities = Some(Entities {
            variables: vec![],
            concepts: vec!["bleu".into(), "transformer".into()],
        });

        let response = serde_json::json!({
            "composed_explanation": "Attention maps queries to outputs. [s1_p1] The transformer model achieves high BLEU scores. [s2_p1]",
            "sentences": [
                {"text": "Attention maps queries to outputs.", "citation": "s1_p1"},
                {"text": "The transformer model achieves high BLEU scores.", "citation": "s2_p1"},
            ]
        })
        .to_string();
        let mock = MockLanguageModel::with_default_response(response);

        let mut paragraphs = attention_paragraphs();
        paragraphs.truncate(1);
        paragraphs.push(bleu_para);

        let output = compose(
            &paragraphs,
            &[],
            &[],
            "How does the model perform?",
            &mock,
            &extractor(),
            Duration::from_secs(1),
        )
        .await
        .unwrap();

        assert!(output.passed, "reason: {}", output.reason);
        assert!(output.narrative.is_some());
    }

    #[tokio::test]
    async fn test_unparseable_narrative_is_an_error() {
        let mock = MockLanguageModel::with_default_response("This is not JSON at all");

        let result = compose(
            &attention_paragraphs(),
            &[],
            &[],
            "q",
            &mock,
            &extractor(),
            Duration::from_secs(1),
        )
        .await;

        assert!(matches!(
            result,
            Err(AppError::MalformedModelOutput { .. })
        ));
    }

    #[test]
    fn test_prompt_includes_evidence_and_groups() {
        let groups = vec![EvidenceGroup {
            source_ids: vec!["eq1".into(), "s1_p1".into()],
            shared_variables: vec!["K".into(), "Q".into(), "V".into()],
            shared_concepts: vec!["attention".into()],
        }];

        let paragraphs = attention_paragraphs();
        let prompt =
            build_composer_prompt(&paragraphs[..1], &[equation()], &groups, "How does attention work?");

        assert!(prompt.contains("[s1_p1]"));
        assert!(prompt.contains("[eq1]"));
        assert!(prompt.contains("LINKED EVIDENCE"));
        assert!(prompt.contains("eq1, s1_p1"));
        assert!(prompt.contains("ONLY paraphrase"));
        assert!(prompt.contains("How does attention work?"));
    }

    #[test]
    fn test_verify_sentences_order_of_failures() {
        let ids: HashSet<String> = ["s1_p1".to_string()].into();

        // Empty list fails first
        let (passed, reason) = verify_sentences(&[], &ids, &[], &[], &extractor());
        assert!(!passed);
        assert!(reason.contains("No sentences"));

        // Missing citation beats invalid citation
        let sentences = vec![
            SentenceClaim {
                text: "First.".into(),
                citation: "".into(),
            },
            SentenceClaim {
                text: "Second.".into(),
                citation: "bogus".into(),
            },
        ];
        let (passed, reason) = verify_sentences(&sentences, &ids, &[], &[], &extractor());
        assert!(!passed);
        assert!(reason.contains("Sentence 1 lacks a citation"));
    }
}
