//! Explainer - prompted answer generation
//!
//! Builds the grounding prompt, makes exactly one model call, and parses
//! the draft answer. Two hard rules live here:
//!
//! - with no retrieved paragraphs the canonical refusal is returned and the
//!   model is NEVER invoked (tests assert a zero invocation count)
//! - citations the model returns are filtered to the evidence IDs actually
//!   supplied in this call, so nothing outside the prompt can be cited
//!
//! The model's self-reported confidence is parsed but only held
//! transiently; the Verifier computes the trusted value.

use crate::state::{Confidence, DraftAnswer};
use serde::Deserialize;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use veridoc_common::document::{Equation, Paragraph};
use veridoc_common::errors::Result;
use veridoc_common::llm::json_extract::extract_object;
use veridoc_common::llm::LanguageModel;
use veridoc_common::{metrics, REFUSAL_ANSWER};

/// Immutable instruction block for the grounding prompt.
///
/// The rules bind the model to the supplied content only, require citations
/// on every substantive answer, and fix the exact refusal string so the
/// Verifier can recognize a deliberate refusal.
const SYSTEM_RULES: &str = r#"You are a research paper analysis assistant. Your ONLY task is to answer questions using EXCLUSIVELY the provided document content.

CRITICAL RULES - YOU MUST FOLLOW THESE EXACTLY:
1. Use ONLY information EXPLICITLY stated in the provided paragraphs and equations.
2. NEVER use outside knowledge, even if you know the answer from training.
3. If the provided text does not define or explain what is asked, answer exactly "Not defined in the paper".
4. Every claim must be directly traceable to a provided paragraph or equation.
5. ALWAYS include citations: list the IDs of every paragraph or equation you used. Never return a substantive answer without citations; only the exact refusal above may have an empty citations list.
6. If you are uncertain whether the text supports the answer, set confidence to "low".
7. Equations are provided separately and are critical. Do NOT simplify or modify equation text.

RESPONSE FORMAT - respond with ONLY a JSON object, no other text:
{
    "answer": string,
    "citations": [string],
    "confidence": "high" | "low"
}"#;

/// Explainer output, written once into the workflow state.
#[derive(Debug, Clone)]
pub struct ExplainerOutput {
    pub draft: DraftAnswer,

    /// The raw model text, kept for internal inspection only; it is never
    /// exposed through the public surface
    pub raw_model_text: Option<String>,
}

/// Wire shape of the model's answer payload. Missing fields degrade to the
/// refusal/empty/low defaults rather than erroring; a missing object
/// entirely is a parse error upstream of this type.
#[derive(Debug, Deserialize)]
struct AnswerPayload {
    #[serde(default = "default_answer")]
    answer: String,
    #[serde(default)]
    citations: Vec<String>,
    #[serde(default = "default_confidence")]
    confidence: String,
}

fn default_answer() -> String {
    REFUSAL_ANSWER.to_string()
}

fn default_confidence() -> String {
    "low".to_string()
}

/// Format paragraphs as labelled context blocks.
fn build_context_block(paragraphs: &[Paragraph]) -> String {
    paragraphs
        .iter()
        .map(|p| format!("[{}]\n{}", p.paragraph_id, p.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Format equations as labelled blocks, each naming its source paragraph.
/// Equation text goes in verbatim.
fn build_equations_block(equations: &[Equation]) -> String {
    equations
        .iter()
        .map(|e| {
            format!(
                "[{}] (from {})\n{}",
                e.equation_id, e.associated_paragraph_id, e.equation_text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Assemble the full grounding prompt.
pub fn build_prompt(paragraphs: &[Paragraph], equations: &[Equation], question: &str) -> String {
    let context = build_context_block(paragraphs);

    let equations_section = if equations.is_empty() {
        String::new()
    } else {
        format!(
            "\n=== EQUATIONS ===\nThe following equations are critical to the document content.\nDo NOT simplify or modify them - cite them by ID as provided.\n\n{}\n=== END EQUATIONS ===\n",
            build_equations_block(equations)
        )
    };

    format!(
        "{SYSTEM_RULES}\n\n=== DOCUMENT CONTENT ===\n{context}\n=== END DOCUMENT CONTENT ===\n{equations_section}\nQUESTION: {question}\n\nNow provide your response as JSON:"
    )
}

/// Parse the model's response text into a draft answer, filtering citations
/// to the supplied evidence IDs.
fn parse_draft(raw: &str, supplied_ids: &HashSet<&str>) -> Result<DraftAnswer> {
    let value = extract_object(raw)?;
    let payload: AnswerPayload =
        serde_json::from_value(value).map_err(|e| {
            veridoc_common::errors::AppError::MalformedModelOutput {
                message: format!("answer payload shape: {}", e),
            }
        })?;

    let citations: Vec<String> = payload
        .citations
        .into_iter()
        .filter(|c| supplied_ids.contains(c.as_str()))
        .collect();

    let model_confidence = match payload.confidence.as_str() {
        "high" => Confidence::High,
        _ => Confidence::Low,
    };

    Ok(DraftAnswer {
        answer: payload.answer,
        citations,
        model_confidence,
    })
}

/// Produce a draft answer for the question over the retrieved evidence.
pub async fn explain(
    paragraphs: &[Paragraph],
    equations: &[Equation],
    question: &str,
    llm: &dyn LanguageModel,
    timeout: Duration,
) -> Result<ExplainerOutput> {
    // No evidence: refuse without touching the model. This branch must stay
    // model-free; the refusal-without-model-call property depends on it.
    if paragraphs.is_empty() {
        metrics::record_refusal("explainer_no_evidence");
        return Ok(ExplainerOutput {
            draft: DraftAnswer {
                answer: REFUSAL_ANSWER.to_string(),
                citations: Vec::new(),
                model_confidence: Confidence::Low,
            },
            raw_model_text: None,
        });
    }

    let prompt = build_prompt(paragraphs, equations, question);

    let start = Instant::now();
    let response = llm.generate(&prompt, timeout).await;
    metrics::record_llm_call(start.elapsed().as_secs_f64(), "explain", response.is_ok());
    let response = response?;

    let supplied_ids: HashSet<&str> = paragraphs
        .iter()
        .map(|p| p.paragraph_id.as_str())
        .chain(equations.iter().map(|e| e.equation_id.as_str()))
        .collect();

    let draft = parse_draft(&response.content, &supplied_ids)?;

    tracing::debug!(
        citations = draft.citations.len(),
        refused = (draft.answer == REFUSAL_ANSWER),
        "Draft answer parsed"
    );

    Ok(ExplainerOutput {
        draft,
        raw_model_text: Some(response.content),
    })
}
