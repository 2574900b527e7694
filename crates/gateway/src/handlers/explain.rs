//! Explain and compose handlers
//!
//! The question-answering surface. Both handlers run the full grounded
//! pipeline against a ready document; `/explain` returns the verified
//! answer, `/compose` the sentence-verified narrative. Model-dependency
//! failures map to distinct statuses (504 timeout, 429 rate limited, 502
//! upstream, 500 malformed output) via `AppError`.

use crate::AppState;
use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;
use veridoc_common::errors::{AppError, Result};
use veridoc_pipeline::{
    AnswerRequest, Confidence, DebugInfo, Pipeline, PipelineOptions, SentenceClaim,
};

/// Request for both explain and compose.
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ExplainRequest {
    /// The question to answer using the document
    #[validate(length(min = 1, max = 1000))]
    pub question: String,

    /// Optional paragraph IDs to use as context; omitted means the planner
    /// auto-selects
    pub paragraph_ids: Option<Vec<String>>,

    /// Include sanitized debug information in the response
    #[serde(default)]
    pub include_debug: bool,
}

#[derive(Debug, Serialize)]
pub struct ExplainResponse {
    pub answer: String,
    pub citations: Vec<String>,
    pub confidence: Confidence,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugInfo>,
}

#[derive(Debug, Serialize)]
pub struct ComposeResponse {
    /// The verified narrative, or null when composition was rejected
    pub explanation: Option<String>,
    pub sentences: Vec<SentenceClaim>,
    pub passed: bool,
    pub reason: String,
}

/// Validate and normalize the question text.
fn validate_question(question: &str, max_len: usize) -> Result<String> {
    let normalized = question.trim();

    if normalized.is_empty() {
        return Err(AppError::Validation {
            message: "Question cannot be empty or whitespace-only".to_string(),
            field: Some("question".into()),
        });
    }

    if normalized.len() > max_len {
        return Err(AppError::Validation {
            message: format!("Question exceeds maximum length of {} characters", max_len),
            field: Some("question".into()),
        });
    }

    Ok(normalized.to_string())
}

/// Strip whitespace from IDs and drop empties; an empty list becomes "not
/// provided" so the planner auto-selects.
fn normalize_paragraph_ids(paragraph_ids: Option<Vec<String>>) -> Vec<String> {
    paragraph_ids
        .unwrap_or_default()
        .into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect()
}

fn build_answer_request(state: &AppState, request: ExplainRequest) -> Result<AnswerRequest> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let question = validate_question(&request.question, state.config.pipeline.max_question_len)?;
    let paragraph_ids = normalize_paragraph_ids(request.paragraph_ids);

    let mut answer_request = AnswerRequest::new(question).with_paragraph_ids(paragraph_ids);
    if request.include_debug {
        answer_request = answer_request.with_debug();
    }
    Ok(answer_request)
}

fn pipeline_options(state: &AppState) -> PipelineOptions {
    PipelineOptions {
        llm_timeout: state.config.llm_timeout(),
        max_candidates: state.config.pipeline.max_candidates,
    }
}

/// Answer a question using ONLY the document content. Insufficient evidence
/// yields the canonical refusal with low confidence, not an error.
pub async fn explain(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
    Json(request): Json<ExplainRequest>,
) -> Result<Json<ExplainResponse>> {
    let answer_request = build_answer_request(&state, request)?;
    let document = state.registry.get_ready_document(&document_id)?;

    let pipeline = Pipeline::new(
        &document,
        state.llm.clone(),
        state.extractor.clone(),
        pipeline_options(&state),
    );

    let outcome = pipeline.answer(&answer_request).await?;

    Ok(Json(ExplainResponse {
        answer: outcome.answer,
        citations: outcome.citations,
        confidence: outcome.confidence,
        debug: outcome.debug,
    }))
}

/// Compose a sentence-verified explanatory narrative from the evidence the
/// pipeline selects for the question.
pub async fn compose(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
    Json(request): Json<ExplainRequest>,
) -> Result<Json<ComposeResponse>> {
    let answer_request = build_answer_request(&state, request)?;
    let document = state.registry.get_ready_document(&document_id)?;

    let pipeline = Pipeline::new(
        &document,
        state.llm.clone(),
        state.extractor.clone(),
        pipeline_options(&state),
    );

    let workflow = pipeline.run(&answer_request).await?;

    let (explanation, sentences) = match workflow.narrative {
        Some(narrative) => (Some(narrative.text), narrative.sentences),
        None => (None, Vec::new()),
    };

    Ok(Json(ComposeResponse {
        explanation,
        sentences,
        passed: workflow.composer_passed,
        reason: workflow.composer_reason,
    }))
}
