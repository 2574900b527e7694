//! Workflow state
//!
//! One `WorkflowState` value is threaded through a single pipeline
//! invocation. The inputs are fixed at construction; every other field is
//! written exactly once, by its owning stage:
//!
//! - Planner: `candidate_ids`, `auto_selected`, `planner_reason`
//! - Retriever: `paragraphs`, `equations`
//! - Explainer: `draft`, `raw_model_text`
//! - Verifier: `final_answer`, `verification_passed`, `verifier_reason`
//! - Evidence Linker: `linked_evidence`
//! - Composer: `narrative`, `composer_passed`, `composer_reason`
//!
//! The state is owned exclusively by one invocation and never shared across
//! requests; stages run strictly sequentially, so each field has exactly one
//! writer by construction.

use serde::{Deserialize, Serialize};
use veridoc_common::document::{Equation, Paragraph};

/// Inputs to one pipeline invocation.
#[derive(Debug, Clone)]
pub struct AnswerRequest {
    /// The question to answer
    pub question: String,

    /// Explicit evidence IDs supplied by the caller; empty means the
    /// Planner auto-selects
    pub paragraph_ids: Vec<String>,

    /// Whether to include sanitized debug information in the outcome
    pub include_debug: bool,
}

impl AnswerRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            paragraph_ids: Vec::new(),
            include_debug: false,
        }
    }

    pub fn with_paragraph_ids(mut self, ids: Vec<String>) -> Self {
        self.paragraph_ids = ids;
        self
    }

    pub fn with_debug(mut self) -> Self {
        self.include_debug = true;
        self
    }
}

/// System-derived confidence. Set in exactly one place - the Verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Low => "low",
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The Explainer's parsed draft. `model_confidence` is what the model
/// claimed about itself; it is held only transiently and the Verifier never
/// reads it when computing the trusted confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftAnswer {
    pub answer: String,
    pub citations: Vec<String>,
    pub model_confidence: Confidence,
}

/// The Verifier's trusted output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiedAnswer {
    pub answer: String,
    pub citations: Vec<String>,
    pub confidence: Confidence,
}

/// A group of evidence units linked by shared entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceGroup {
    /// Sorted member evidence IDs
    pub source_ids: Vec<String>,

    /// Variables occurring in at least two members, sorted
    pub shared_variables: Vec<String>,

    /// Concepts occurring in at least two members, sorted
    pub shared_concepts: Vec<String>,
}

/// One sentence of a composed narrative with its single citation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceClaim {
    pub text: String,
    pub citation: String,
}

/// A fully verified composed narrative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposedNarrative {
    /// Joined narrative text with citation markers
    pub text: String,

    /// The verified sentence list
    pub sentences: Vec<SentenceClaim>,
}

/// Per-request pipeline state. See the module docs for field ownership.
#[derive(Debug)]
pub struct WorkflowState {
    // Inputs (fixed at construction)
    pub question: String,
    pub explicit_ids: Vec<String>,
    pub include_debug: bool,

    // Planner
    pub candidate_ids: Vec<String>,
    pub auto_selected: bool,
    pub planner_reason: String,

    // Retriever
    pub paragraphs: Vec<Paragraph>,
    pub equations: Vec<Equation>,

    // Explainer
    pub draft: Option<DraftAnswer>,
    pub raw_model_text: Option<String>,

    // Verifier
    pub final_answer: Option<VerifiedAnswer>,
    pub verification_passed: bool,
    pub verifier_reason: String,

    // Evidence Linker
    pub linked_evidence: Vec<EvidenceGroup>,

    // Composer
    pub narrative: Option<ComposedNarrative>,
    pub composer_passed: bool,
    pub composer_reason: String,
}

impl WorkflowState {
    /// Create state for one invocation. Only the inputs are populated;
    /// stage fields start empty and are filled as the pipeline advances.
    pub fn new(request: &AnswerRequest) -> Self {
        Self {
            question: request.question.clone(),
            explicit_ids: request.paragraph_ids.clone(),
            include_debug: request.include_debug,
            candidate_ids: Vec::new(),
            auto_selected: false,
            planner_reason: String::new(),
            paragraphs: Vec::new(),
            equations: Vec::new(),
            draft: None,
            raw_model_text: None,
            final_answer: None,
            verification_passed: false,
            verifier_reason: String::new(),
            linked_evidence: Vec::new(),
            narrative: None,
            composer_passed: false,
            composer_reason: String::new(),
        }
    }

    /// IDs of all retrieved evidence units (paragraphs then equations).
    pub fn retrieved_evidence_ids(&self) -> Vec<String> {
        self.paragraphs
            .iter()
            .map(|p| p.paragraph_id.clone())
            .chain(self.equations.iter().map(|e| e.equation_id.clone()))
            .collect()
    }
}
