//! Veridoc grounded-answer pipeline
//!
//! A fixed, linear sequence of stages over one per-request workflow state:
//!
//! Planner -> Retriever -> Explainer -> Verifier -> Evidence Linker -> Composer
//!
//! The Explainer short-circuits to the canonical refusal when no evidence
//! was retrieved (the single conditional early exit); every other stage
//! always runs. Each stage writes its own fields of the state exactly once.
//!
//! The pipeline is an explicit object constructed per request or test, with
//! its collaborators (document, language model, entity extractor) injected.
//! There is no global instance.

pub mod composer;
pub mod explainer;
pub mod linker;
pub mod planner;
pub mod retriever;
pub mod state;
pub mod verifier;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use veridoc_common::document::Document;
use veridoc_common::entities::EntityExtractor;
use veridoc_common::errors::Result;
use veridoc_common::llm::LanguageModel;
use veridoc_common::{metrics, REFUSAL_ANSWER};

pub use state::{
    AnswerRequest, ComposedNarrative, Confidence, DraftAnswer, EvidenceGroup, SentenceClaim,
    VerifiedAnswer, WorkflowState,
};

/// Tunables for one pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Per-model-call timeout
    pub llm_timeout: Duration,

    /// Cap on auto-selected candidate paragraphs
    pub max_candidates: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            llm_timeout: Duration::from_secs(60),
            max_candidates: planner::MAX_CANDIDATES,
        }
    }
}

/// Sanitized debug information. Carries only the Planner/Verifier reason
/// strings and a citation-only rendering of linked-evidence groups; raw
/// prompts, raw model text, and internal state never pass through here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugInfo {
    pub planner_reason: String,
    pub verifier_reason: String,
    pub evidence_links: Vec<EvidenceLinkSummary>,
}

/// Citation-only view of one linked-evidence group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceLinkSummary {
    pub source_ids: Vec<String>,
}

/// The public outcome of one `answer` invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerOutcome {
    pub answer: String,
    pub citations: Vec<String>,
    pub confidence: Confidence,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugInfo>,
}

/// One pipeline instance bound to a document and its collaborators.
pub struct Pipeline<'a> {
    document: &'a Document,
    llm: Arc<dyn LanguageModel>,
    extractor: Arc<dyn EntityExtractor>,
    options: PipelineOptions,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        document: &'a Document,
        llm: Arc<dyn LanguageModel>,
        extractor: Arc<dyn EntityExtractor>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            document,
            llm,
            extractor,
            options,
        }
    }

    /// Run every stage over a fresh workflow state and return it.
    ///
    /// Stages are strictly sequential; the returned state is owned by this
    /// invocation alone. Model-dependency failures (timeout, upstream
    /// error, malformed output) propagate as errors; "no evidence" and
    /// "verification failed" recover locally into the refusal answer.
    pub async fn run(&self, request: &AnswerRequest) -> Result<WorkflowState> {
        let mut state = WorkflowState::new(request);

        // Planner
        let planned = planner::select(
            self.document,
            &state.question,
            &state.explicit_ids,
            self.options.max_candidates,
        );
        state.candidate_ids = planned.candidate_ids;
        state.auto_selected = planned.auto_selected;
        state.planner_reason = planned.reason;

        // Retriever
        let retrieved = retriever::retrieve(self.document, &state.candidate_ids);
        state.paragraphs = retrieved.paragraphs;
        state.equations = retrieved.equations;

        // Explainer (early exit to refusal inside when no evidence)
        let explained = explainer::explain(
            &state.paragraphs,
            &state.equations,
            &state.question,
            self.llm.as_ref(),
            self.options.llm_timeout,
        )
        .await?;
        state.draft = Some(explained.draft);
        state.raw_model_text = explained.raw_model_text;

        // Verifier
        let retrieved_ids: HashSet<String> = state.retrieved_evidence_ids().into_iter().collect();
        let verified = verifier::verify(
            state.draft.as_ref().expect("explainer always writes a draft"),
            &retrieved_ids,
            state.auto_selected,
        );
        state.final_answer = Some(verified.answer);
        state.verification_passed = verified.passed;
        state.verifier_reason = verified.reason;

        // Evidence Linker (deterministic, no model)
        state.linked_evidence =
            linker::link(&state.paragraphs, &state.equations, self.extractor.as_ref());

        // Composer
        let composed = composer::compose(
            &state.paragraphs,
            &state.equations,
            &state.linked_evidence,
            &state.question,
            self.llm.as_ref(),
            self.extractor.as_ref(),
            self.options.llm_timeout,
        )
        .await?;
        state.narrative = composed.narrative;
        state.composer_passed = composed.passed;
        state.composer_reason = composed.reason;

        Ok(state)
    }

    /// Answer a question: run the pipeline and map the state to the public
    /// outcome shape.
    pub async fn answer(&self, request: &AnswerRequest) -> Result<AnswerOutcome> {
        let state = self.run(request).await?;
        let outcome = Self::outcome_from_state(&state);

        metrics::record_question(
            outcome.confidence.as_str(),
            outcome.answer == REFUSAL_ANSWER,
        );

        tracing::info!(
            refused = (outcome.answer == REFUSAL_ANSWER),
            citations = outcome.citations.len(),
            confidence = %outcome.confidence,
            auto_selected = state.auto_selected,
            "Question answered"
        );

        Ok(outcome)
    }

    fn outcome_from_state(state: &WorkflowState) -> AnswerOutcome {
        let final_answer = state
            .final_answer
            .as_ref()
            .expect("verifier always writes a final answer");

        let debug = if state.include_debug {
            Some(DebugInfo {
                planner_reason: state.planner_reason.clone(),
                verifier_reason: state.verifier_reason.clone(),
                evidence_links: state
                    .linked_evidence
                    .iter()
                    .map(|g| EvidenceLinkSummary {
                        source_ids: g.source_ids.clone(),
                    })
                    .collect(),
            })
        } else {
            None
        };

        AnswerOutcome {
            answer: final_answer.answer.clone(),
            citations: final_answer.citations.clone(),
            confidence: final_answer.confidence,
            debug,
        }
    }
}
