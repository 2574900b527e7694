//! Planner - evidence selection
//!
//! Performs RESTRICTED paragraph selection:
//! - only selects from IDs that exist in the document
//! - never generates answers or calls the model
//! - never invents or filters caller-supplied IDs
//! - conservative: prefers over-inclusion, bounded by a fixed cap
//!
//! Selection is keyword overlap between the question and each paragraph,
//! with a deterministic ordering so equal inputs always produce equal
//! output.

use std::collections::HashSet;
use veridoc_common::document::Document;

/// Cap on auto-selected candidates. Conservative over-inclusion is wanted,
/// but prompt size must stay bounded.
pub const MAX_CANDIDATES: usize = 10;

/// Words carrying no selective signal in questions or paragraphs.
const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "be", "been", "being", "in", "on", "at", "to",
    "for", "of", "with", "by", "from", "and", "or", "but", "not", "this", "that", "these",
    "those", "it", "its", "as", "do", "does", "did", "has", "have", "had", "can", "could",
    "will", "would", "should", "may", "might", "what", "which", "who", "whom", "whose", "when",
    "where", "why", "how", "about", "into", "over", "under", "between", "say", "says", "said",
    "paper", "document", "describe", "describes", "explain", "explains", "section", "we", "our",
    "you", "your", "they", "them", "their", "there", "here", "if", "then", "than", "so", "such",
    "some", "any", "all", "each", "more", "most", "also", "up",
];

/// Planner output, written once into the workflow state.
#[derive(Debug, Clone)]
pub struct PlannerOutput {
    pub candidate_ids: Vec<String>,
    pub auto_selected: bool,
    pub reason: String,
}

/// Tokenize into lowercase alphanumeric runs of length >= 2, minus stop
/// words. Used identically for questions and paragraph text.
pub fn extract_keywords(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.len() >= 2)
        .map(str::to_lowercase)
        .filter(|token| !STOP_WORDS.contains(&token.as_str()))
        .collect()
}

/// Select candidate evidence for a question.
///
/// Caller-supplied IDs pass through verbatim. Otherwise paragraphs are
/// scored by keyword overlap, kept when the score is positive, ordered by
/// `(-score, document position)`, and truncated to `max_candidates`
/// (normally [`MAX_CANDIDATES`]).
pub fn select(
    document: &Document,
    question: &str,
    explicit_ids: &[String],
    max_candidates: usize,
) -> PlannerOutput {
    if !explicit_ids.is_empty() {
        tracing::debug!(count = explicit_ids.len(), "Using caller-supplied paragraph IDs");
        return PlannerOutput {
            candidate_ids: explicit_ids.to_vec(),
            auto_selected: false,
            reason: format!(
                "Paragraph IDs explicitly provided by the caller ({} IDs); planner selection skipped",
                explicit_ids.len()
            ),
        };
    }

    let question_keywords = extract_keywords(question);

    if question_keywords.is_empty() {
        return PlannerOutput {
            candidate_ids: Vec::new(),
            auto_selected: true,
            reason: "No usable keywords in the question after stopword filtering; nothing selected"
                .to_string(),
        };
    }

    // Score every paragraph in document order
    let mut scored: Vec<(usize, usize, String)> = Vec::new(); // (score, position, id)
    for (position, paragraph) in document.iter_paragraphs().enumerate() {
        let paragraph_keywords = extract_keywords(&paragraph.text);
        let score = question_keywords
            .intersection(&paragraph_keywords)
            .count();
        if score > 0 {
            scored.push((score, position, paragraph.paragraph_id.clone()));
        }
    }

    // Descending score; ascending document position breaks ties
    scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    scored.truncate(max_candidates);

    let candidate_ids: Vec<String> = scored.into_iter().map(|(_, _, id)| id).collect();

    tracing::debug!(
        keywords = question_keywords.len(),
        selected = candidate_ids.len(),
        "Planner keyword selection complete"
    );

    let reason = format!(
        "Selected {} paragraph(s) by keyword matching against the question",
        candidate_ids.len()
    );

    PlannerOutput {
        candidate_ids,
        auto_selected: true,
        reason,
    }
}
