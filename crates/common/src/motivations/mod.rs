//! Author motivation extraction
//!
//! Extracts EXPLICIT motivations stated by authors using trigger phrases
//! like "because", "to address", "in order to". Only statements introduced
//! by a trigger are extracted; nothing is inferred.
//!
//! Used to answer "why" questions about author decisions through the
//! document introspection API.

use crate::document::Document;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};

/// An explicit author motivation extracted from text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Motivation {
    /// The motivation statement (the "why"), text after the trigger
    pub text: String,

    /// The phrase that introduced the motivation
    pub trigger_phrase: String,

    /// The complete sentence containing the motivation
    pub full_sentence: String,
}

/// Trigger phrases that signal explicit author motivation.
///
/// Longer phrases come first so "in order to" is reported as its own
/// trigger rather than a bare "to". "as" is intentionally excluded: too
/// many false positives ("as well as", "as a result").
const MOTIVATION_TRIGGERS: &[&str] = &[
    // Purpose/goal phrases
    "in order to",
    "so that",
    "so as to",
    "with the aim of",
    "with the goal of",
    "for the purpose of",
    "with the purpose of",
    "to enable",
    "to allow",
    "to achieve",
    "to improve",
    "to reduce",
    "to avoid",
    "to address",
    "to solve",
    "to overcome",
    "to mitigate",
    "to facilitate",
    "to support",
    "to counteract",
    "to prevent",
    "to ensure",
    // Reason phrases
    "because",
    "due to",
    "owing to",
    "given that",
    // Rationale phrases
    "this is because",
    "this allows",
    "this enables",
    "this ensures",
    "this prevents",
    "this helps",
    "this makes",
];

/// Words that may follow a bare "since" for it to count as a reason rather
/// than a time reference ("since 2014").
const SINCE_FOLLOWERS: &[&str] = &[
    "it", "they", "this", "these", "the", "we", "our", "dividing", "using", "having",
];

/// Extractor holding the compiled trigger pattern.
pub struct MotivationExtractor {
    trigger_re: Regex,
    since_re: Regex,
}

impl MotivationExtractor {
    pub fn new() -> Self {
        let alternation = MOTIVATION_TRIGGERS
            .iter()
            .map(|t| t.replace(' ', r"\s+"))
            .collect::<Vec<_>>()
            .join("|");
        let trigger_re = Regex::new(&format!(r"(?i)\b(?:{})\b", alternation))
            .expect("trigger pattern is valid");
        let since_re = Regex::new(r"(?i)\bsince\s+(\w+)").expect("since pattern is valid");

        Self { trigger_re, since_re }
    }

    /// Extract all explicit motivations from a piece of text.
    pub fn extract(&self, text: &str) -> Vec<Motivation> {
        let mut motivations = Vec::new();

        for sentence in split_sentences(text) {
            if let Some(m) = self.trigger_re.find(sentence) {
                let statement = sentence[m.end()..].trim().trim_end_matches('.');
                if statement.is_empty() {
                    continue;
                }
                motivations.push(Motivation {
                    text: statement.to_string(),
                    trigger_phrase: normalize_trigger(m.as_str()),
                    full_sentence: sentence.trim().to_string(),
                });
                continue;
            }

            // "since" needs a follower check to exclude time references
            if let Some(caps) = self.since_re.captures(sentence) {
                if let (Some(m), Some(follower)) = (caps.get(0), caps.get(1)) {
                    let follower = follower.as_str().to_lowercase();
                    if SINCE_FOLLOWERS.contains(&follower.as_str()) {
                        let start = m.start() + "since".len();
                        let statement = sentence[start..].trim().trim_end_matches('.');
                        if !statement.is_empty() {
                            motivations.push(Motivation {
                                text: statement.to_string(),
                                trigger_phrase: "since".to_string(),
                                full_sentence: sentence.trim().to_string(),
                            });
                        }
                    }
                }
            }
        }

        motivations
    }

    /// Extract motivations for every paragraph of a document, keyed by
    /// paragraph ID. Paragraphs without motivations are omitted.
    pub fn extract_for_document(&self, document: &Document) -> Vec<(String, Vec<Motivation>)> {
        document
            .iter_paragraphs()
            .filter_map(|p| {
                let found = self.extract(&p.text);
                if found.is_empty() {
                    None
                } else {
                    Some((p.paragraph_id.clone(), found))
                }
            })
            .collect()
    }
}

impl Default for MotivationExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Split text into sentences on terminal punctuation.
fn split_sentences(text: &str) -> Vec<&str> {
    text.split_terminator(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Collapse whitespace inside a matched trigger and lowercase it.
fn normalize_trigger(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
