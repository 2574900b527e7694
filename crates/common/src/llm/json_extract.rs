//! Structured-object extraction from free-form model text
//!
//! Language models are asked for a single JSON object but routinely wrap it
//! in prose or markdown fences. Recovery is an ordered fallback chain, each
//! strategy's failure mode distinguishable:
//!
//! 1. direct parse of the whole (trimmed) text
//! 2. parse of the interior of the first fenced code block
//! 3. brace-balanced scan from the first `{`, tracking string boundaries
//!    and escape sequences so braces inside strings don't count
//!
//! A failure here is a contract violation by the model and surfaces as
//! `AppError::MalformedModelOutput` - it is never treated as a refusal.

use crate::errors::AppError;
use thiserror::Error;

/// Extraction failure modes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum JsonExtractError {
    /// No opening brace anywhere in the text
    #[error("no JSON object found in text")]
    NoObject,

    /// End of text reached with unclosed braces
    #[error("unterminated JSON object: {open} unclosed brace(s)")]
    Unterminated { open: usize },

    /// A closing brace appeared with no matching open brace
    #[error("unbalanced JSON braces: extra closing brace at byte {position}")]
    UnbalancedClose { position: usize },

    /// A candidate substring was located but is not valid JSON
    #[error("extracted candidate is not valid JSON: {message}")]
    Invalid { message: String },
}

impl From<JsonExtractError> for AppError {
    fn from(err: JsonExtractError) -> Self {
        AppError::MalformedModelOutput {
            message: err.to_string(),
        }
    }
}

/// Extract and parse the single JSON object embedded in `text`.
pub fn extract_object(text: &str) -> Result<serde_json::Value, JsonExtractError> {
    let trimmed = text.trim();

    // Fast path: the whole text is the object
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if value.is_object() {
            return Ok(value);
        }
    }

    // Markdown fence path
    if let Some(interior) = fenced_block(trimmed) {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(interior.trim()) {
            if value.is_object() {
                return Ok(value);
            }
        }
    }

    // Brace-balanced scan path
    let candidate = balanced_object_str(trimmed)?;
    serde_json::from_str(candidate).map_err(|e| JsonExtractError::Invalid {
        message: e.to_string(),
    })
}

/// Return the interior of the first fenced code block, if any.
///
/// Accepts an optional language tag on the opening fence line
/// ("```json\n...\n```" or "```\n...\n```").
fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after_fence = &text[open + 3..];

    // Skip the language tag up to the end of the opening line
    let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_fence[body_start..];

    let close = body.find("```")?;
    Some(&body[..close])
}

/// Locate the first balanced `{...}` object, honoring strings and escapes.
///
/// The scan starts at the first opening brace. A quote toggles the
/// inside-string flag unless the preceding character was a backslash; brace
/// characters count toward nesting depth only while outside a string. The
/// object ends at the first point depth returns to zero.
fn balanced_object_str(text: &str) -> Result<&str, JsonExtractError> {
    let start = text.find('{').ok_or(JsonExtractError::NoObject)?;

    let mut depth: usize = 0;
    let mut in_string = false;
    let mut escape_next = false;

    for (offset, ch) in text[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match ch {
            '\\' => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                if depth == 0 {
                    return Err(JsonExtractError::UnbalancedClose {
                        position: start + offset,
                    });
                }
                depth -= 1;
                if depth == 0 {
                    return Ok(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    Err(JsonExtractError::Unterminated { open: depth })
}
