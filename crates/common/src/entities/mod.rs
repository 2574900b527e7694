//! Heuristic entity extraction
//!
//! Deterministic, pure extraction of entities from evidence text:
//! - variables: mathematical variables like Q, K, V, d_k, W^Q
//! - concepts: domain terms like attention, transformer, softmax
//!
//! The extractor is a pure function of its input text; the Evidence Linker
//! and the Composer's sentence verifier both rely on that determinism.

use crate::document::Entities;
use regex_lite::Regex;

/// Contract for entity extraction, injected into the pipeline.
pub trait EntityExtractor: Send + Sync {
    /// Extract entities from text. Must be deterministic and side-effect
    /// free: identical input always yields identical output.
    fn extract(&self, text: &str) -> Entities;
}

/// Variable notation patterns common in ML papers.
///
/// Single pattern with top-level alternation; matched text is taken as the
/// variable name with its original casing. Bare `n`/`h` dimension symbols
/// are not detected (they need surrounding-context checks this pattern
/// language cannot express) and have not been worth a code path.
const VARIABLE_PATTERN: &str = r"(?i)\bd_(?:k|v|model|ff)\b|\bW(?:\^[QKVO]|_[io0-9])+\b|\bhead[_0-9i]*\b|\bPE\b|\b[QKVWXYZ]\b";

/// Domain concept vocabulary. Matching is case-insensitive with word
/// boundaries; longer phrases win over their prefixes.
const CONCEPT_KEYWORDS: &[&str] = &[
    // Attention mechanisms
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
    // Architecture components
    "transformer",
    "encoder",
    "decoder",
    "layer",
    "sublayer",
    "sub-layer",
    "embedding",
    "embeddings",
    "positional encoding",
    "position encoding",
    "feed-forward",
    "feedforward",
    "ffn",
    "residual connection",
    "residual",
    "layer normalization",
    "layer norm",
    "layernorm",
    "dropout",
    "lstm",
    "cnn",
    "rnn",
    // Operations
    "softmax",
    "linear projection",
    "projection",
    "concatenation",
    "concat",
    "matrix multiplication",
    "dot product",
    "weighted sum",
    // Training concepts
    "training",
    "inference",
    "regularization",
    "label smoothing",
    "learning rate",
    "warmup",
    "optimizer",
    "adam",
    "loss",
    "cross-entropy",
    // Evaluation
    "bleu",
    "bleu score",
    "perplexity",
    "accuracy",
    "f1",
    "precision",
    "recall",
    // Data
    "sequence",
    "token",
    "tokens",
    "vocabulary",
    "batch",
    "batch size",
    "input",
    "output",
    "query",
    "key",
    "value",
    "mask",
    "padding",
];

/// Regex-based entity extractor over the fixed patterns above.
pub struct HeuristicEntityExtractor {
    variable_re: Regex,
    concept_re: Regex,
}

impl HeuristicEntityExtractor {
    pub fn new() -> Self {
        let variable_re = Regex::new(VARIABLE_PATTERN).expect("variable pattern is valid");

        // Longest keyword first so "bleu score" beats "bleu"
        let mut keywords: Vec<&str> = CONCEPT_KEYWORDS.to_vec();
        keywords.sort_by_key(|k| std::cmp::Reverse(k.len()));
        let alternation = keywords
            .iter()
            .map(|k| escape_keyword(k))
            .collect::<Vec<_>>()
            .join("|");
        let concept_re = Regex::new(&format!(r"(?i)\b(?:{})\b", alternation))
            .expect("concept pattern is valid");

        Self {
            variable_re,
            concept_re,
        }
    }

    /// Extract variables: original case preserved, case-insensitive dedup,
    /// first occurrence wins.
    pub fn extract_variables(&self, text: &str) -> Vec<String> {
        let mut seen_lower = std::collections::HashSet::new();
        let mut found = Vec::new();

        for m in self.variable_re.find_iter(text) {
            let var = m.as_str().trim().to_string();
            if var.is_empty() {
                continue;
            }
            if seen_lower.insert(var.to_lowercase()) {
                found.push(var);
            }
        }

        found
    }

    /// Extract concepts: lowercased, deduplicated, first occurrence wins.
    pub fn extract_concepts(&self, text: &str) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut found = Vec::new();

        for m in self.concept_re.find_iter(text) {
            let concept = m.as_str().trim().to_lowercase();
            if seen.insert(concept.clone()) {
                found.push(concept);
            }
        }

        found
    }
}

impl Default for HeuristicEntityExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityExtractor for HeuristicEntityExtractor {
    fn extract(&self, text: &str) -> Entities {
        Entities {
            variables: self.extract_variables(text),
            concepts: self.extract_concepts(text),
        }
    }
}

/// Escape regex metacharacters in a concept keyword
fn escape_keyword(keyword: &str) -> String {
    let mut escaped = String::with_capacity(keyword.len());
    for ch in keyword.chars() {
        if "\\.+*?()|[]{}^$#".contains(ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> HeuristicEntityExtractor {
        HeuristicEntityExtractor::new()
    }

    #[test]
    fn test_extracts_qkv_variables() {
        let vars = extractor()
            .extract_variables("An attention function maps a query Q and key-value pairs K, V.");
        assert!(vars.contains(&"Q".to_string()));
        assert!(vars.contains(&"K".to_string()));
        assert!(vars.contains(&"V".to_string()));
    }

    #[test]
    fn test_extracts_subscripted_dimensions() {
        let vars = extractor().extract_variables("queries and keys of dimension d_k, values of dimension d_v");
        assert!(vars.contains(&"d_k".to_string()));
        assert!(vars.contains(&"d_v".to_string()));
    }

    #[test]
    fn test_variables_dedup_case_insensitively() {
        let vars = extractor().extract_variables("Q appears, then q appears again, then Q once more.");
        let q_count = vars
            .iter()
            .filter(|v| v.eq_ignore_ascii_case("q"))
            .count();
        assert_eq!(q_count, 1);
        // First occurrence's casing wins
        assert!(vars.contains(&"Q".to_string()));
    }

    #[test]
    fn test_extracts_equation_variables() {
        let vars = extractor().extract_variables("Attention(Q, K, V) = softmax(QK^T / sqrt(d_k))V");
        assert!(vars.contains(&"Q".to_string()));
        assert!(vars.contains(&"K".to_string()));
        assert!(vars.contains(&"V".to_string()));
        assert!(vars.contains(&"d_k".to_string()));
    }

    #[test]
    fn test_no_variables_in_plain_prose() {
        let vars = extractor().extract_variables("This paragraph discusses translation results only.");
        assert!(vars.is_empty());
    }

    #[test]
    fn test_extracts_concepts_lowercased() {
        let concepts = extractor()
            .extract_concepts("The Transformer uses Multi-Head Attention and a softmax operation.");
        assert!(concepts.contains(&"transformer".to_string()));
        assert!(concepts.contains(&"multi-head attention".to_string()));
        assert!(concepts.contains(&"softmax".to_string()));
    }

    #[test]
    fn test_longest_concept_wins() {
        let concepts = extractor().extract_concepts("We report a BLEU score of 28.4.");
        assert!(concepts.contains(&"bleu score".to_string()));
    }

    #[test]
    fn test_concepts_dedup() {
        let concepts = extractor().extract_concepts("attention, attention, and more attention");
        assert_eq!(
            concepts.iter().filter(|c| *c == "attention").count(),
            1
        );
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let text = "Multi-head attention with Q, K, V and dimension d_k uses softmax.";
        let a = extractor().extract(text);
        let b = extractor().extract(text);
        assert_eq!(a, b);
    }

    #[test]
    fn test_queries_does_not_match_query() {
        // Word boundaries: "queries" is not the concept "query"
        let concepts = extractor().extract_concepts("Attention maps queries to outputs.");
        assert!(!concepts.contains(&"query".to_string()));
    }
}
