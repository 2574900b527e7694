//! Veridoc Common Library
//!
//! Shared code for the Veridoc services including:
//! - Document model (sections, paragraphs, equations) with ID indexing
//! - Error types and handling
//! - Configuration management
//! - Heuristic entity and motivation extraction
//! - Language model client abstraction
//! - Structured-object extraction from free-form model text
//! - Metrics and observability

pub mod config;
pub mod document;
pub mod entities;
pub mod errors;
pub mod llm;
pub mod metrics;
pub mod motivations;

// Re-export commonly used types
pub use config::AppConfig;
pub use document::{Document, Entities, Equation, Paragraph, Section};
pub use errors::{AppError, Result};
pub use llm::{LanguageModel, LlmResponse};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The canonical refusal answer returned when the evidence is insufficient.
///
/// This exact string is load-bearing: the Explainer emits it on the
/// no-evidence path, the prompt instructs the model to use it verbatim, and
/// the Verifier compares against it when deciding whether citations are
/// required.
pub const REFUSAL_ANSWER: &str = "Not defined in the paper";
