//! Language model client abstraction
//!
//! Provides:
//! - the `LanguageModel` trait the pipeline is injected with
//! - an OpenAI-compatible HTTP client (chat completions over reqwest)
//! - a mock implementation for testing without network access
//!
//! Every call is bounded by a caller-supplied timeout. A timeout, a
//! provider-side error (e.g. rate limiting), and a malformed/empty response
//! each surface as a distinct `AppError` variant so callers can apply
//! different retry policy to each. No retries happen here.

pub mod json_extract;

use crate::config::LlmConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Raw response from a language model.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// The text content of the response
    pub content: String,

    /// Token usage reported by the provider, when available
    pub usage: Option<TokenUsage>,
}

impl LlmResponse {
    pub fn from_content(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: None,
        }
    }
}

/// Token accounting from the provider.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// Trait for language model providers.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate a response for the given prompt, bounded by `timeout`.
    async fn generate(&self, prompt: &str, timeout: Duration) -> Result<LlmResponse>;
}

// OpenAI-compatible chat completions wire format

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: usize,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

/// HTTP language model client for OpenAI-compatible endpoints
/// (Groq, OpenAI, local inference servers).
pub struct HttpLanguageModel {
    client: reqwest::Client,
    config: LlmConfig,
    api_key: String,
}

impl HttpLanguageModel {
    /// Create a client from configuration. The API key comes from the
    /// config or, failing that, the `LLM_API_KEY` environment variable.
    pub fn new(config: LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("LLM_API_KEY").ok())
            .ok_or_else(|| AppError::Configuration {
                message: "LLM API key required: set llm.api_key or LLM_API_KEY".to_string(),
            })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            config,
            api_key,
        })
    }
}

#[async_trait]
impl LanguageModel for HttpLanguageModel {
    async fn generate(&self, prompt: &str, timeout: Duration) -> Result<LlmResponse> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let send = self
            .client
            .post(&self.config.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send();

        let response = match tokio::time::timeout(timeout, send).await {
            Err(_) => {
                return Err(AppError::LlmTimeout {
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
            Ok(Err(e)) if e.is_timeout() => {
                return Err(AppError::LlmTimeout {
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
            Ok(Err(e)) => {
                return Err(AppError::LlmUpstream {
                    message: format!("request failed: {}", e),
                })
            }
            Ok(Ok(response)) => response,
        };

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::LlmRateLimited { message: body });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::LlmUpstream {
                message: format!("API error {}: {}", status, body),
            });
        }

        let chat: ChatResponse = response.json().await.map_err(|e| {
            AppError::MalformedModelOutput {
                message: format!("unparseable provider response: {}", e),
            }
        })?;

        let content = chat
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .filter(|c| !c.is_empty())
            .ok_or(AppError::MalformedModelOutput {
                message: "provider returned no message content".to_string(),
            })?;

        let usage = chat.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        if let Some(u) = &usage {
            tracing::debug!(
                prompt_tokens = u.prompt_tokens,
                completion_tokens = u.completion_tokens,
                "Model call completed"
            );
        }

        Ok(LlmResponse { content, usage })
    }
}

/// Mock language model for testing.
///
/// Operates in two modes:
/// 1. Fixed response: always returns the configured default
/// 2. Keyword matching: returns the response whose keyword appears in the
///    prompt (case-insensitive)
///
/// Records every prompt and keeps an invocation counter so tests can assert
/// the model was (or was not) called.
pub struct MockLanguageModel {
    default_response: String,
    keyword_responses: Vec<(String, String)>,
    invocations: AtomicUsize,
    history: Mutex<Vec<String>>,
}

impl MockLanguageModel {
    pub fn new() -> Self {
        Self {
            default_response: Self::refusal_response(),
            keyword_responses: Vec::new(),
            invocations: AtomicUsize::new(0),
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn with_default_response(response: impl Into<String>) -> Self {
        Self {
            default_response: response.into(),
            ..Self::new()
        }
    }

    /// Add a keyword-triggered response
    pub fn with_keyword_response(
        mut self,
        keyword: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        let keyword: String = keyword.into();
        self.keyword_responses
            .push((keyword.to_lowercase(), response.into()));
        self
    }

    /// How many times `generate` has been called
    pub fn invocation_count(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    /// Snapshot of every prompt seen so far
    pub fn prompts(&self) -> Vec<String> {
        self.history.lock().unwrap().clone()
    }

    /// The canonical "information not found" JSON answer
    pub fn refusal_response() -> String {
        serde_json::json!({
            "answer": crate::REFUSAL_ANSWER,
            "citations": [],
            "confidence": "low"
        })
        .to_string()
    }

    /// Helper to create a properly formatted answer payload
    pub fn answer_response(answer: &str, citations: &[&str], confidence: &str) -> String {
        serde_json::json!({
            "answer": answer,
            "citations": citations,
            "confidence": confidence
        })
        .to_string()
    }
}

impl Default for MockLanguageModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    async fn generate(&self, prompt: &str, _timeout: Duration) -> Result<LlmResponse> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        self.history.lock().unwrap().push(prompt.to_string());

        let prompt_lower = prompt.to_lowercase();
        for (keyword, response) in &self.keyword_responses {
            if prompt_lower.contains(keyword) {
                return Ok(LlmResponse::from_content(response.clone()));
            }
        }

        Ok(LlmResponse::from_content(self.default_response.clone()))
    }
}
