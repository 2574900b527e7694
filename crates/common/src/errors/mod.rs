//! Error types for Veridoc services
//!
//! Provides a comprehensive error handling system with:
//! - Distinct error types for different failure modes
//! - HTTP status code mapping
//! - Structured error responses
//! - Error codes for client handling
//!
//! The taxonomy keeps the conditions a caller must treat differently
//! distinguishable: a refusal is NOT an error (the pipeline returns it as a
//! normal answer), a model timeout is retryable (504), a model service error
//! is not the same as a timeout (502/429), and malformed model output is a
//! contract violation (500), never silently downgraded to a refusal.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    MissingField,
    InvalidFormat,
    PayloadTooLarge,

    // Resource errors (4xxx)
    NotFound,
    DocumentNotFound,
    DocumentNotReady,
    ParagraphNotFound,

    // Conflict errors (5xxx)
    Conflict,
    DuplicateEvidenceId,

    // Rate limiting (6xxx)
    RateLimited,

    // Ingestion errors (7xxx)
    IngestionFailed,

    // Language model errors (8xxx)
    LlmTimeout,
    LlmRateLimited,
    LlmUpstreamError,
    MalformedModelOutput,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,

    // Service unavailable
    ServiceUnavailable,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            // Validation (1xxx)
            ErrorCode::ValidationError => 1001,
            ErrorCode::MissingField => 1002,
            ErrorCode::InvalidFormat => 1003,
            ErrorCode::PayloadTooLarge => 1004,

            // Resources (4xxx)
            ErrorCode::NotFound => 4001,
            ErrorCode::DocumentNotFound => 4002,
            ErrorCode::DocumentNotReady => 4003,
            ErrorCode::ParagraphNotFound => 4004,

            // Conflicts (5xxx)
            ErrorCode::Conflict => 5001,
            ErrorCode::DuplicateEvidenceId => 5002,

            // Rate limits (6xxx)
            ErrorCode::RateLimited => 6001,

            // Ingestion (7xxx)
            ErrorCode::IngestionFailed => 7001,

            // Language model (8xxx)
            ErrorCode::LlmTimeout => 8001,
            ErrorCode::LlmRateLimited => 8002,
            ErrorCode::LlmUpstreamError => 8003,
            ErrorCode::MalformedModelOutput => 8004,

            // Internal (9xxx)
            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,

            ErrorCode::ServiceUnavailable => 9999,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Required field missing: {field}")]
    MissingField { field: String },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    #[error("Payload too large: {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },

    // Resource errors
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    #[error("Document not found: {id}")]
    DocumentNotFound { id: String },

    #[error("Document not ready: {id} is {status}")]
    DocumentNotReady { id: String, status: String },

    #[error("Paragraph not found: {id}")]
    ParagraphNotFound { id: String },

    // Ingestion invariant violations
    #[error("Duplicate evidence ID in document: {id}")]
    DuplicateEvidenceId { id: String },

    #[error("Ingestion failed: {message}")]
    IngestionFailed { message: String },

    // Rate limiting (our own surface)
    #[error("Rate limit exceeded")]
    RateLimited,

    // Language model errors. A timeout means "the dependency did not
    // respond", which is retryable; it is never folded into a refusal.
    #[error("Language model timed out after {timeout_ms}ms")]
    LlmTimeout { timeout_ms: u64 },

    #[error("Language model rate limited: {message}")]
    LlmRateLimited { message: String },

    #[error("Language model upstream error: {message}")]
    LlmUpstream { message: String },

    #[error("Malformed model output: {message}")]
    MalformedModelOutput { message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Service unavailable: {message}")]
    ServiceUnavailable { message: String },

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::MissingField { .. } => ErrorCode::MissingField,
            AppError::InvalidFormat { .. } => ErrorCode::InvalidFormat,
            AppError::PayloadTooLarge { .. } => ErrorCode::PayloadTooLarge,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::DocumentNotFound { .. } => ErrorCode::DocumentNotFound,
            AppError::DocumentNotReady { .. } => ErrorCode::DocumentNotReady,
            AppError::ParagraphNotFound { .. } => ErrorCode::ParagraphNotFound,
            AppError::DuplicateEvidenceId { .. } => ErrorCode::DuplicateEvidenceId,
            AppError::IngestionFailed { .. } => ErrorCode::IngestionFailed,
            AppError::RateLimited => ErrorCode::RateLimited,
            AppError::LlmTimeout { .. } => ErrorCode::LlmTimeout,
            AppError::LlmRateLimited { .. } => ErrorCode::LlmRateLimited,
            AppError::LlmUpstream { .. } => ErrorCode::LlmUpstreamError,
            AppError::MalformedModelOutput { .. } => ErrorCode::MalformedModelOutput,
            AppError::HttpClient(_) => ErrorCode::LlmUpstreamError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::ServiceUnavailable { .. } => ErrorCode::ServiceUnavailable,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. }
            | AppError::MissingField { .. }
            | AppError::InvalidFormat { .. } => StatusCode::BAD_REQUEST,

            // 404 Not Found
            AppError::NotFound { .. }
            | AppError::DocumentNotFound { .. }
            | AppError::ParagraphNotFound { .. } => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::DuplicateEvidenceId { .. } => StatusCode::CONFLICT,

            // 410 Gone is not used; a failed ingest reports 409 on re-query
            AppError::DocumentNotReady { .. } => StatusCode::CONFLICT,

            // 413 Payload Too Large
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,

            // 429 Too Many Requests
            AppError::RateLimited | AppError::LlmRateLimited { .. } => {
                StatusCode::TOO_MANY_REQUESTS
            }

            // 500 Internal Server Error
            AppError::IngestionFailed { .. }
            | AppError::MalformedModelOutput { .. }
            | AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 502 Bad Gateway
            AppError::LlmUpstream { .. } | AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,

            // 503 Service Unavailable
            AppError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,

            // 504 Gateway Timeout
            AppError::LlmTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// True when the caller may retry the request unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::LlmTimeout { .. }
                | AppError::LlmRateLimited { .. }
                | AppError::ServiceUnavailable { .. }
        )
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        // Log based on severity
        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message,
                details: None,
                request_id: None, // Should be filled by middleware
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}
