//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with standardized naming conventions for the
//! question-answering pipeline and the ingestion path.

use metrics::{
    counter, describe_counter, describe_histogram, histogram, Unit,
};
use std::time::Instant;

/// Metrics prefix for all Veridoc metrics
pub const METRICS_PREFIX: &str = "veridoc";

/// Histogram buckets for model-call latency (seconds). Model calls dominate
/// request latency; everything else in the pipeline is sub-millisecond.
pub const LLM_LATENCY_BUCKETS: &[f64] = &[
    0.100, // 100ms
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.500, // 2.5s
    5.000, // 5s
    10.00, // 10s
    30.00, // 30s
    60.00, // 60s
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Pipeline metrics
    describe_counter!(
        format!("{}_questions_total", METRICS_PREFIX),
        Unit::Count,
        "Total questions processed by the pipeline"
    );

    describe_counter!(
        format!("{}_refusals_total", METRICS_PREFIX),
        Unit::Count,
        "Total canonical refusal answers, by origin stage"
    );

    describe_counter!(
        format!("{}_verifier_rejections_total", METRICS_PREFIX),
        Unit::Count,
        "Total draft answers rejected by the verifier, by rule"
    );

    describe_counter!(
        format!("{}_composer_rejections_total", METRICS_PREFIX),
        Unit::Count,
        "Total composed narratives discarded by sentence verification"
    );

    // Model call metrics
    describe_counter!(
        format!("{}_llm_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total language model invocations"
    );

    describe_histogram!(
        format!("{}_llm_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Language model call latency in seconds"
    );

    describe_counter!(
        format!("{}_llm_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Total language model errors, by kind"
    );

    // Ingestion metrics
    describe_counter!(
        format!("{}_documents_ingested_total", METRICS_PREFIX),
        Unit::Count,
        "Total documents ingested"
    );

    describe_counter!(
        format!("{}_paragraphs_created_total", METRICS_PREFIX),
        Unit::Count,
        "Total paragraphs created during ingestion"
    );

    describe_histogram!(
        format!("{}_ingestion_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Document ingestion latency in seconds"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Record a pipeline question, with its confidence outcome
pub fn record_question(confidence: &str, refused: bool) {
    counter!(
        format!("{}_questions_total", METRICS_PREFIX),
        "confidence" => confidence.to_string(),
        "refused" => refused.to_string()
    )
    .increment(1);
}

/// Record a refusal by the stage that produced it
pub fn record_refusal(stage: &str) {
    counter!(
        format!("{}_refusals_total", METRICS_PREFIX),
        "stage" => stage.to_string()
    )
    .increment(1);
}

/// Record a verifier rejection by rule name
pub fn record_verifier_rejection(rule: &str) {
    counter!(
        format!("{}_verifier_rejections_total", METRICS_PREFIX),
        "rule" => rule.to_string()
    )
    .increment(1);
}

/// Record a composer narrative rejection
pub fn record_composer_rejection() {
    counter!(format!("{}_composer_rejections_total", METRICS_PREFIX)).increment(1);
}

/// Record a language model call
pub fn record_llm_call(duration_secs: f64, stage: &str, success: bool) {
    counter!(
        format!("{}_llm_requests_total", METRICS_PREFIX),
        "stage" => stage.to_string(),
        "status" => if success { "success" } else { "error" }.to_string()
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_llm_duration_seconds", METRICS_PREFIX),
            "stage" => stage.to_string()
        )
        .record(duration_secs);
    } else {
        counter!(
            format!("{}_llm_errors_total", METRICS_PREFIX),
            "stage" => stage.to_string()
        )
        .increment(1);
    }
}

/// Record a document ingestion
pub fn record_ingestion(duration_secs: f64, paragraphs_created: usize) {
    counter!(format!("{}_documents_ingested_total", METRICS_PREFIX)).increment(1);

    counter!(format!("{}_paragraphs_created_total", METRICS_PREFIX))
        .increment(paragraphs_created as u64);

    histogram!(format!("{}_ingestion_duration_seconds", METRICS_PREFIX)).record(duration_secs);
}
