//! Veridoc API Gateway
//!
//! The entry point for all external API requests. Handles:
//! - Document upload and background ingestion
//! - Question answering (explain) and narrative composition (compose)
//! - Rate limiting
//! - Observability (logging, metrics)

mod handlers;
mod middleware;
mod registry;

use axum::{
    routing::{get, post},
    Router,
};
use registry::DocumentRegistry;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;
use veridoc_common::{
    config::AppConfig,
    entities::{EntityExtractor, HeuristicEntityExtractor},
    llm::{HttpLanguageModel, LanguageModel},
    metrics,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub registry: Arc<DocumentRegistry>,
    pub llm: Arc<dyn LanguageModel>,
    pub extractor: Arc<dyn EntityExtractor>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    // Initialize tracing
    init_tracing(&config);

    info!("Starting Veridoc API Gateway v{}", veridoc_common::VERSION);

    let config = Arc::new(config);

    // Initialize metrics
    metrics::register_metrics();
    if config.observability.metrics_port > 0 {
        let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(metrics_addr)
            .install()?;
        info!("Prometheus exporter on {}", metrics_addr);
    }

    // Language model client (fails fast without an API key)
    let llm: Arc<dyn LanguageModel> = Arc::new(HttpLanguageModel::new(config.llm.clone())?);

    // Create app state
    let state = AppState {
        config: config.clone(),
        registry: Arc::new(DocumentRegistry::new()),
        llm,
        extractor: Arc::new(HeuristicEntityExtractor::new()),
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.observability.log_level));

    if config.observability.json_logging {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // API routes
    let api_routes = Router::new()
        // Health endpoints
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        // Document lifecycle
        .route(
            "/documents",
            post(handlers::documents::upload_document).get(handlers::documents::list_documents),
        )
        .route(
            "/documents/{id}/sections",
            get(handlers::documents::get_sections),
        )
        .route(
            "/documents/{id}/paragraphs/{paragraph_id}",
            get(handlers::documents::get_paragraph),
        )
        .route(
            "/documents/{id}/motivations",
            get(handlers::documents::get_motivations),
        )
        .route(
            "/documents/{id}/reparse",
            post(handlers::documents::reparse_document),
        )
        // Question answering
        .route("/documents/{id}/explain", post(handlers::explain::explain))
        .route("/documents/{id}/compose", post(handlers::explain::compose));

    // Allow uploads up to the configured limit (axum defaults to 2MB)
    let body_limit = axum::extract::DefaultBodyLimit::max(state.config.ingest.max_upload_bytes);

    // Rate limiting (global token bucket)
    let mut app = Router::new().nest("/v1", api_routes).layer(body_limit);

    if state.config.rate_limit.enabled {
        let limiter = middleware::rate_limit::create_rate_limiter(&state.config.rate_limit);
        app = app.layer(axum::middleware::from_fn(
            move |request: axum::extract::Request, next: axum::middleware::Next| {
                let limiter = limiter.clone();
                async move {
                    middleware::rate_limit::rate_limit_middleware(limiter, request, next).await
                }
            },
        ));
    }

    app.layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
