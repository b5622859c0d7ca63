//! KOI Disposition API Server
//!
//! REST API for single-record and batch exoplanet disposition prediction.

use axum::{
    extract::{DefaultBodyLimit, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use inference_engine::PredictionService;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

pub mod config;
pub mod error;
mod routes;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use routes::predictions::{BatchResponse, RowSummary};

/// Application state shared across handlers
pub struct AppState {
    /// Prediction pipeline with its lazily-loaded caches
    pub service: Arc<PredictionService>,
    /// Prometheus exposition of the process metrics
    pub metrics: PrometheusHandle,
    /// Largest accepted request body
    pub max_upload_bytes: usize,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Create new application state
    pub fn new(
        service: PredictionService,
        metrics: PrometheusHandle,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            service: Arc::new(service),
            metrics,
            max_upload_bytes,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
        }
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub uptime_seconds: u64,
    /// Model and default values loaded
    pub caches_warm: bool,
    pub decision_threshold: f64,
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let max_upload_bytes = state.max_upload_bytes;
    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/metrics", get(metrics_handler))
        .route("/api/v1/predict", post(routes::predictions::predict))
        .route("/api/v1/predict/batch", post(routes::predictions::predict_batch))
        .route("/api/v1/predict/batch/export", post(routes::predictions::export_batch))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let caches_warm = state.service.is_warm();

    let response = HealthResponse {
        status: if caches_warm { "healthy" } else { "starting" }.to_string(),
        timestamp,
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        caches_warm,
        decision_threshold: state.service.settings().decision_threshold,
    };

    Json(response)
}

/// Prometheus text exposition
async fn metrics_handler(State(state): State<Arc<AppState>>) -> String {
    state.metrics.render()
}

/// Initialize logging
pub fn init_logging(json: bool) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let builder = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    }
}

/// Run the server
pub async fn run_server(config: ServiceConfig) -> anyhow::Result<()> {
    let metrics = PrometheusBuilder::new().install_recorder()?;

    let service = PredictionService::new(config.service_settings());
    // a failed warm-up is retried on the first request
    if let Err(e) = service.warm_up() {
        warn!("Prediction caches not loaded at startup: {}", e);
    }

    let state = Arc::new(AppState::new(service, metrics, config.max_upload_bytes));
    let app = create_router(state);

    info!("Starting API server on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
