//! HTTP handlers for the report service
//! Provides the report endpoint and the public health check

pub mod report;

use crate::config::Config;
use crate::database::traits::DataSource;
use crate::dto::{HealthResponse, HealthStatus};
use crate::security::SecurityService;
use crate::service::ReportService;
use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub data_source: Arc<dyn DataSource>,
    pub security_service: Arc<SecurityService>,
    pub report_service: Arc<ReportService>,
    pub start_time: Instant,
}

impl AppState {
    /// Wire the services around a data source
    pub fn new(config: Arc<Config>, data_source: Arc<dyn DataSource>) -> anyhow::Result<Self> {
        let security_service = SecurityService::new(config.clone())?;
        Ok(Self {
            report_service: Arc::new(ReportService::new(config.clone())),
            security_service: Arc::new(security_service),
            data_source,
            config,
            start_time: Instant::now(),
        })
    }
}

pub fn create_router(state: AppState) -> Router {
    let max_request_size = state.config.server.max_request_size;

    // Public routes (no authentication required)
    let public_routes = Router::new().route("/health", get(health_check));

    // Protected routes authenticate through the JwtAuth extractor
    let protected_routes = Router::new()
        .route(
            "/api/v1/report",
            get(report::get_report_query).post(report::post_report),
        )
        .layer(DefaultBodyLimit::max(max_request_size));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let (status, error) = match state.data_source.health_check().await {
        Ok(()) => (HealthStatus::Healthy, None),
        Err(e) => {
            warn!("Data source health check failed: {:#}", e);
            (HealthStatus::Unhealthy, Some(e.to_string()))
        }
    };

    let code = match status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    let response = HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime: state.start_time.elapsed().as_secs(),
        timestamp: Utc::now(),
        database: state.data_source.stats(),
        error,
    };

    (code, Json(response))
}
