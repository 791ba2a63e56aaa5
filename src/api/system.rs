//! Liveness and discovery endpoints.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use super::{ApiResponse, AppState};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    /// Seconds since the process started serving.
    pub uptime: u64,
    pub version: &'static str,
    pub database: bool,
}

#[derive(Debug, Serialize)]
pub struct EndpointInfo {
    pub method: &'static str,
    pub path: &'static str,
    pub auth: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ApiIndex {
    pub name: &'static str,
    pub version: &'static str,
    pub endpoints: Vec<EndpointInfo>,
}

const ENDPOINTS: [(&str, &str, &str); 11] = [
    ("POST", "/api/auth/register", "none"),
    ("POST", "/api/auth/login", "none"),
    ("GET", "/api/auth/me", "user"),
    ("GET", "/api/jobs", "none"),
    ("GET", "/api/jobs/stats", "none"),
    ("GET", "/api/jobs/{id}", "none"),
    ("POST", "/api/jobs/scraper/save", "admin"),
    ("POST", "/api/jobs/scraper/start", "admin"),
    ("POST", "/api/jobs/scraper/finish", "admin"),
    ("POST", "/api/jobs/scraper/trigger", "admin"),
    ("GET", "/health", "none"),
];

/// GET /health
///
/// Reports 503 when the store stops answering.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let database = state.store().ping().await.is_ok();
    let status = if database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if database { "OK" } else { "DEGRADED" },
            timestamp: Utc::now(),
            uptime: state.start_time.elapsed().as_secs(),
            version: env!("CARGO_PKG_VERSION"),
            database,
        }),
    )
}

/// GET /api
pub async fn index() -> Json<ApiResponse<ApiIndex>> {
    Json(ApiResponse::success(ApiIndex {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        endpoints: ENDPOINTS
            .iter()
            .map(|&(method, path, auth)| EndpointInfo { method, path, auth })
            .collect(),
    }))
}
