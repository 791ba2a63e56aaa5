use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::state::SharedState;

pub mod auth;
mod error;
mod ingest;
mod jobs;
mod observability;
pub mod rate_limit;
mod system;
mod types;
mod validation;

pub use error::{ApiError, ErrorDetail};
pub use types::*;
pub use validation::ApiJson;

use crate::services::{
    AuthService, IngestService, JobSearchService, RequestGate, StatsService,
};
use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Config {
        self.shared.config()
    }

    #[must_use]
    pub fn store(&self) -> &crate::db::Store {
        &self.shared.store
    }

    #[must_use]
    pub fn request_gate(&self) -> &Arc<RequestGate> {
        &self.shared.request_gate
    }

    #[must_use]
    pub fn auth_service(&self) -> &Arc<dyn AuthService> {
        &self.shared.auth_service
    }

    #[must_use]
    pub fn ingest_service(&self) -> &Arc<dyn IngestService> {
        &self.shared.ingest_service
    }

    #[must_use]
    pub fn job_search_service(&self) -> &Arc<dyn JobSearchService> {
        &self.shared.job_search_service
    }

    #[must_use]
    pub fn stats_service(&self) -> &Arc<dyn StatsService> {
        &self.shared.stats_service
    }
}

#[must_use]
pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    })
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    Ok(create_app_state(shared, prometheus_handle))
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors_origins = state.config().server.cors_allowed_origins.clone();

    let api_router = Router::new()
        .route("/", get(system::index))
        .merge(create_auth_router(state.clone()))
        .merge(create_public_router(state.clone()))
        .merge(create_ingest_router(state.clone()));

    let cors_layer = if cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api", api_router)
        .route("/health", get(system::health))
        .route("/metrics", get(observability::get_metrics))
        .layer(middleware::from_fn(observability::security_headers_middleware))
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            observability::logging_middleware,
        ))
        .with_state(state)
}

/// Register and login, under the auth rate policy.
fn create_auth_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route_layer(middleware::from_fn_with_state(state, rate_limit::limit_auth))
}

/// Read endpoints under the public rate policy. `/auth/me` additionally
/// requires a bearer token.
fn create_public_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let me = Router::new()
        .route("/auth/me", get(auth::me))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_user,
        ));

    Router::new()
        .route("/jobs", get(jobs::list_jobs))
        .route("/jobs/stats", get(jobs::get_stats))
        .route("/jobs/{id}", get(jobs::get_job))
        .merge(me)
        .route_layer(middleware::from_fn_with_state(state, rate_limit::limit_public))
}

/// Scraper endpoints: ingest rate policy first, then the admin gate.
fn create_ingest_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/jobs/scraper/save", post(ingest::save_job))
        .route("/jobs/scraper/start", post(ingest::run_started))
        .route("/jobs/scraper/finish", post(ingest::run_finished))
        .route("/jobs/scraper/trigger", post(ingest::trigger_run))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin,
        ))
        .route_layer(middleware::from_fn_with_state(state, rate_limit::limit_ingest))
}
