//! Public read endpoints: listing, direct lookup and aggregate statistics.

use axum::{
    Json,
    extract::{Path, Query, State, rejection::QueryRejection},
};
use std::sync::Arc;

use super::validation::validated;
use super::{ApiError, ApiResponse, AppState, JobEnvelope, StatsEnvelope};
use crate::domain::job::{JobListQuery, JobPage};
use crate::services::{SearchError, StatsError};

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::InvalidId(_) => Self::BadRequest("Invalid job ID".to_string()),
            SearchError::NotFound => Self::NotFound("Job not found".to_string()),
            SearchError::Internal(msg) => Self::InternalError(msg),
        }
    }
}

impl From<StatsError> for ApiError {
    fn from(err: StatsError) -> Self {
        match err {
            StatsError::Internal(msg) => Self::InternalError(msg),
        }
    }
}

/// GET /jobs
///
/// Accepts `page`, `limit`, `keyword`, `company`, `location`, `jobType`,
/// `tags` (repeated, `tags[]`, or comma separated), `sortBy` and `sortOrder`.
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Json<ApiResponse<JobPage>>, ApiError> {
    let Query(pairs) = query.map_err(|e| ApiError::validation(e.body_text()))?;
    let request = validated(JobListQuery::from_pairs(pairs))?;

    let page = state.job_search_service().list(request).await?;
    Ok(Json(ApiResponse::success(page)))
}

/// GET /jobs/{id}
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<JobEnvelope>>, ApiError> {
    let job = state.job_search_service().get_by_id(&id).await?;
    Ok(Json(ApiResponse::success(JobEnvelope { job })))
}

/// GET /jobs/stats
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<StatsEnvelope>>, ApiError> {
    let stats = state.stats_service().stats().await?;
    Ok(Json(ApiResponse::success(StatsEnvelope { stats })))
}
