//! Endpoints spoken to by scraping agents. All of them sit behind the admin
//! gate and the ingest rate policy.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;
use std::sync::Arc;

use super::validation::{ApiJson, validated};
use super::{ApiError, ApiResponse, AppState, MessageResponse};
use crate::domain::job::{IngestReceipt, JobSubmission, RunFinishNotice, RunStartNotice};
use crate::services::{IngestError, TriggerOutcome};

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::DuplicateUrl { ref existing_id } => Self::Conflict {
                details: Some(serde_json::json!({ "jobId": existing_id })),
                message: err.to_string(),
            },
            IngestError::TriggerTimeout(_) => Self::GatewayTimeout(err.to_string()),
            IngestError::TriggerFailed(message) => Self::ExternalApiError {
                service: "Scraper automation".to_string(),
                message,
            },
            IngestError::Internal(msg) => Self::InternalError(msg),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub message: String,
    pub outcome: TriggerOutcome,
}

/// POST /jobs/scraper/save
pub async fn save_job(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<JobSubmission>,
) -> Result<impl IntoResponse, ApiError> {
    let job = validated(payload)?;
    let receipt: IngestReceipt = state.ingest_service().ingest(job).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(receipt))))
}

/// POST /jobs/scraper/start
pub async fn run_started(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<RunStartNotice>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let run = validated(payload)?;
    state.ingest_service().notify_start(run).await?;
    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Scrape start recorded",
    ))))
}

/// POST /jobs/scraper/finish
pub async fn run_finished(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<RunFinishNotice>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let run = validated(payload)?;
    state.ingest_service().notify_finish(run).await?;
    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Scrape finish recorded",
    ))))
}

/// POST /jobs/scraper/trigger
pub async fn trigger_run(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<TriggerResponse>>, ApiError> {
    let outcome = state.ingest_service().trigger_run().await?;
    let message = match outcome {
        TriggerOutcome::Acknowledged => "Scrape request received",
        TriggerOutcome::Dispatched => "Scrape run dispatched",
    };

    Ok(Json(ApiResponse::success(TriggerResponse {
        message: message.to_string(),
        outcome,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RecordId;

    #[test]
    fn test_duplicate_url_carries_existing_id() {
        let existing_id = RecordId::parse("64ae0f1c2b3d4e5f60718293").unwrap();
        let ApiError::Conflict { details, .. } =
            ApiError::from(IngestError::DuplicateUrl { existing_id })
        else {
            panic!("expected conflict");
        };
        assert_eq!(details.unwrap()["jobId"], "64ae0f1c2b3d4e5f60718293");
    }

    #[test]
    fn test_trigger_failures_map_to_gateway_statuses() {
        assert_eq!(
            ApiError::from(IngestError::TriggerTimeout(300))
                .into_response()
                .status(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            ApiError::from(IngestError::TriggerFailed("connection refused".into()))
                .into_response()
                .status(),
            StatusCode::BAD_GATEWAY
        );
    }
}
