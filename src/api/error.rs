use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::Value;
use std::fmt;

use super::ApiResponse;
use crate::domain::{FieldError, ValidationErrors};

/// Internal cause of a 5xx, carried on the response for the logging layer.
/// Never serialized unless development mode is on.
#[derive(Debug, Clone)]
pub struct ErrorDetail(pub String);

#[derive(Debug)]
pub enum ApiError {
    ValidationError {
        message: String,
        fields: Vec<FieldError>,
    },

    BadRequest(String),

    Unauthorized(String),

    Forbidden(String),

    NotFound(String),

    Conflict {
        message: String,
        details: Option<Value>,
    },

    RateLimited {
        limit: u32,
        retry_after_secs: u64,
    },

    ExternalApiError {
        service: String,
        message: String,
    },

    GatewayTimeout(String),

    InternalError(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationError { message, .. } => write!(f, "Validation error: {message}"),
            Self::BadRequest(msg) => write!(f, "Bad request: {msg}"),
            Self::Unauthorized(msg) => write!(f, "Unauthorized: {msg}"),
            Self::Forbidden(msg) => write!(f, "Forbidden: {msg}"),
            Self::NotFound(msg) => write!(f, "Not found: {msg}"),
            Self::Conflict { message, .. } => write!(f, "Conflict: {message}"),
            Self::RateLimited {
                retry_after_secs, ..
            } => write!(f, "Rate limited for {retry_after_secs}s"),
            Self::ExternalApiError { service, message } => write!(f, "{service} error: {message}"),
            Self::GatewayTimeout(msg) => write!(f, "Gateway timeout: {msg}"),
            Self::InternalError(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message, details, internal) = match self {
            Self::ValidationError { message, fields } => (
                StatusCode::BAD_REQUEST,
                message,
                serde_json::to_value(fields).ok(),
                None,
            ),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None, None),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, None, None),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg, None, None),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None, None),
            Self::Conflict { message, details } => (StatusCode::CONFLICT, message, details, None),
            Self::RateLimited {
                limit,
                retry_after_secs,
            } => {
                let body = ApiResponse::<()>::error("Too many requests, please try again later");
                let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
                let headers = response.headers_mut();
                headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
                headers.insert("ratelimit-limit", HeaderValue::from(limit));
                headers.insert("ratelimit-remaining", HeaderValue::from(0u32));
                return response;
            }
            Self::ExternalApiError { service, message } => (
                StatusCode::BAD_GATEWAY,
                format!("{service} service is unavailable"),
                None,
                Some(message),
            ),
            Self::GatewayTimeout(msg) => (
                StatusCode::GATEWAY_TIMEOUT,
                "Upstream request timed out".to_string(),
                None,
                Some(msg),
            ),
            Self::InternalError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An internal error occurred".to_string(),
                None,
                Some(msg),
            ),
        };

        let mut body = ApiResponse::<()>::error(error_message);
        body.details = details;

        let mut response = (status, Json(body)).into_response();
        if let Some(detail) = internal {
            response.extensions_mut().insert(ErrorDetail(detail));
        }
        response
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::InternalError(format!("{err:#}"))
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(err: ValidationErrors) -> Self {
        Self::ValidationError {
            message: err.to_string(),
            fields: err.into_fields(),
        }
    }
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError {
            message: msg.into(),
            fields: Vec::new(),
        }
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }
}
