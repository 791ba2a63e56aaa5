use axum::{
    Extension, Json,
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::validation::{ApiJson, validated};
use super::{ApiError, ApiResponse, AppState};
use crate::domain::Role;
use crate::domain::user::{AuthSession, LoginRequest, PublicUser, RegisterRequest};
use crate::services::AuthError;

/// The user resolved from the bearer token, available to handlers behind
/// [`require_user`] or [`require_admin`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub PublicUser);

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::DuplicateIdentity => Self::Conflict {
                message: err.to_string(),
                details: None,
            },
            AuthError::InvalidCredentials => Self::Unauthorized("Invalid email or password".into()),
            AuthError::InvalidToken => Self::Unauthorized(err.to_string()),
            AuthError::Forbidden => Self::Forbidden(err.to_string()),
            AuthError::Config(msg) | AuthError::Internal(msg) => Self::InternalError(msg),
        }
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// Extract the token from an `Authorization: Bearer <token>` header.
fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<PublicUser, ApiError> {
    let token = extract_bearer(headers)
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    let user = state.auth_service().verify(token).await?;
    tracing::Span::current().record("user_id", user.id.as_str());
    Ok(user)
}

/// Rejects requests without a valid bearer token for an active user.
pub async fn require_user(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = authenticate(&state, request.headers()).await?;
    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}

/// Like [`require_user`], additionally requiring the admin role.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = authenticate(&state, request.headers()).await?;
    state.auth_service().require_role(&user, Role::Admin)?;
    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/register
/// Create an account and sign it in
pub async fn register(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let registration = validated(payload)?;
    let session = state.auth_service().register(registration).await?;

    tracing::info!(user_id = %session.user.id, "User registered");

    Ok((StatusCode::CREATED, Json(ApiResponse::success(session))))
}

/// POST /auth/login
/// Exchange email and password for a bearer token
pub async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Json<ApiResponse<AuthSession>>, ApiError> {
    let credentials = validated(payload)?;
    let session = state.auth_service().login(credentials).await?;
    Ok(Json(ApiResponse::success(session)))
}

/// GET /auth/me
pub async fn me(Extension(CurrentUser(user)): Extension<CurrentUser>) -> Json<ApiResponse<PublicUser>> {
    Json(ApiResponse::success(user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer(&headers("Bearer abc.def")), Some("abc.def"));
        assert_eq!(extract_bearer(&headers("Bearer   ")), None);
        assert_eq!(extract_bearer(&headers("Basic abc")), None);
        assert_eq!(extract_bearer(&HeaderMap::new()), None);
    }

    #[test]
    fn test_auth_error_statuses() {
        let cases = [
            (AuthError::DuplicateIdentity, StatusCode::CONFLICT),
            (AuthError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (AuthError::InvalidToken, StatusCode::UNAUTHORIZED),
            (AuthError::Forbidden, StatusCode::FORBIDDEN),
            (
                AuthError::Config("no secret".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }
}
