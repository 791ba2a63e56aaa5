use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
};
use serde::de::DeserializeOwned;

use super::ApiError;
use crate::domain::validation::Validate;

/// JSON body extractor whose rejections use the API error envelope.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(json_rejection(&rejection)),
        }
    }
}

fn json_rejection(rejection: &JsonRejection) -> ApiError {
    match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            ApiError::validation("Expected request with `Content-Type: application/json`")
        }
        JsonRejection::JsonSyntaxError(_) => ApiError::validation("Request body is not valid JSON"),
        JsonRejection::JsonDataError(err) => ApiError::validation(err.body_text()),
        other => ApiError::validation(other.body_text()),
    }
}

/// Runs a schema's validation, mapping field errors onto the API error.
pub fn validated<T: Validate>(input: T) -> Result<T::Output, ApiError> {
    input.validate().map_err(ApiError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::LoginRequest;
    use axum::body::Body;
    use axum::http::header;

    fn request(body: &'static str, content_type: Option<&str>) -> Request {
        let mut builder = Request::builder().method("POST").uri("/");
        if let Some(ct) = content_type {
            builder = builder.header(header::CONTENT_TYPE, ct);
        }
        builder.body(Body::from(body)).unwrap()
    }

    #[tokio::test]
    async fn test_accepts_json_body() {
        let req = request(
            r#"{"email":"a@b.co","password":"secret1"}"#,
            Some("application/json"),
        );
        let ApiJson(login) = ApiJson::<LoginRequest>::from_request(req, &()).await.unwrap();
        assert_eq!(login.email.as_deref(), Some("a@b.co"));
    }

    #[tokio::test]
    async fn test_rejects_malformed_body() {
        let req = request("{not json", Some("application/json"));
        let err = ApiJson::<LoginRequest>::from_request(req, &())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::ValidationError { .. }));
    }

    #[tokio::test]
    async fn test_rejects_missing_content_type() {
        let req = request("{}", None);
        let err = ApiJson::<LoginRequest>::from_request(req, &())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Content-Type"));
    }

    #[test]
    fn test_validated_maps_field_errors() {
        let err = validated(LoginRequest::default()).unwrap_err();
        let ApiError::ValidationError { fields, .. } = err else {
            panic!("expected validation error");
        };
        assert!(fields.iter().any(|f| f.field == "email"));
    }
}
