//! Response handling and error mapping.
//!
//! # Responsibilities
//! - Map handler errors to HTTP status codes and JSON bodies
//! - Add protocol headers (Allow, WWW-Authenticate) where required
//! - Render viewset results as JSON responses
//!
//! # Design Decisions
//! - Error bodies are either `{"detail": "..."}` or a field → messages map
//! - 401 always carries `WWW-Authenticate: Token`

use std::collections::BTreeMap;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::views::ViewResponse;

/// Validation messages keyed by field name.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

pub type ApiResult<T> = Result<T, ApiError>;

/// Errors surfaced to API clients.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found.")]
    NotFound,

    #[error("Method \"{method}\" not allowed.")]
    MethodNotAllowed { method: Method, allowed: Vec<Method> },

    #[error("Authentication credentials were not provided.")]
    NotAuthenticated,

    #[error("Invalid token.")]
    InvalidToken,

    #[error("You do not have permission to perform this action.")]
    PermissionDenied,

    #[error("JSON parse error - {0}")]
    Parse(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Unsupported media type \"{0}\" in request.")]
    UnsupportedMediaType(String),

    #[error("Request body too large.")]
    PayloadTooLarge,

    #[error("Invalid input.")]
    Validation(FieldErrors),

    #[error("Request was throttled.")]
    Throttled,

    #[error("A server error occurred.")]
    Internal(String),
}

impl ApiError {
    pub fn method_not_allowed(method: Method) -> Self {
        ApiError::MethodNotAllowed {
            method,
            allowed: Vec::new(),
        }
    }

    /// Single-field validation error.
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![message.into()]);
        ApiError::Validation(errors)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::NotAuthenticated | ApiError::InvalidToken => StatusCode::UNAUTHORIZED,
            ApiError::PermissionDenied => StatusCode::FORBIDDEN,
            ApiError::Parse(_) | ApiError::BadRequest(_) | ApiError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Throttled => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Validation(errors) => json!(errors),
            ApiError::Internal(cause) => {
                tracing::error!(error = %cause, "Request failed");
                json!({ "detail": self.to_string() })
            }
            _ => json!({ "detail": self.to_string() }),
        };

        let mut response = (status, Json(body)).into_response();
        match &self {
            ApiError::MethodNotAllowed { allowed, .. } if !allowed.is_empty() => {
                if let Ok(value) = HeaderValue::from_str(&allow_header(allowed)) {
                    response.headers_mut().insert(header::ALLOW, value);
                }
            }
            ApiError::NotAuthenticated | ApiError::InvalidToken => {
                response.headers_mut().insert(
                    header::WWW_AUTHENTICATE,
                    HeaderValue::from_static("Token"),
                );
            }
            _ => {}
        }
        response
    }
}

/// Comma-separated method list for the Allow header.
pub fn allow_header(methods: &[Method]) -> String {
    methods
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

impl IntoResponse for ViewResponse {
    fn into_response(self) -> Response {
        match self.body {
            Some(body) => (self.status, Json(body)).into_response(),
            None => self.status.into_response(),
        }
    }
}

/// Response for an OPTIONS request describing a view.
pub fn options_response(name: &str, description: &str, allowed: &[Method]) -> Response {
    let body: Value = json!({
        "name": name,
        "description": description,
        "renders": ["application/json"],
        "parses": ["application/json", "application/x-www-form-urlencoded"],
        "allowed_methods": allowed.iter().map(Method::as_str).collect::<Vec<_>>(),
    });
    let mut response = Json(body).into_response();
    if let Ok(value) = HeaderValue::from_str(&allow_header(allowed)) {
        response.headers_mut().insert(header::ALLOW, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_not_found_body() {
        let response = ApiError::NotFound.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await, json!({ "detail": "Not found." }));
    }

    #[tokio::test]
    async fn test_method_not_allowed_sets_allow() {
        let response = ApiError::MethodNotAllowed {
            method: Method::DELETE,
            allowed: vec![Method::GET, Method::POST, Method::HEAD, Method::OPTIONS],
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            response.headers().get(header::ALLOW).unwrap(),
            "GET, POST, HEAD, OPTIONS"
        );
        assert_eq!(
            body_json(response).await,
            json!({ "detail": "Method \"DELETE\" not allowed." })
        );
    }

    #[tokio::test]
    async fn test_unauthenticated_challenge() {
        let response = ApiError::NotAuthenticated.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers().get(header::WWW_AUTHENTICATE).unwrap(), "Token");
    }

    #[tokio::test]
    async fn test_validation_body_is_field_map() {
        let response = ApiError::field("username", "This field is required.").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({ "username": ["This field is required."] })
        );
    }
}
