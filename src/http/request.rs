//! Request handling.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) and echo it on the response
//! - Read request bodies up to the configured size limit
//! - Decode request bodies (JSON or form-encoded) into JSON values
//! - Decode paths and query strings
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Only an exceeded length limit is reported as 413; other read failures
//!   are client errors

use std::borrow::Cow;
use std::collections::HashMap;
use std::error::Error as StdError;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName};
use http_body_util::LengthLimitError;
use percent_encoding::percent_decode_str;
use serde_json::{Map, Value};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use crate::http::response::{ApiError, ApiResult};

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Assigns `x-request-id` to requests that arrive without one.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid)
}

/// Copies the request's `x-request-id` onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(X_REQUEST_ID)
}

/// Request ID carried in the headers, or `"unknown"`.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Read the whole body, refusing anything larger than `limit` bytes.
pub async fn read_body(headers: &HeaderMap, body: Body, limit: usize) -> ApiResult<Option<Value>> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > limit) {
        return Err(ApiError::PayloadTooLarge);
    }

    let bytes = axum::body::to_bytes(body, limit).await.map_err(|e| {
        let cause = e.into_inner();
        if is_length_limit(&*cause) {
            ApiError::PayloadTooLarge
        } else {
            tracing::debug!(error = %cause, "Failed to read request body");
            ApiError::BadRequest(format!("Could not read request body: {}", cause))
        }
    })?;
    parse_body(headers, &bytes)
}

fn is_length_limit(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.is::<LengthLimitError>() {
            return true;
        }
        current = e.source();
    }
    false
}

/// Percent-decode a request path. Paths that do not decode to UTF-8 are
/// returned unchanged.
pub fn decode_path(path: &str) -> Cow<'_, str> {
    percent_decode_str(path)
        .decode_utf8()
        .unwrap_or(Cow::Borrowed(path))
}

/// Decode a request body according to its content type.
///
/// Empty bodies decode to `None`. Form bodies become a flat JSON object of
/// strings; a repeated key keeps its last value.
pub fn parse_body(headers: &HeaderMap, bytes: &[u8]) -> ApiResult<Option<Value>> {
    if bytes.is_empty() {
        return Ok(None);
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/json");
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match mime.as_str() {
        "application/json" => serde_json::from_slice(bytes)
            .map(Some)
            .map_err(|e| ApiError::Parse(e.to_string())),
        "application/x-www-form-urlencoded" => {
            let fields: Map<String, Value> = url::form_urlencoded::parse(bytes)
                .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
                .collect();
            Ok(Some(Value::Object(fields)))
        }
        _ => Err(ApiError::UnsupportedMediaType(content_type.to_string())),
    }
}

/// Decode a raw query string into key/value pairs.
pub fn parse_query(query: Option<&str>) -> HashMap<String, String> {
    query
        .map(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .into_owned()
                .collect()
        })
        .unwrap_or_default()
}
