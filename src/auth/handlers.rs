//! Credential endpoints: session login/logout and token issuance.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use crate::auth::users::User;
use crate::auth::{AuthState, Identity};
use crate::http::response::{ApiError, ApiResult, FieldErrors};

const BAD_CREDENTIALS: &str = "Unable to log in with provided credentials.";

/// Username/password pair posted to the credential endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Extract credentials from a parsed request body, reporting every
    /// missing or blank field.
    pub fn from_body(body: Option<&Value>) -> ApiResult<Self> {
        let field = |name: &str| {
            body.and_then(|b| b.get(name))
                .and_then(Value::as_str)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let username = field("username");
        let password = field("password");

        let mut errors = FieldErrors::new();
        if username.is_none() {
            errors.insert("username".into(), vec!["This field is required.".into()]);
        }
        if password.is_none() {
            errors.insert("password".into(), vec!["This field is required.".into()]);
        }

        match (username, password) {
            (Some(username), Some(password)) => Ok(Self { username, password }),
            _ => Err(ApiError::Validation(errors)),
        }
    }
}

fn throttle(auth: &AuthState, client: &str) -> ApiResult<()> {
    if auth.limiter.check(client) {
        Ok(())
    } else {
        tracing::warn!(client, "Credential endpoint rate limit exceeded");
        crate::observability::metrics::record_rate_limited("auth");
        Err(ApiError::Throttled)
    }
}

fn check_credentials(auth: &AuthState, body: Option<&Value>) -> ApiResult<User> {
    let credentials = Credentials::from_body(body)?;
    auth.users
        .authenticate(&credentials.username, &credentials.password)
        .ok_or_else(|| {
            tracing::info!(username = %credentials.username, "Rejected login attempt");
            ApiError::field("non_field_errors", BAD_CREDENTIALS)
        })
}

/// `POST /api-token-auth/`: exchange credentials for the user's API token.
pub fn obtain_token(auth: &AuthState, client: &str, body: Option<&Value>) -> ApiResult<Response> {
    throttle(auth, client)?;
    let user = check_credentials(auth, body)?;
    let token = auth.tokens.get_or_create(user.id);
    tracing::info!(user_id = user.id, "Issued API token");
    Ok(Json(json!({ "token": token, "user": user.id })).into_response())
}

/// `POST /api-auth/login/`: start a session and set the session cookie.
pub fn login(auth: &AuthState, client: &str, body: Option<&Value>) -> ApiResult<Response> {
    throttle(auth, client)?;
    let user = check_credentials(auth, body)?;
    let key = auth.sessions.create(user.id);
    tracing::info!(user_id = user.id, "Session started");

    let cookie = format!(
        "{}={}; HttpOnly; Max-Age={}; Path=/; SameSite=Lax",
        auth.cookie_name,
        key,
        auth.sessions.max_age().as_secs()
    );
    let mut response = Json(json!({
        "detail": "Logged in.",
        "user": user.id,
        "username": user.username,
    }))
    .into_response();
    set_cookie(&mut response, &cookie)?;
    Ok(response)
}

/// `GET|POST /api-auth/logout/`: end the current session, if any.
pub fn logout(
    auth: &AuthState,
    session_key: Option<&str>,
    identity: Option<&Identity>,
) -> ApiResult<Response> {
    if let Some(key) = session_key {
        if auth.sessions.remove(key) {
            tracing::info!(user = ?identity.map(|i| &i.username), "Session ended");
        }
    }

    let cookie = format!("{}=; Max-Age=0; Path=/", auth.cookie_name);
    let mut response = (StatusCode::OK, Json(json!({ "detail": "Logged out." }))).into_response();
    set_cookie(&mut response, &cookie)?;
    Ok(response)
}

fn set_cookie(response: &mut Response, cookie: &str) -> ApiResult<()> {
    let value = HeaderValue::from_str(cookie).map_err(|e| ApiError::Internal(e.to_string()))?;
    response.headers_mut().insert(header::SET_COOKIE, value);
    Ok(())
}
