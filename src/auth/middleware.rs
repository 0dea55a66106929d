//! Request authentication middleware.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::auth::AuthState;

/// Attach the caller's [`Identity`](crate::auth::Identity) to the request.
///
/// Anonymous requests pass through untouched; invalid tokens are rejected
/// with 401 before reaching any handler.
pub async fn authenticate(
    State(auth): State<Arc<AuthState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    match auth.identify(request.headers()) {
        Ok(Some(identity)) => {
            tracing::debug!(user = %identity.username, scheme = ?identity.scheme, "Request authenticated");
            request.extensions_mut().insert(identity);
        }
        Ok(None) => {}
        Err(err) => {
            tracing::warn!(path = %request.uri().path(), "Rejected invalid credentials");
            return err.into_response();
        }
    }
    next.run(request).await
}
