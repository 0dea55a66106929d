//! Authentication subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request
//!     → middleware.rs (Authorization: Token / session cookie → Identity)
//!     → request extensions carry Option<Identity>
//!     → views check Permission against the identity
//!
//! Credential endpoints (handlers.rs):
//!     /api-auth/login/, /api-auth/logout/  → sessions (tokens.rs)
//!     /api-token-auth/                     → API tokens (tokens.rs)
//! ```
//!
//! # Design Decisions
//! - Passwords are only ever stored as Argon2 hashes
//! - A malformed or unknown token is rejected outright; a stale session
//!   cookie is treated as anonymous
//! - Credential endpoints are rate limited per client address

pub mod handlers;
pub mod middleware;
pub mod password;
pub mod tokens;
pub mod users;

use axum::http::{header, HeaderMap};
use thiserror::Error;

use std::sync::Arc;
use std::time::Duration;

use crate::config::AuthConfig;
use crate::http::response::ApiError;
use crate::security::rate_limit::RateLimiter;

use self::tokens::{SessionStore, TokenStore};
use self::users::{NewUser, User, UserStore};

/// Errors raised by account and credential management.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("a user with username '{0}' already exists")]
    DuplicateUsername(String),

    #[error("username must not be blank")]
    EmptyUsername,
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::DuplicateUsername(_) => {
                ApiError::field("username", "A user with that username already exists.")
            }
            AuthError::EmptyUsername => ApiError::field("username", "This field may not be blank."),
            AuthError::Hash(cause) => ApiError::Internal(cause),
        }
    }
}

/// How a request proved who it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    Token,
    Session,
}

/// The authenticated caller, attached to request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: u64,
    pub username: String,
    pub is_staff: bool,
    pub scheme: AuthScheme,
}

impl Identity {
    pub fn from_user(user: &User, scheme: AuthScheme) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            is_staff: user.is_staff,
            scheme,
        }
    }
}

/// Accounts, credentials and limits shared by the auth endpoints.
#[derive(Debug)]
pub struct AuthState {
    pub users: Arc<UserStore>,
    pub tokens: TokenStore,
    pub sessions: SessionStore,
    pub cookie_name: String,
    pub limiter: RateLimiter,
}

impl AuthState {
    /// Build the auth state and create the bootstrap administrator, if a
    /// password for it is configured.
    pub fn from_config(config: &AuthConfig, users: Arc<UserStore>) -> Result<Self, AuthError> {
        if !config.admin_password.is_empty()
            && users.find_by_username(&config.admin_username).is_none()
        {
            users.create(NewUser {
                username: config.admin_username.clone(),
                password: config.admin_password.clone(),
                is_staff: true,
                ..Default::default()
            })?;
        }

        Ok(Self {
            users,
            tokens: TokenStore::new(),
            sessions: SessionStore::new(Duration::from_secs(config.session_age_secs)),
            cookie_name: config.session_cookie.clone(),
            limiter: RateLimiter::new(config.requests_per_second, config.burst_size),
        })
    }

    /// Resolve request credentials to an identity.
    ///
    /// Returns `Ok(None)` for anonymous requests.
    pub fn identify(&self, headers: &HeaderMap) -> Result<Option<Identity>, ApiError> {
        if let Some(value) = headers.get(header::AUTHORIZATION) {
            let value = value.to_str().map_err(|_| ApiError::InvalidToken)?;
            let mut parts = value.split_whitespace();
            if parts
                .next()
                .is_some_and(|scheme| scheme.eq_ignore_ascii_case("token"))
            {
                let (Some(key), None) = (parts.next(), parts.next()) else {
                    return Err(ApiError::InvalidToken);
                };
                return self
                    .tokens
                    .lookup(key)
                    .and_then(|id| self.users.get(id))
                    .filter(|user| user.is_active)
                    .map(|user| Some(Identity::from_user(&user, AuthScheme::Token)))
                    .ok_or(ApiError::InvalidToken);
            }
        }

        Ok(self
            .session_key(headers)
            .and_then(|key| self.sessions.lookup(&key))
            .and_then(|id| self.users.get(id))
            .filter(|user| user.is_active)
            .map(|user| Identity::from_user(&user, AuthScheme::Session)))
    }

    /// Value of the session cookie, if present.
    pub fn session_key(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|cookies| cookies.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == self.cookie_name)
            .map(|(_, value)| value.to_string())
    }

    /// Drop every credential belonging to a deleted user.
    pub fn forget_user(&self, user_id: u64) {
        self.tokens.revoke_user(user_id);
        self.sessions.remove_user(user_id);
    }
}
