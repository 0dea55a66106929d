//! Resource handlers.
//!
//! # Data Flow
//! ```text
//! ResolverMatch (List/Detail, pk)
//!     → Action::from_route (HTTP method → action)
//!     → Permission::check (identity vs. action)
//!     → ViewSet method (list/create/retrieve/update/partial_update/destroy)
//!     → ViewResponse (status + JSON body)
//! ```
//!
//! # Design Decisions
//! - Viewsets are synchronous; stores are in-memory and lock-free
//! - Unsupported actions answer 405 with an accurate Allow header
//! - Function views (API root, version) live in `api.rs`

pub mod api;
pub mod model;
pub mod store;
pub mod users;

use std::collections::HashMap;

use axum::http::{Method, StatusCode};
use serde_json::Value;

use crate::auth::Identity;
use crate::http::response::{ApiError, ApiResult};

/// Operations a viewset can expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    List,
    Create,
    Retrieve,
    Update,
    PartialUpdate,
    Destroy,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::List,
        Action::Create,
        Action::Retrieve,
        Action::Update,
        Action::PartialUpdate,
        Action::Destroy,
    ];

    /// Map an HTTP method on a list (`detail == false`) or detail route to
    /// an action. HEAD is served as GET; OPTIONS has no action.
    pub fn from_route(method: &Method, detail: bool) -> Option<Action> {
        match (method.as_str(), detail) {
            ("GET" | "HEAD", false) => Some(Action::List),
            ("POST", false) => Some(Action::Create),
            ("GET" | "HEAD", true) => Some(Action::Retrieve),
            ("PUT", true) => Some(Action::Update),
            ("PATCH", true) => Some(Action::PartialUpdate),
            ("DELETE", true) => Some(Action::Destroy),
            _ => None,
        }
    }

    pub fn method(&self) -> Method {
        match self {
            Action::List | Action::Retrieve => Method::GET,
            Action::Create => Method::POST,
            Action::Update => Method::PUT,
            Action::PartialUpdate => Method::PATCH,
            Action::Destroy => Method::DELETE,
        }
    }

    pub fn is_detail(&self) -> bool {
        !matches!(self, Action::List | Action::Create)
    }

    /// Read-only actions.
    pub fn is_safe(&self) -> bool {
        matches!(self, Action::List | Action::Retrieve)
    }

    pub fn takes_body(&self) -> bool {
        matches!(self, Action::Create | Action::Update | Action::PartialUpdate)
    }
}

/// Access policy applied before a viewset action runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    AllowAny,
    IsAuthenticatedOrReadOnly,
    IsAuthenticated,
}

impl Permission {
    /// Anonymous callers get 401 so clients know to authenticate.
    pub fn check(&self, safe: bool, identity: Option<&Identity>) -> ApiResult<()> {
        match (self, identity) {
            (Permission::AllowAny, _) => Ok(()),
            (Permission::IsAuthenticatedOrReadOnly, _) if safe => Ok(()),
            (_, None) => Err(ApiError::NotAuthenticated),
            (_, Some(_)) => Ok(()),
        }
    }
}

/// Per-request context handed to viewset methods.
#[derive(Debug, Default)]
pub struct ViewRequest<'a> {
    pub identity: Option<&'a Identity>,
    pub query: HashMap<String, String>,
}

/// Handler grouping the list/create/retrieve/update/destroy operations for
/// one resource type.
pub trait ViewSet: Send + Sync {
    /// Name of the model served, used for the default route basename.
    fn model_name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    fn permission(&self) -> Permission {
        Permission::IsAuthenticatedOrReadOnly
    }

    fn actions(&self) -> &[Action] {
        &Action::ALL
    }

    fn list(&self, _req: &ViewRequest<'_>) -> ApiResult<Value> {
        Err(ApiError::method_not_allowed(Method::GET))
    }

    fn create(&self, _req: &ViewRequest<'_>, _data: Value) -> ApiResult<Value> {
        Err(ApiError::method_not_allowed(Method::POST))
    }

    fn retrieve(&self, _req: &ViewRequest<'_>, _pk: &str) -> ApiResult<Value> {
        Err(ApiError::method_not_allowed(Method::GET))
    }

    fn update(&self, _req: &ViewRequest<'_>, _pk: &str, _data: Value) -> ApiResult<Value> {
        Err(ApiError::method_not_allowed(Method::PUT))
    }

    fn partial_update(&self, _req: &ViewRequest<'_>, _pk: &str, _data: Value) -> ApiResult<Value> {
        Err(ApiError::method_not_allowed(Method::PATCH))
    }

    fn destroy(&self, _req: &ViewRequest<'_>, _pk: &str) -> ApiResult<()> {
        Err(ApiError::method_not_allowed(Method::DELETE))
    }
}

/// Result of a viewset action.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewResponse {
    pub status: StatusCode,
    pub body: Option<Value>,
}

/// Methods accepted on a list or detail route, in canonical order.
pub fn allowed_methods(viewset: &dyn ViewSet, detail: bool) -> Vec<Method> {
    let mut methods: Vec<Method> = Action::ALL
        .iter()
        .filter(|a| a.is_detail() == detail && viewset.actions().contains(*a))
        .map(Action::method)
        .collect();
    if methods.contains(&Method::GET) {
        methods.push(Method::HEAD);
    }
    methods.push(Method::OPTIONS);
    methods
}

/// Run one request against a viewset.
pub fn dispatch(
    viewset: &dyn ViewSet,
    method: &Method,
    detail: bool,
    pk: Option<&str>,
    req: &ViewRequest<'_>,
    data: Option<Value>,
) -> ApiResult<ViewResponse> {
    let action = Action::from_route(method, detail)
        .filter(|a| viewset.actions().contains(a))
        .ok_or_else(|| ApiError::MethodNotAllowed {
            method: method.clone(),
            allowed: allowed_methods(viewset, detail),
        })?;

    viewset.permission().check(action.is_safe(), req.identity)?;

    let data = data.unwrap_or_else(|| Value::Object(Default::default()));
    let lookup = || pk.ok_or(ApiError::NotFound);

    let (status, body) = match action {
        Action::List => (StatusCode::OK, Some(viewset.list(req)?)),
        Action::Create => (StatusCode::CREATED, Some(viewset.create(req, data)?)),
        Action::Retrieve => (StatusCode::OK, Some(viewset.retrieve(req, lookup()?)?)),
        Action::Update => (StatusCode::OK, Some(viewset.update(req, lookup()?, data)?)),
        Action::PartialUpdate => (
            StatusCode::OK,
            Some(viewset.partial_update(req, lookup()?, data)?),
        ),
        Action::Destroy => {
            viewset.destroy(req, lookup()?)?;
            (StatusCode::NO_CONTENT, None)
        }
    };

    Ok(ViewResponse { status, body })
}
