//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with a single catch-all handler
//! - Wire up middleware (tracing, limits, request ID, authentication)
//! - Bind server to listener and drain on shutdown
//! - Dispatch requests through the URL configuration
//! - Observability (metrics, correlation IDs)

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, Method, Request, StatusCode},
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::auth::handlers as auth_views;
use crate::auth::middleware::authenticate;
use crate::auth::users::UserStore;
use crate::auth::{AuthError, AuthState, Identity};
use crate::config::ServiceConfig;
use crate::http::request;
use crate::http::response::{options_response, ApiError, ApiResult};
use crate::observability::metrics;
use crate::routing::router::RouterError;
use crate::routing::{urlpatterns, DataStores, Endpoint, ResolverMatch, UrlConf};
use crate::security;
use crate::views::{self, api, store::ResourceStore, ViewRequest};

/// Errors raised while assembling the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to initialize authentication: {0}")]
    Auth(#[from] AuthError),

    #[error("invalid route table: {0}")]
    Routes(#[from] RouterError),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub urls: Arc<UrlConf>,
    pub auth: Arc<AuthState>,
    pub indicators: Arc<ResourceStore>,
    pub default_version: Option<String>,
    pub public_url: Option<String>,
    pub max_body_size: usize,
}

/// HTTP server for the indicators API.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ServiceConfig) -> Result<Self, ServerError> {
        let users = Arc::new(UserStore::new());
        let auth = Arc::new(AuthState::from_config(&config.auth, users)?);
        let stores = DataStores::new(auth.clone());
        let urls = Arc::new(urlpatterns(&stores)?);

        tracing::info!(routes = urls.routes().len(), "URL configuration built");

        let state = AppState {
            urls,
            auth,
            indicators: stores.indicators,
            default_version: config.indicators.default_version.clone(),
            public_url: config.listener.public_url.clone(),
            max_body_size: config.security.max_body_size,
        };

        let router = Self::build_router(&config, state);
        Ok(Self { router })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServiceConfig, state: AppState) -> Router {
        let router = Router::new()
            .route("/", any(dispatch))
            .route("/{*path}", any(dispatch))
            .layer(from_fn_with_state(state.auth.clone(), authenticate))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(request::propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(request::set_request_id_layer());

        if config.security.enable_headers {
            security::headers::apply(router)
        } else {
            router
        }
    }

    /// The fully layered router, for in-process serving.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Catch-all handler: resolve the path and run its endpoint.
async fn dispatch(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let method = request.method().clone();
    let path = request::decode_path(request.uri().path()).into_owned();
    let request_id = request::request_id(request.headers()).to_string();

    let (route, response) = match state.urls.resolve(&path) {
        Some(matched) => {
            let route = matched.route_name.clone();
            let response = handle(&state, matched, request)
                .await
                .unwrap_or_else(IntoResponse::into_response);
            (route, response)
        }
        None => ("none".to_string(), unresolved(&state, &path, request)),
    };

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        route = %route,
        status = response.status().as_u16(),
        "Request handled"
    );
    metrics::record_request(method.as_str(), response.status().as_u16(), &route, start_time);
    response
}

/// Redirect GET/HEAD to the slash-terminated path when that one resolves.
///
/// `path` is the decoded request path; the redirect keeps the raw one.
fn unresolved(state: &AppState, path: &str, request: Request<Body>) -> Response {
    let uri = request.uri();
    let safe = matches!(*request.method(), Method::GET | Method::HEAD);

    if safe && !path.ends_with('/') && state.urls.resolve(&format!("{}/", path)).is_some() {
        let with_slash = format!("{}/", uri.path());
        let location = match uri.query() {
            Some(query) => format!("{}?{}", with_slash, query),
            None => with_slash,
        };
        if let Ok(value) = HeaderValue::from_str(&location) {
            return (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, value)]).into_response();
        }
    }

    tracing::debug!(path = %path, "No route matched");
    ApiError::NotFound.into_response()
}

async fn handle(state: &AppState, matched: ResolverMatch, request: Request<Body>) -> ApiResult<Response> {
    if matched.format.as_deref().is_some_and(|f| f != "json") {
        return Err(ApiError::NotFound);
    }

    let (parts, body) = request.into_parts();
    let identity = parts.extensions.get::<Identity>().cloned();
    let method = parts.method.clone();

    match matched.endpoint {
        Endpoint::ApiRoot => {
            if let Some(response) = function_view(
                &method,
                "Api Root",
                "The default basic root view for DefaultRouter",
                &[Method::GET, Method::HEAD, Method::OPTIONS],
            )? {
                return Ok(response);
            }
            let base = base_url(state, &parts.headers);
            Ok(Json(api::api_root(&state.urls, &base)).into_response())
        }
        Endpoint::IndicatorsVersion => {
            if let Some(response) = function_view(
                &method,
                "Indicators Version",
                "Current indicator calculation version.",
                &[Method::GET, Method::HEAD, Method::OPTIONS],
            )? {
                return Ok(response);
            }
            let info = api::indicators_version(&state.indicators, state.default_version.as_deref());
            Ok(Json(info).into_response())
        }
        Endpoint::List { registration } | Endpoint::Detail { registration } => {
            let detail = matches!(matched.endpoint, Endpoint::Detail { .. });
            resource(state, registration, detail, matched.pk.as_deref(), identity.as_ref(), parts, body).await
        }
        Endpoint::Login => {
            if let Some(response) = function_view(
                &method,
                "Login",
                "Start a browsable-API session.",
                &[Method::POST, Method::OPTIONS],
            )? {
                return Ok(response);
            }
            let data = read_body(state, &parts.headers, body).await?;
            auth_views::login(&state.auth, &client_address(&parts), data.as_ref())
        }
        Endpoint::Logout => {
            if let Some(response) = function_view(
                &method,
                "Logout",
                "End the current session.",
                &[Method::GET, Method::POST, Method::OPTIONS],
            )? {
                return Ok(response);
            }
            let session = state.auth.session_key(&parts.headers);
            auth_views::logout(&state.auth, session.as_deref(), identity.as_ref())
        }
        Endpoint::ObtainToken => {
            if let Some(response) = function_view(
                &method,
                "Obtain Auth Token",
                "Exchange a username and password for an API token.",
                &[Method::POST, Method::OPTIONS],
            )? {
                return Ok(response);
            }
            let data = read_body(state, &parts.headers, body).await?;
            auth_views::obtain_token(&state.auth, &client_address(&parts), data.as_ref())
        }
    }
}

/// Method gate for function views.
///
/// Returns the OPTIONS metadata response, `None` to proceed, or 405.
fn function_view(
    method: &Method,
    name: &str,
    description: &str,
    allowed: &[Method],
) -> ApiResult<Option<Response>> {
    if !allowed.contains(method) {
        return Err(ApiError::MethodNotAllowed {
            method: method.clone(),
            allowed: allowed.to_vec(),
        });
    }
    if *method == Method::OPTIONS {
        return Ok(Some(options_response(name, description, allowed)));
    }
    Ok(None)
}

async fn resource(
    state: &AppState,
    index: usize,
    detail: bool,
    pk: Option<&str>,
    identity: Option<&Identity>,
    parts: Parts,
    body: Body,
) -> ApiResult<Response> {
    let registration = state
        .urls
        .registration(index)
        .ok_or_else(|| ApiError::Internal(format!("no registration at index {}", index)))?;
    let viewset = registration.viewset.as_ref();

    if parts.method == Method::OPTIONS {
        let suffix = if detail { "Instance" } else { "List" };
        let name = format!("{} {}", viewset.model_name(), suffix);
        let allowed = views::allowed_methods(viewset, detail);
        return Ok(options_response(&name, viewset.description(), &allowed));
    }

    let data = match parts.method {
        Method::POST | Method::PUT | Method::PATCH => read_body(state, &parts.headers, body).await?,
        _ => None,
    };
    let req = ViewRequest {
        identity,
        query: request::parse_query(parts.uri.query()),
    };

    let result = views::dispatch(viewset, &parts.method, detail, pk, &req, data)?;
    let location = (result.status == StatusCode::CREATED)
        .then(|| created_id(result.body.as_ref()))
        .flatten()
        .and_then(|id| state.urls.reverse(&registration.detail_name(), Some(&id)));

    let mut response = result.into_response();
    if let Some(value) = location.and_then(|l| HeaderValue::from_str(&l).ok()) {
        response.headers_mut().insert(header::LOCATION, value);
    }
    Ok(response)
}

fn created_id(body: Option<&serde_json::Value>) -> Option<String> {
    match body?.get("id")? {
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

async fn read_body(
    state: &AppState,
    headers: &HeaderMap,
    body: Body,
) -> ApiResult<Option<serde_json::Value>> {
    request::read_body(headers, body, state.max_body_size).await
}

/// Scheme and authority used when rendering absolute links.
fn base_url(state: &AppState, headers: &HeaderMap) -> String {
    if let Some(url) = &state.public_url {
        return url.trim_end_matches('/').to_string();
    }
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    format!("http://{}", host)
}

fn client_address(parts: &Parts) -> String {
    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
