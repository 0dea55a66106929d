//! Transit indicators API service.
//!
//! Serves the REST resources of a transit-indicators application: GTFS
//! feeds, boundaries, demographic data, OpenStreetMap extracts, users,
//! calculation settings, sample periods and computed indicators.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server (request id, trace, limits, timeout)
//!                         │
//!                         ▼
//!                     auth::middleware (token / session → Identity)
//!                         │
//!                         ▼
//!                     routing::UrlConf (api/ include, api-auth/, api-token-auth/, ...)
//!                         │
//!              ┌──────────┼──────────────┐
//!              ▼          ▼              ▼
//!         views (CRUD)  views::api   auth::handlers
//!              │
//!              ▼
//!         views::store (in-memory rows)
//! ```

// Core subsystems
pub mod config;
pub mod http;
pub mod routing;
pub mod views;

// Identity
pub mod auth;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::ServiceConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
