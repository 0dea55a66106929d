//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path)
//!     → urls.rs (top-level patterns, includes, first match wins)
//!     → router.rs (collection list/detail patterns)
//!     → matcher.rs (literal/prefix/list/detail evaluation)
//!     → Return: ResolverMatch or no match (404)
//!
//! Route Compilation (at startup):
//!     register(prefix, viewset, basename)
//!     → DefaultRouter::urls() (api-root, {basename}-list, {basename}-detail)
//!     → UrlConf (wrapped in api/ include + auth/version entries)
//!     → Frozen, shared behind Arc
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (literal segments and a single pk capture)
//! - Deterministic: same input always matches same route
//! - Route names are reversible into paths

pub mod matcher;
pub mod router;
pub mod urls;

pub use router::{DefaultRouter, RouterError};
pub use urls::{urlpatterns, DataStores, Endpoint, ResolverMatch, UrlConf};
