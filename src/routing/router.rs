//! Resource registration and URL generation.
//!
//! # Responsibilities
//! - Store registered viewsets with their prefix and basename
//! - Generate the list and detail patterns for every registration
//! - Provide the API root pattern listing every collection
//!
//! # Design Decisions
//! - Registration happens at startup; the router is frozen once built
//! - Duplicate prefixes or basenames are rejected, not silently shadowed
//! - Patterns are emitted in registration order, root first

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::routing::matcher::{DetailMatcher, ListMatcher};
use crate::routing::urls::{Endpoint, UrlPattern};
use crate::views::ViewSet;

/// Name of the pattern serving the API root.
pub const API_ROOT_NAME: &str = "api-root";

/// Errors raised while registering viewsets.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    #[error("prefix '{0}' is already registered")]
    DuplicatePrefix(String),

    #[error("basename '{0}' is already registered")]
    DuplicateBasename(String),

    #[error("invalid prefix '{0}': must be non-empty and contain no '/' or '.'")]
    InvalidPrefix(String),
}

/// A viewset bound to a URL prefix.
#[derive(Clone)]
pub struct Registration {
    pub prefix: String,
    pub basename: String,
    pub viewset: Arc<dyn ViewSet>,
}

impl Registration {
    pub fn list_name(&self) -> String {
        format!("{}-list", self.basename)
    }

    pub fn detail_name(&self) -> String {
        format!("{}-detail", self.basename)
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("prefix", &self.prefix)
            .field("basename", &self.basename)
            .field("model", &self.viewset.model_name())
            .finish()
    }
}

/// Router generating list/detail routes for registered viewsets, plus an
/// API root view.
#[derive(Debug, Default)]
pub struct DefaultRouter {
    registry: Vec<Registration>,
}

impl DefaultRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a viewset under `prefix`.
    ///
    /// Without an explicit basename the viewset's lower-cased model name is
    /// used, so route names come out as `{basename}-list` and
    /// `{basename}-detail`.
    pub fn register(
        &mut self,
        prefix: &str,
        viewset: Arc<dyn ViewSet>,
        basename: Option<&str>,
    ) -> Result<(), RouterError> {
        if prefix.is_empty() || prefix.contains(['/', '.']) {
            return Err(RouterError::InvalidPrefix(prefix.to_string()));
        }
        let basename = basename
            .map(str::to_string)
            .unwrap_or_else(|| viewset.model_name().to_lowercase());

        if self.registry.iter().any(|r| r.prefix == prefix) {
            return Err(RouterError::DuplicatePrefix(prefix.to_string()));
        }
        if self.registry.iter().any(|r| r.basename == basename) {
            return Err(RouterError::DuplicateBasename(basename));
        }

        tracing::debug!(prefix, basename = %basename, "Registered viewset");
        self.registry.push(Registration {
            prefix: prefix.to_string(),
            basename,
            viewset,
        });
        Ok(())
    }

    pub fn registry(&self) -> &[Registration] {
        &self.registry
    }

    pub fn registration(&self, index: usize) -> Option<&Registration> {
        self.registry.get(index)
    }

    /// Build the URL patterns for every registration.
    pub fn urls(&self) -> Vec<UrlPattern> {
        let mut patterns = Vec::with_capacity(self.registry.len() * 2 + 1);
        patterns.push(UrlPattern::route(
            ListMatcher::new(""),
            API_ROOT_NAME,
            Endpoint::ApiRoot,
        ));

        for (index, registration) in self.registry.iter().enumerate() {
            patterns.push(UrlPattern::route(
                ListMatcher::new(&registration.prefix),
                &registration.list_name(),
                Endpoint::List { registration: index },
            ));
            patterns.push(UrlPattern::route(
                DetailMatcher::new(&registration.prefix),
                &registration.detail_name(),
                Endpoint::Detail { registration: index },
            ));
        }
        patterns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::views::model::ModelViewSet;
    use crate::views::store::ResourceStore;

    fn viewset(model: &'static str) -> Arc<dyn ViewSet> {
        Arc::new(ModelViewSet::new(model, Arc::new(ResourceStore::new())))
    }

    #[test]
    fn test_basename_defaults_to_model_name() {
        let mut router = DefaultRouter::new();
        router.register("gtfs-feeds", viewset("GTFSFeed"), None).unwrap();
        router
            .register("osm-data", viewset("OSMData"), Some("osm-data"))
            .unwrap();

        let names: Vec<_> = router.registry().iter().map(|r| r.basename.as_str()).collect();
        assert_eq!(names, vec!["gtfsfeed", "osm-data"]);
        assert_eq!(router.registry()[0].list_name(), "gtfsfeed-list");
        assert_eq!(router.registry()[1].detail_name(), "osm-data-detail");
    }

    #[test]
    fn test_duplicates_rejected() {
        let mut router = DefaultRouter::new();
        router.register("boundaries", viewset("Boundary"), None).unwrap();

        assert_eq!(
            router.register("boundaries", viewset("Other"), None),
            Err(RouterError::DuplicatePrefix("boundaries".into()))
        );
        assert_eq!(
            router.register("areas", viewset("Boundary"), None),
            Err(RouterError::DuplicateBasename("boundary".into()))
        );
    }

    #[test]
    fn test_invalid_prefix() {
        let mut router = DefaultRouter::new();
        assert!(matches!(
            router.register("a/b", viewset("A"), None),
            Err(RouterError::InvalidPrefix(_))
        ));
        assert!(matches!(
            router.register("", viewset("A"), None),
            Err(RouterError::InvalidPrefix(_))
        ));
    }

    #[test]
    fn test_urls_include_root_list_and_detail() {
        let mut router = DefaultRouter::new();
        router.register("users", viewset("User"), Some("users")).unwrap();

        let names: Vec<_> = router
            .urls()
            .iter()
            .filter_map(|p| p.name().map(str::to_string))
            .collect();
        assert_eq!(names, vec!["api-root", "users-list", "users-detail"]);
    }
}
