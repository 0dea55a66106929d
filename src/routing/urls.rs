//! Top-level URL configuration.
//!
//! # Responsibilities
//! - Hold the ordered list of top-level patterns
//! - Resolve a request path to an endpoint (first match wins)
//! - Reverse a route name back to a path
//! - Declare the service's route table
//!
//! # Design Decisions
//! - Includes strip their prefix and try nested patterns; on a miss the
//!   resolver falls through to the next top-level pattern
//! - Router patterns are anchored; top-level auth/version entries match by prefix
//! - Immutable after construction (thread-safe without locks)

use std::sync::Arc;

use crate::auth::AuthState;
use crate::routing::matcher::{LiteralMatcher, Matcher, PrefixMatcher};
use crate::routing::router::{DefaultRouter, Registration, RouterError};
use crate::views::model::ModelViewSet;
use crate::views::store::ResourceStore;
use crate::views::users::UserViewSet;
use crate::views::Permission;

/// What a resolved path dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Index of every registered collection.
    ApiRoot,
    /// Collection route of the registration at this index.
    List { registration: usize },
    /// Object route of the registration at this index.
    Detail { registration: usize },
    /// Session login.
    Login,
    /// Session logout.
    Logout,
    /// Token issuance.
    ObtainToken,
    /// Service and indicator version info.
    IndicatorsVersion,
}

/// A node in the URL configuration tree.
#[derive(Debug)]
pub enum UrlPattern {
    Route {
        matcher: Box<dyn Matcher>,
        name: String,
        endpoint: Endpoint,
    },
    Include {
        prefix: PrefixMatcher,
        namespace: Option<String>,
        patterns: Vec<UrlPattern>,
    },
}

impl UrlPattern {
    pub fn route(matcher: impl Matcher + 'static, name: &str, endpoint: Endpoint) -> Self {
        UrlPattern::Route {
            matcher: Box::new(matcher),
            name: name.to_string(),
            endpoint,
        }
    }

    pub fn include(prefix: &str, namespace: Option<&str>, patterns: Vec<UrlPattern>) -> Self {
        UrlPattern::Include {
            prefix: PrefixMatcher::new(prefix),
            namespace: namespace.map(str::to_string),
            patterns,
        }
    }

    /// Route name, for leaf patterns.
    pub fn name(&self) -> Option<&str> {
        match self {
            UrlPattern::Route { name, .. } => Some(name),
            UrlPattern::Include { .. } => None,
        }
    }

    fn resolve(&self, path: &str) -> Option<ResolverMatch> {
        match self {
            UrlPattern::Route {
                matcher,
                name,
                endpoint,
            } => matcher.matches(path).map(|captures| ResolverMatch {
                route_name: name.clone(),
                endpoint: *endpoint,
                pk: captures.pk,
                format: captures.format,
            }),
            UrlPattern::Include {
                prefix,
                namespace,
                patterns,
            } => {
                let rest = path.strip_prefix(prefix.prefix())?;
                let mut matched = patterns.iter().find_map(|p| p.resolve(rest))?;
                if let Some(ns) = namespace {
                    matched.route_name = format!("{}:{}", ns, matched.route_name);
                }
                Some(matched)
            }
        }
    }

    fn reverse(&self, name: &str, pk: Option<&str>) -> Option<String> {
        match self {
            UrlPattern::Route {
                matcher,
                name: own,
                ..
            } => (own == name).then(|| matcher.reverse(pk)).flatten(),
            UrlPattern::Include {
                prefix,
                namespace,
                patterns,
            } => {
                let local = match namespace {
                    Some(ns) => name.strip_prefix(ns.as_str())?.strip_prefix(':')?,
                    None => name,
                };
                patterns
                    .iter()
                    .find_map(|p| p.reverse(local, pk))
                    .map(|tail| format!("{}{}", prefix.prefix(), tail))
            }
        }
    }

    fn collect_routes(&self, base: &str, namespace: Option<&str>, out: &mut Vec<RouteInfo>) {
        match self {
            UrlPattern::Route {
                matcher,
                name,
                endpoint,
            } => out.push(RouteInfo {
                pattern: format!("/{}{}", base, matcher.describe()),
                name: match namespace {
                    Some(ns) => format!("{}:{}", ns, name),
                    None => name.clone(),
                },
                endpoint: *endpoint,
            }),
            UrlPattern::Include {
                prefix,
                namespace: own,
                patterns,
            } => {
                let base = format!("{}{}", base, prefix.prefix());
                let namespace = own.as_deref().or(namespace);
                for pattern in patterns {
                    pattern.collect_routes(&base, namespace, out);
                }
            }
        }
    }
}

/// Result of resolving a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverMatch {
    /// Fully-qualified route name (`gtfsfeed-list`, `rest_framework:login`).
    pub route_name: String,
    pub endpoint: Endpoint,
    pub pk: Option<String>,
    pub format: Option<String>,
}

/// One row of the flattened route table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteInfo {
    pub pattern: String,
    pub name: String,
    pub endpoint: Endpoint,
}

/// The service's URL configuration.
#[derive(Debug)]
pub struct UrlConf {
    patterns: Vec<UrlPattern>,
    router: DefaultRouter,
}

impl UrlConf {
    /// Build the top-level patterns around a populated router.
    ///
    /// Order matters: `api/` is tried first, so `api/indicators_version/`
    /// is only reached once no collection route claims the path.
    pub fn new(router: DefaultRouter) -> Self {
        let patterns = vec![
            UrlPattern::include("api/", None, router.urls()),
            UrlPattern::include(
                "api-auth/",
                Some("rest_framework"),
                vec![
                    UrlPattern::route(LiteralMatcher::new("login/"), "login", Endpoint::Login),
                    UrlPattern::route(LiteralMatcher::new("logout/"), "logout", Endpoint::Logout),
                ],
            ),
            UrlPattern::route(
                PrefixMatcher::new("api-token-auth/"),
                "api-token-auth",
                Endpoint::ObtainToken,
            ),
            UrlPattern::route(
                PrefixMatcher::new("api/indicators_version/"),
                "indicators-version",
                Endpoint::IndicatorsVersion,
            ),
        ];
        Self { patterns, router }
    }

    /// Resolve an absolute request path.
    pub fn resolve(&self, path: &str) -> Option<ResolverMatch> {
        let path = path.strip_prefix('/')?;
        self.patterns.iter().find_map(|p| p.resolve(path))
    }

    /// Build the absolute path for a route name.
    pub fn reverse(&self, name: &str, pk: Option<&str>) -> Option<String> {
        self.patterns
            .iter()
            .find_map(|p| p.reverse(name, pk))
            .map(|path| format!("/{}", path))
    }

    pub fn router(&self) -> &DefaultRouter {
        &self.router
    }

    pub fn registration(&self, index: usize) -> Option<&Registration> {
        self.router.registration(index)
    }

    /// Flattened route table, in resolution order.
    pub fn routes(&self) -> Vec<RouteInfo> {
        let mut out = Vec::new();
        for pattern in &self.patterns {
            pattern.collect_routes("", None, &mut out);
        }
        out
    }
}

/// Shared state backing the registered resources.
#[derive(Debug, Clone)]
pub struct DataStores {
    pub auth: Arc<AuthState>,
    pub indicators: Arc<ResourceStore>,
}

impl DataStores {
    pub fn new(auth: Arc<AuthState>) -> Self {
        Self {
            auth,
            indicators: Arc::new(ResourceStore::new()),
        }
    }
}

fn collection(model: &'static str) -> ModelViewSet {
    ModelViewSet::new(model, Arc::new(ResourceStore::new()))
}

/// Register every resource collection of the service.
pub fn api_router(stores: &DataStores) -> Result<DefaultRouter, RouterError> {
    let mut router = DefaultRouter::new();

    router.register(
        "gtfs-feeds",
        Arc::new(
            collection("GTFSFeed")
                .describe("Uploaded GTFS feeds.")
                .required(&["source_file"])
                .filter_on(&["is_valid", "is_processed"]),
        ),
        None,
    )?;
    router.register(
        "gtfs-feed-problems",
        Arc::new(
            collection("GTFSFeedProblem")
                .required(&["gtfsfeed", "description"])
                .filter_on(&["gtfsfeed", "problem_type"]),
        ),
        None,
    )?;
    router.register(
        "boundaries",
        Arc::new(
            collection("Boundary")
                .describe("City and regional boundary shapefiles.")
                .required(&["source_file"])
                .filter_on(&["is_valid", "is_processed"]),
        ),
        None,
    )?;
    router.register(
        "boundary-problems",
        Arc::new(
            collection("BoundaryProblem")
                .required(&["boundary", "description"])
                .filter_on(&["boundary", "problem_type"]),
        ),
        None,
    )?;
    router.register(
        "demographics",
        Arc::new(
            collection("DemographicDataSource")
                .describe("Demographic data shapefiles.")
                .required(&["source_file"])
                .filter_on(&["is_valid", "is_loaded"]),
        ),
        None,
    )?;
    router.register(
        "demographics-features",
        Arc::new(
            collection("DemographicDataFeature")
                .required(&["datasource"])
                .filter_on(&["datasource"]),
        ),
        None,
    )?;
    router.register(
        "demographics-problems",
        Arc::new(
            collection("DemographicDataSourceProblem")
                .required(&["datasource", "description"])
                .filter_on(&["datasource", "problem_type"]),
        ),
        None,
    )?;
    router.register(
        "osm-data",
        Arc::new(
            collection("OSMData")
                .describe("OpenStreetMap extracts.")
                .filter_on(&["gtfsfeed", "is_valid", "is_processed"]),
        ),
        Some("osm-data"),
    )?;
    router.register(
        "osm-data-problems",
        Arc::new(
            collection("OSMDataProblem")
                .required(&["osmdata", "description"])
                .filter_on(&["osmdata", "problem_type"]),
        ),
        Some("osm-data-problems"),
    )?;
    router.register(
        "users",
        Arc::new(UserViewSet::new(stores.auth.clone())),
        Some("users"),
    )?;
    router.register(
        "config",
        Arc::new(
            collection("OTIIndicatorsConfig")
                .describe("Indicator calculation settings.")
                .with_permission(Permission::IsAuthenticated),
        ),
        Some("config"),
    )?;
    router.register(
        "config-demographic",
        Arc::new(
            collection("OTIDemographicConfig")
                .required(&["datasource"])
                .with_permission(Permission::IsAuthenticated),
        ),
        None,
    )?;
    router.register(
        "sample-periods",
        Arc::new(
            collection("SamplePeriod")
                .required(&["type", "period_start", "period_end"])
                .filter_on(&["type"]),
        ),
        Some("sample-periods"),
    )?;
    router.register(
        "indicators",
        Arc::new(
            ModelViewSet::new("Indicator", stores.indicators.clone())
                .describe("Computed transit indicators.")
                .required(&["type", "sample_period", "aggregation", "value"])
                .filter_on(&[
                    "type",
                    "sample_period",
                    "aggregation",
                    "version",
                    "route_id",
                    "route_type",
                    "city_bounded",
                ]),
        ),
        None,
    )?;

    Ok(router)
}

/// The complete URL configuration of the service.
pub fn urlpatterns(stores: &DataStores) -> Result<UrlConf, RouterError> {
    Ok(UrlConf::new(api_router(stores)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::users::UserStore;
    use crate::config::AuthConfig;

    fn urls() -> UrlConf {
        let auth = AuthState::from_config(&AuthConfig::default(), Arc::new(UserStore::new())).unwrap();
        urlpatterns(&DataStores::new(Arc::new(auth))).unwrap()
    }

    fn name_of(conf: &UrlConf, path: &str) -> Option<String> {
        conf.resolve(path).map(|m| m.route_name)
    }

    #[test]
    fn test_every_prefix_resolves_to_its_own_route() {
        let conf = urls();
        let table = [
            ("/api/gtfs-feeds/", "gtfsfeed-list"),
            ("/api/gtfs-feed-problems/", "gtfsfeedproblem-list"),
            ("/api/boundaries/", "boundary-list"),
            ("/api/boundary-problems/", "boundaryproblem-list"),
            ("/api/demographics/", "demographicdatasource-list"),
            ("/api/demographics-features/", "demographicdatafeature-list"),
            ("/api/demographics-problems/", "demographicdatasourceproblem-list"),
            ("/api/osm-data/", "osm-data-list"),
            ("/api/osm-data-problems/", "osm-data-problems-list"),
            ("/api/users/", "users-list"),
            ("/api/config/", "config-list"),
            ("/api/config-demographic/", "otidemographicconfig-list"),
            ("/api/sample-periods/", "sample-periods-list"),
            ("/api/indicators/", "indicator-list"),
            ("/api-auth/login/", "rest_framework:login"),
            ("/api-auth/logout/", "rest_framework:logout"),
            ("/api-token-auth/", "api-token-auth"),
            ("/api/indicators_version/", "indicators-version"),
            ("/api/", "api-root"),
        ];
        for (path, expected) in table {
            assert_eq!(name_of(&conf, path).as_deref(), Some(expected), "path {path}");
        }
    }

    #[test]
    fn test_detail_routes() {
        let conf = urls();
        let matched = conf.resolve("/api/osm-data-problems/12/").unwrap();
        assert_eq!(matched.route_name, "osm-data-problems-detail");
        assert_eq!(matched.pk.as_deref(), Some("12"));

        let matched = conf.resolve("/api/config-demographic/3.json").unwrap();
        assert_eq!(matched.route_name, "otidemographicconfig-detail");
        assert_eq!(matched.format.as_deref(), Some("json"));
    }

    #[test]
    fn test_unregistered_paths_do_not_resolve() {
        let conf = urls();
        for path in [
            "/",
            "/api",
            "/api/unknown/",
            "/api/gtfs-feeds",
            "/api/gtfs-feeds/1/extra/",
            "/api-auth/",
            "/api-auth/password/",
            "/apiary/",
            "gtfs-feeds/",
        ] {
            assert!(conf.resolve(path).is_none(), "path {path} should not resolve");
        }
    }

    #[test]
    fn test_prefix_entries_match_any_suffix() {
        let conf = urls();
        assert_eq!(
            name_of(&conf, "/api/indicators_version/latest").as_deref(),
            Some("indicators-version")
        );
        assert_eq!(name_of(&conf, "/api-token-auth/x").as_deref(), Some("api-token-auth"));
    }

    #[test]
    fn test_reverse() {
        let conf = urls();
        assert_eq!(conf.reverse("api-root", None).as_deref(), Some("/api/"));
        assert_eq!(
            conf.reverse("boundary-detail", Some("5")).as_deref(),
            Some("/api/boundaries/5/")
        );
        assert_eq!(
            conf.reverse("rest_framework:logout", None).as_deref(),
            Some("/api-auth/logout/")
        );
        assert_eq!(conf.reverse("logout", None), None);
        assert_eq!(conf.reverse("missing", None), None);
    }

    #[test]
    fn test_route_table_lists_every_pattern() {
        let conf = urls();
        let routes = conf.routes();
        // root + 14 collections * 2 + login/logout + token + version
        assert_eq!(routes.len(), 1 + 28 + 2 + 2);
        assert_eq!(routes[0].pattern, "/api/");
        assert!(routes
            .iter()
            .any(|r| r.pattern == "/api/users/{pk}/" && r.name == "users-detail"));
        assert_eq!(routes.last().unwrap().pattern, "/api/indicators_version/*");
    }
}
