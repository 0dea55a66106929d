//! Route matching logic.
//!
//! # Responsibilities
//! - Match literal paths (exact or prefix)
//! - Match collection paths (`{prefix}/`) and detail paths (`{prefix}/{pk}/`)
//! - Recognise format suffixes (`{prefix}.json`, `{prefix}/{pk}.json`)
//!
//! # Design Decisions
//! - Paths are matched relative to the enclosing include, without a leading slash
//! - Path matching is case-sensitive
//! - Lookup values are one segment and never contain `/` or `.`
//! - No regex to guarantee O(n) matching

/// Values captured while matching a path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captures {
    /// Object lookup (`pk`) for detail routes.
    pub pk: Option<String>,
    /// Requested format suffix (`json` in `/api/boundaries.json`).
    pub format: Option<String>,
}

/// Trait for matching a request path against a pattern.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns the captures if the path matches this pattern.
    fn matches(&self, path: &str) -> Option<Captures>;

    /// Rebuilds the path this pattern matches for the given lookup.
    fn reverse(&self, pk: Option<&str>) -> Option<String>;

    /// Human-readable pattern, used in route listings.
    fn describe(&self) -> String;
}

/// Matches the whole path exactly.
#[derive(Debug, Clone)]
pub struct LiteralMatcher {
    literal: String,
}

impl LiteralMatcher {
    pub fn new(literal: impl Into<String>) -> Self {
        Self {
            literal: literal.into(),
        }
    }
}

impl Matcher for LiteralMatcher {
    fn matches(&self, path: &str) -> Option<Captures> {
        (path == self.literal).then(Captures::default)
    }

    fn reverse(&self, pk: Option<&str>) -> Option<String> {
        pk.is_none().then(|| self.literal.clone())
    }

    fn describe(&self) -> String {
        self.literal.clone()
    }
}

/// Matches any path starting with the prefix.
#[derive(Debug, Clone)]
pub struct PrefixMatcher {
    prefix: String,
}

impl PrefixMatcher {
    /// Create a new path prefix matcher.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl Matcher for PrefixMatcher {
    fn matches(&self, path: &str) -> Option<Captures> {
        path.starts_with(&self.prefix).then(Captures::default)
    }

    fn reverse(&self, pk: Option<&str>) -> Option<String> {
        pk.is_none().then(|| self.prefix.clone())
    }

    fn describe(&self) -> String {
        format!("{}*", self.prefix)
    }
}

/// Matches a collection path: `{prefix}/`, or `{prefix}.{format}` with an
/// optional trailing slash. An empty prefix matches the include root.
#[derive(Debug, Clone)]
pub struct ListMatcher {
    prefix: String,
}

impl ListMatcher {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Matcher for ListMatcher {
    fn matches(&self, path: &str) -> Option<Captures> {
        let rest = path.strip_prefix(self.prefix.as_str())?;
        let plain = if self.prefix.is_empty() { "" } else { "/" };
        if rest == plain {
            return Some(Captures::default());
        }
        parse_format_suffix(rest).map(|format| Captures {
            pk: None,
            format: Some(format.to_string()),
        })
    }

    fn reverse(&self, pk: Option<&str>) -> Option<String> {
        if pk.is_some() {
            return None;
        }
        if self.prefix.is_empty() {
            Some(String::new())
        } else {
            Some(format!("{}/", self.prefix))
        }
    }

    fn describe(&self) -> String {
        self.reverse(None).unwrap_or_default()
    }
}

/// Matches an object path: `{prefix}/{pk}/`, or `{prefix}/{pk}.{format}`
/// with an optional trailing slash.
#[derive(Debug, Clone)]
pub struct DetailMatcher {
    prefix: String,
}

impl DetailMatcher {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Matcher for DetailMatcher {
    fn matches(&self, path: &str) -> Option<Captures> {
        let rest = path
            .strip_prefix(self.prefix.as_str())?
            .strip_prefix('/')?;
        let end = rest.find(['/', '.'])?;
        let (pk, tail) = rest.split_at(end);
        if pk.is_empty() {
            return None;
        }
        let format = if tail == "/" {
            None
        } else {
            Some(parse_format_suffix(tail)?.to_string())
        };
        Some(Captures {
            pk: Some(pk.to_string()),
            format,
        })
    }

    fn reverse(&self, pk: Option<&str>) -> Option<String> {
        let pk = pk?;
        if pk.is_empty() || pk.contains(['/', '.']) {
            return None;
        }
        Some(format!("{}/{}/", self.prefix, pk))
    }

    fn describe(&self) -> String {
        format!("{}/{{pk}}/", self.prefix)
    }
}

/// Parses `.{format}` or `.{format}/`, where format is `[a-z0-9]+`.
fn parse_format_suffix(rest: &str) -> Option<&str> {
    let format = rest.strip_prefix('.')?;
    let format = format.strip_suffix('/').unwrap_or(format);
    let valid = !format.is_empty()
        && format
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit());
    valid.then_some(format)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_matcher() {
        let matcher = LiteralMatcher::new("login/");
        assert!(matcher.matches("login/").is_some());
        assert!(matcher.matches("login").is_none());
        assert!(matcher.matches("login/extra").is_none());
        assert_eq!(matcher.reverse(None).as_deref(), Some("login/"));
    }

    #[test]
    fn test_prefix_matcher() {
        let matcher = PrefixMatcher::new("api-token-auth/");
        assert!(matcher.matches("api-token-auth/").is_some());
        assert!(matcher.matches("api-token-auth/anything").is_some());
        assert!(matcher.matches("api-token-auth").is_none());
        assert!(matcher.matches("api/").is_none());
    }

    #[test]
    fn test_list_matcher() {
        let matcher = ListMatcher::new("gtfs-feeds");
        assert_eq!(matcher.matches("gtfs-feeds/"), Some(Captures::default()));
        assert!(matcher.matches("gtfs-feeds").is_none());
        assert!(matcher.matches("gtfs-feeds/1/").is_none());

        // Similar-looking collections must not shadow each other.
        assert!(matcher.matches("gtfs-feeds-problems/").is_none());
        assert!(ListMatcher::new("config").matches("config-demographic/").is_none());
        assert!(ListMatcher::new("indicators").matches("indicators_version/").is_none());
    }

    #[test]
    fn test_list_matcher_format_suffix() {
        let matcher = ListMatcher::new("boundaries");
        let captures = matcher.matches("boundaries.json").unwrap();
        assert_eq!(captures.format.as_deref(), Some("json"));
        assert!(matcher.matches("boundaries.json/").is_some());
        assert!(matcher.matches("boundaries.JSON").is_none());
        assert!(matcher.matches("boundaries.").is_none());
    }

    #[test]
    fn test_root_list_matcher() {
        let matcher = ListMatcher::new("");
        assert_eq!(matcher.matches(""), Some(Captures::default()));
        assert_eq!(matcher.matches(".json").unwrap().format.as_deref(), Some("json"));
        assert!(matcher.matches("/").is_none());
        assert_eq!(matcher.reverse(None).as_deref(), Some(""));
    }

    #[test]
    fn test_detail_matcher() {
        let matcher = DetailMatcher::new("users");

        let captures = matcher.matches("users/42/").unwrap();
        assert_eq!(captures.pk.as_deref(), Some("42"));
        assert_eq!(captures.format, None);

        let captures = matcher.matches("users/42.json").unwrap();
        assert_eq!(captures.pk.as_deref(), Some("42"));
        assert_eq!(captures.format.as_deref(), Some("json"));

        assert!(matcher.matches("users/42").is_none());
        assert!(matcher.matches("users//").is_none());
        assert!(matcher.matches("users/42/edit/").is_none());
        assert!(matcher.matches("users/").is_none());
    }

    #[test]
    fn test_detail_reverse() {
        let matcher = DetailMatcher::new("sample-periods");
        assert_eq!(matcher.reverse(Some("7")).as_deref(), Some("sample-periods/7/"));
        assert!(matcher.reverse(None).is_none());
        assert!(matcher.reverse(Some("a/b")).is_none());
    }
}
