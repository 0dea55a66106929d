//! Function views: the API root index and version info.

use serde_json::{json, Map, Value};

use crate::routing::UrlConf;
use crate::views::store::ResourceStore;

/// Map every registered prefix to the absolute URL of its collection.
pub fn api_root(urls: &UrlConf, base_url: &str) -> Value {
    let base = base_url.trim_end_matches('/');
    let links: Map<String, Value> = urls
        .router()
        .registry()
        .iter()
        .filter_map(|registration| {
            let path = urls.reverse(&registration.list_name(), None)?;
            Some((registration.prefix.clone(), Value::String(format!("{}{}", base, path))))
        })
        .collect();
    Value::Object(links)
}

/// Current indicator version and the running service version.
///
/// The current version is taken from the newest stored indicator; the
/// configured default applies while none carries a version.
pub fn indicators_version(indicators: &ResourceStore, default_version: Option<&str>) -> Value {
    let current = indicators
        .latest()
        .and_then(|row| row.get("version").cloned())
        .filter(|v| !v.is_null())
        .or_else(|| default_version.map(|v| Value::String(v.to_string())))
        .unwrap_or(Value::Null);

    json!({
        "current_version": current,
        "service_version": env!("CARGO_PKG_VERSION"),
    })
}
