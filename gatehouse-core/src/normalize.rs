//! URL and query normalization.
//!
//! Turns a base host, a request path and one or more query mappings into an
//! absolute [`Url`], then exposes the `path?query` form a routing engine
//! expects plus the default `host` header for that URL.

use url::Url;

use crate::error::Result;
use crate::query::{QueryMapping, QueryValue};

/// Default base host used when none is configured.
pub const DEFAULT_BASE_HOST: &str = "http://localhost";

/// Request target: a path, optionally carrying its own query mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestTarget {
    /// Path, possibly with an embedded `?query`.
    pub path: String,
    /// Object-style query attached to the target.
    pub query: QueryMapping,
}

impl RequestTarget {
    /// Create a target from a path.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: QueryMapping::new(),
        }
    }

    /// Attach an object-style query.
    pub fn with_query(mut self, query: QueryMapping) -> Self {
        self.query = query;
        self
    }
}

impl From<&str> for RequestTarget {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for RequestTarget {
    fn from(path: String) -> Self {
        Self::new(path)
    }
}

/// Build an absolute URL from `host`, `target` and an explicit query.
///
/// The target's own query and `query` are merged with `query` winning on
/// key collisions. Sequence values replace every existing parameter of
/// that name and are appended in order; single values overwrite.
pub fn parse_url(host: &str, target: &RequestTarget, query: &QueryMapping) -> Result<Url> {
    let mut url = if target.path.starts_with("//") {
        Url::parse(&format!("{}{}", host.trim_end_matches('/'), target.path))?
    } else {
        Url::parse(host)?.join(&target.path)?
    };

    let mut merged = target.query.clone();
    merged.merge(query.clone());

    if merged.is_empty() {
        return Ok(url);
    }

    let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    for (key, value) in merged {
        match value {
            QueryValue::Multi(values) => {
                pairs.retain(|(k, _)| *k != key);
                pairs.extend(values.into_iter().map(|v| (key.clone(), v)));
            }
            QueryValue::Single(value) => set_param(&mut pairs, key, value),
        }
    }

    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(&pairs);
    }

    Ok(url)
}

// Replace the first occurrence in place and drop the rest.
fn set_param(pairs: &mut Vec<(String, String)>, key: String, value: String) {
    match pairs.iter().position(|(k, _)| *k == key) {
        Some(first) => {
            pairs[first].1 = value;
            let mut idx = 0;
            pairs.retain(|(k, _)| {
                let keep = idx <= first || *k != key;
                idx += 1;
                keep
            });
        }
        None => pairs.push((key, value)),
    }
}

/// `pathname` plus `?query` when the query is non-empty.
pub fn path_and_query(url: &Url) -> String {
    match url.query() {
        Some(query) if !query.is_empty() => format!("{}?{}", url.path(), query),
        _ => url.path().to_string(),
    }
}

/// Default `host` header for a URL.
///
/// Uses `host:port` when the URL carries a non-default port, otherwise the
/// hostname plus `:443` for https and `:80` for everything else.
pub fn host_header(url: &Url) -> String {
    let hostname = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{hostname}:{port}"),
        None if url.scheme() == "https" => format!("{hostname}:443"),
        None => format!("{hostname}:80"),
    }
}
