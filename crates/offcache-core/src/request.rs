//! Resource requests and their normalization into cache identifiers.
//!
//! A request for the application's own origin is keyed by its origin-relative
//! path (plus query), anything else by its absolute URL. Fragments never take
//! part in the key.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

/// Normalized cache key for a requested resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a request targets the application's own origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OriginClass {
    Local,
    External,
}

/// An intercepted outgoing request. Immutable once built.
#[derive(Debug, Clone)]
pub struct ResourceRequest {
    method: String,
    url: Url,
    headers: Vec<(String, String)>,
}

impl ResourceRequest {
    pub fn new(method: &str, url: Url) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            url,
            headers: Vec::new(),
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }
}

/// Classify a request and derive its cache key.
///
/// Pure function of the request URL and the application's base URL; the
/// classification is recomputed on every call.
pub fn normalize(request: &ResourceRequest, app_base: &Url) -> (Identifier, OriginClass) {
    identify(request.url(), app_base)
}

/// Same as [`normalize`] for a bare URL (manifest entries, fallback document).
pub fn identify(url: &Url, app_base: &Url) -> (Identifier, OriginClass) {
    if url.origin() == app_base.origin() {
        let key = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };
        (Identifier(key), OriginClass::Local)
    } else {
        let mut absolute = url.clone();
        absolute.set_fragment(None);
        (Identifier(absolute.to_string()), OriginClass::External)
    }
}

/// Resolve a manifest-style reference (`./index.html`, `/app.js`,
/// `https://cdn.example/lib.js`) against the application's base URL.
pub fn resolve(reference: &str, app_base: &Url) -> Result<Url, url::ParseError> {
    app_base.join(reference)
}
