//! Responses as seen by the engine: what the network returned, what a store
//! holds, and what gets handed back to the application.

use chrono::{DateTime, Utc};

use crate::request::Identifier;

/// Status code of the synthetic "resource unavailable" response.
pub const SERVICE_UNAVAILABLE: u16 = 503;

/// Body of the synthetic response for an external resource.
pub const UNAVAILABLE_BODY: &str =
    "This resource is unavailable offline and has not been cached yet.";

/// Body of the synthetic response when even the offline document is missing.
pub const OFFLINE_BODY: &str = "You are offline and this page has not been cached yet.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Synthesized `503 Service Unavailable` with a plain-text explanation.
    pub fn service_unavailable(message: &str) -> Self {
        Self::new(SERVICE_UNAVAILABLE, message.as_bytes().to_vec())
            .with_header("content-type", "text/plain; charset=utf-8")
    }

    /// Success-class status (2xx). Only these are ever written to a store.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Canonical reason phrase, empty for unregistered codes.
    pub fn reason(&self) -> &'static str {
        reqwest::StatusCode::from_u16(self.status)
            .ok()
            .and_then(|status| status.canonical_reason())
            .unwrap_or("")
    }

    pub fn into_stored(self, identifier: Identifier) -> StoredResponse {
        StoredResponse {
            identifier,
            status: self.status,
            headers: self.headers,
            body: self.body,
            stored_at: Utc::now(),
        }
    }
}

/// A response held by a version store, keyed by its identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResponse {
    pub identifier: Identifier,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub stored_at: DateTime<Utc>,
}

impl StoredResponse {
    pub fn to_response(&self) -> Response {
        Response {
            status: self.status,
            headers: self.headers.clone(),
            body: self.body.clone(),
        }
    }

    /// Age in its largest whole unit, for listings.
    pub fn age_display(&self) -> String {
        let age = Utc::now().signed_duration_since(self.stored_at);
        if age.num_days() > 0 {
            format!("{}d ago", age.num_days())
        } else if age.num_hours() > 0 {
            format!("{}h ago", age.num_hours())
        } else if age.num_minutes() > 0 {
            format!("{}m ago", age.num_minutes())
        } else {
            "just now".to_string()
        }
    }
}

/// Where the engine got the response it returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Store,
    Network,
    /// The offline fallback document, served in place of the request.
    Fallback,
    /// Synthesized by the engine (503).
    Synthetic,
}
