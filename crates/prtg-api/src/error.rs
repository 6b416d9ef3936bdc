use thiserror::Error;

use crate::decode::Format;
use crate::request::Endpoint;

/// Longest body excerpt carried in an error's display text.
const SNIPPET_LEN: usize = 200;

/// Top-level error type for the `prtg-api` crate.
///
/// Covers every failure mode of a single client call: URL construction,
/// transport, backend status, decoding, and result validation.
/// `prtg-core` maps these into host-facing status codes.
#[derive(Debug, Error)]
pub enum Error {
    // ── Request construction ────────────────────────────────────────
    /// The configured server host could not be turned into a URL.
    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// The query was rejected before any network call
    /// (missing sensor id, inverted window, missing endpoint parameter).
    #[error("Invalid query: {message}")]
    InvalidQuery { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// Connect, timeout, or body-read failure. Never retried internally.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The HTTP client could not be built with the requested TLS policy.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Backend status ──────────────────────────────────────────────
    /// HTTP 401: the credentials were rejected.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// HTTP 403: the credentials are valid but lack permission.
    #[error("Access denied: {message}")]
    Authorization { message: String },

    /// Any other non-200 status.
    #[error("Backend returned HTTP {status}: {snippet}")]
    Backend { status: u16, snippet: String },

    // ── Data ────────────────────────────────────────────────────────
    /// The body could not be decoded as the expected shape.
    /// The full body is kept for diagnosis.
    #[error("{format} decode error: {message} (body preview: {snippet:?})")]
    Decode {
        format: Format,
        message: String,
        snippet: String,
        body: String,
    },

    /// A backend datetime string matched none of the accepted layouts.
    #[error("Unparsable datetime '{value}'")]
    DateParse { value: String },

    /// A valid query produced zero usable records.
    #[error("No data returned by {endpoint}")]
    EmptyResult { endpoint: Endpoint },

    // ── Configuration ───────────────────────────────────────────────
    /// Client configuration was rejected at construction.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl Error {
    /// Build a decode error, keeping the full body and a short preview.
    pub(crate) fn decode(format: Format, message: impl Into<String>, body: &[u8]) -> Self {
        let body = String::from_utf8_lossy(body).into_owned();
        Self::Decode {
            format,
            message: message.into(),
            snippet: snippet(&body),
            body,
        }
    }

    pub(crate) fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery {
            message: message.into(),
        }
    }

    /// Returns `true` if the caller may reasonably retry the call.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Backend { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if the request ran out of time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Network(e) if e.is_timeout())
    }

    /// Returns `true` for 401/403 responses.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Authentication { .. } | Self::Authorization { .. })
    }

    /// Returns `true` if the backend answered 404.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Backend { status: 404, .. })
    }

    /// The HTTP status behind this error, when one is known.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Authentication { .. } => Some(401),
            Self::Authorization { .. } => Some(403),
            Self::Backend { status, .. } => Some(*status),
            Self::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// First [`SNIPPET_LEN`] characters of a body, cut on a char boundary.
pub(crate) fn snippet(body: &str) -> String {
    body.chars().take(SNIPPET_LEN).collect()
}
