// ── Core error types ──
//
// Host-facing errors. The host never sees transport details directly:
// `From<prtg_api::Error>` folds client failures into these variants and
// `status_code()` gives the HTTP-style status the host reports.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Request errors ───────────────────────────────────────────────
    #[error("Invalid query: {message}")]
    InvalidQuery { message: String },

    #[error("missing {name} parameter")]
    MissingParameter { name: String },

    #[error("Unknown resource: {path}")]
    UnknownResource { path: String },

    // ── Backend errors ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Access denied: {message}")]
    AccessDenied { message: String },

    #[error("Not found on PRTG server: {message}")]
    NotFound { message: String },

    #[error("No data returned by {endpoint}")]
    NoData { endpoint: String },

    #[error("Cannot reach PRTG server: {reason}")]
    ConnectionFailed { reason: String },

    #[error("PRTG server timed out")]
    Timeout,

    #[error("PRTG server error (HTTP {status}): {message}")]
    Backend { status: u16, message: String },

    #[error("Unreadable response: {message}")]
    Decode { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// HTTP-style status for the host.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidQuery { .. } | Self::MissingParameter { .. } => 400,
            Self::AuthenticationFailed { .. } => 401,
            Self::AccessDenied { .. } => 403,
            Self::UnknownResource { .. } | Self::NotFound { .. } | Self::NoData { .. } => 404,
            Self::ConnectionFailed { .. } | Self::Backend { .. } | Self::Decode { .. } => 502,
            Self::Timeout => 504,
            Self::Config { .. } | Self::Internal(_) => 500,
        }
    }
}

// ── Conversion from client errors ────────────────────────────────────

impl From<prtg_api::Error> for CoreError {
    fn from(err: prtg_api::Error) -> Self {
        use prtg_api::Error as E;
        match err {
            E::InvalidQuery { message } => Self::InvalidQuery { message },
            E::Authentication { message } => Self::AuthenticationFailed { message },
            E::Authorization { message } => Self::AccessDenied { message },
            E::Network(ref e) if e.is_timeout() => Self::Timeout,
            E::Network(e) => Self::ConnectionFailed {
                reason: e.to_string(),
            },
            E::Tls(msg) => Self::ConnectionFailed {
                reason: format!("TLS error: {msg}"),
            },
            E::Backend {
                status: 404,
                snippet,
            } => Self::NotFound { message: snippet },
            E::Backend { status, snippet } => Self::Backend {
                status,
                message: snippet,
            },
            E::Decode {
                format, message, ..
            } => Self::Decode {
                message: format!("{format}: {message}"),
            },
            E::DateParse { value } => Self::Decode {
                message: format!("unparsable datetime '{value}'"),
            },
            E::EmptyResult { endpoint } => Self::NoData {
                endpoint: endpoint.to_string(),
            },
            E::InvalidUrl { url, source } => Self::Config {
                message: format!("invalid server address '{url}': {source}"),
            },
            E::InvalidConfig { message } => Self::Config { message },
        }
    }
}

impl From<prtg_config::ConfigError> for CoreError {
    fn from(err: prtg_config::ConfigError) -> Self {
        Self::Config {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("serialization failed: {err}"))
    }
}
