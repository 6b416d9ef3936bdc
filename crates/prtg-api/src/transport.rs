// HTTP transport
//
// Single-shot GET with a bounded deadline and status classification.
// `Transport` is the seam the client is generic over, so tests can swap
// in a transport that records or refuses calls.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use tracing::{debug, warn};
use url::Url;

use crate::error::{Error, snippet};
use crate::request::redact;

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("prtg-datasource/", env!("CARGO_PKG_VERSION"));

/// TLS verification mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsMode {
    /// Use the system certificate store.
    #[default]
    System,
    /// Trust an additional CA certificate from the given PEM file.
    CustomCa(PathBuf),
    /// Accept any certificate (on-premises servers with self-issued certs).
    /// Operator opt-in only.
    DangerAcceptInvalid,
}

/// Transport configuration for building the HTTP client.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    /// Overall deadline covering connect and body read.
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::System,
            timeout: Duration::from_secs(10),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.timeout)
            .user_agent(USER_AGENT);

        match &self.tls {
            TlsMode::System => {}
            TlsMode::CustomCa(path) => {
                let cert_pem = std::fs::read(path)
                    .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
                let cert = reqwest::Certificate::from_pem(&cert_pem)
                    .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
                builder = builder.add_root_certificate(cert);
            }
            TlsMode::DangerAcceptInvalid => {
                warn!("TLS certificate verification disabled by configuration");
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }
}

/// A successful (HTTP 200) response: body bytes plus headers.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub body: Bytes,
    pub headers: HeaderMap,
}

impl RawResponse {
    pub fn new(body: impl Into<Bytes>, headers: HeaderMap) -> Self {
        Self {
            body: body.into(),
            headers,
        }
    }

    /// The `Content-Type` header, if present and readable.
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }
}

/// Executes a single GET. Implementations must not retry.
pub trait Transport: Send + Sync {
    fn get(&self, url: Url) -> impl Future<Output = Result<RawResponse, Error>> + Send;
}

/// The production transport, backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: config.build_client()?,
        })
    }
}

impl Transport for HttpTransport {
    async fn get(&self, url: Url) -> Result<RawResponse, Error> {
        let target = redact(&url);
        debug!(url = %target, "GET");

        let resp = self.http.get(url).send().await?;
        let status = resp.status();

        if status == StatusCode::UNAUTHORIZED {
            return Err(Error::Authentication {
                message: "invalid username, password, passhash or API token".into(),
            });
        }

        if status == StatusCode::FORBIDDEN {
            warn!(url = %target, "access denied, verify API token permissions");
            return Err(Error::Authorization {
                message: "please verify API token and permissions".into(),
            });
        }

        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Backend {
                status: status.as_u16(),
                snippet: snippet(&body),
            });
        }

        let headers = resp.headers().clone();
        let body = resp.bytes().await?;
        debug!(url = %target, bytes = body.len(), "response received");

        Ok(RawResponse { body, headers })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn content_type_is_read_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/xml; charset=UTF-8"));
        let resp = RawResponse::new("<a/>", headers);
        assert_eq!(resp.content_type(), Some("text/xml; charset=UTF-8"));
    }

    #[test]
    fn default_transport_is_strict() {
        assert_eq!(TransportConfig::default().tls, TlsMode::System);
    }

    #[test]
    fn missing_ca_file_is_tls_error() {
        let config = TransportConfig {
            tls: TlsMode::CustomCa(PathBuf::from("/nonexistent/ca.pem")),
            ..TransportConfig::default()
        };
        assert!(matches!(config.build_client(), Err(Error::Tls(_))));
    }
}
