// ── Client configuration ──
//
// Everything a `PrtgClient` needs at construction. Immutable afterwards
// and shared read-only by every call. Never touches disk: `prtg-config`
// builds one of these from host settings and hands it in.

use std::time::Duration;

use crate::auth::Credentials;
use crate::interval::IntervalPolicy;
use crate::transport::{TlsMode, TransportConfig};

pub use crate::cache::DEFAULT_CACHE_TTL;

/// Default overall request deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for one PRTG server.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server address. A bare host gets `https://`.
    pub base_url: String,
    pub credentials: Credentials,
    /// Lifetime of cached results. `None` uses [`DEFAULT_CACHE_TTL`].
    pub cache_ttl: Option<Duration>,
    /// Request deadline covering connect and body read.
    pub timeout: Duration,
    pub tls: TlsMode,
    /// Window length → averaging interval.
    pub intervals: IntervalPolicy,
    /// Accept the malformed XML some PRTG versions emit.
    pub lenient_xml: bool,
}

impl ClientConfig {
    /// A config with defaults for everything but the server and credentials.
    pub fn new(base_url: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            base_url: base_url.into(),
            credentials,
            cache_ttl: None,
            timeout: DEFAULT_TIMEOUT,
            tls: TlsMode::default(),
            intervals: IntervalPolicy::default(),
            lenient_xml: true,
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_tls(mut self, tls: TlsMode) -> Self {
        self.tls = tls;
        self
    }

    pub fn with_intervals(mut self, intervals: IntervalPolicy) -> Self {
        self.intervals = intervals;
        self
    }

    pub fn with_lenient_xml(mut self, lenient: bool) -> Self {
        self.lenient_xml = lenient;
        self
    }

    pub fn effective_cache_ttl(&self) -> Duration {
        self.cache_ttl.unwrap_or(DEFAULT_CACHE_TTL)
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: self.tls.clone(),
            timeout: self.timeout,
        }
    }
}
