// Request construction
//
// Turns an endpoint plus caller parameters into an authenticated URL of
// the form `{base}/api/{path}?{auth}&{params}`. Pure: no I/O, no state
// beyond the immutable base URL and credentials.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use tracing::warn;
use url::Url;

use crate::auth::{AUTH_PARAMS, Credentials};
use crate::error::Error;

/// Caller-supplied query parameters, kept sorted so URLs and cache keys
/// are stable for identical inputs.
pub type Params = BTreeMap<String, String>;

/// Row cap requested from list and history endpoints.
pub const ROW_LIMIT: &str = "50000";

/// Logical query against the PRTG API, bound to a fixed backend path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Endpoint {
    Status,
    Groups,
    Devices,
    Sensors,
    ChannelValues,
    HistoricData,
    SensorTree,
    SensorDetails,
}

impl Endpoint {
    /// Path below `/api/`.
    pub fn path(self) -> &'static str {
        match self {
            Self::Status => "status.json",
            Self::Groups | Self::Devices | Self::Sensors | Self::ChannelValues => "table.json",
            Self::HistoricData => "historicdata.json",
            Self::SensorTree => "table.xml",
            Self::SensorDetails => "getsensordetails.json",
        }
    }

    /// Parameters the backend needs for this endpoint to mean anything.
    pub fn required_params(self) -> &'static [&'static str] {
        match self {
            Self::Status => &[],
            Self::Groups | Self::Devices | Self::Sensors => &["content", "columns"],
            Self::ChannelValues => &["content", "columns", "id"],
            Self::HistoricData => &["id", "avg", "sdate", "edate"],
            Self::SensorTree => &["content", "id"],
            Self::SensorDetails => &["id"],
        }
    }
}

/// Composes authenticated URLs for a single PRTG server.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    base_url: Url,
    credentials: Credentials,
}

impl RequestBuilder {
    /// Parse the configured server host.
    ///
    /// A bare host (`prtg.example.com`) is treated as `https://prtg.example.com`.
    pub fn new(host: &str, credentials: Credentials) -> Result<Self, Error> {
        Ok(Self {
            base_url: parse_base_url(host)?,
            credentials,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Build the URL for `endpoint` with `params`.
    ///
    /// Auth parameters are written first; a caller parameter with an auth
    /// name is dropped so it can never replace the configured credentials.
    pub fn build(&self, endpoint: Endpoint, params: &Params) -> Result<Url, Error> {
        if let Some(missing) = endpoint
            .required_params()
            .iter()
            .find(|name| params.get(**name).is_none_or(String::is_empty))
        {
            return Err(Error::invalid_query(format!(
                "{endpoint} requires parameter '{missing}'"
            )));
        }

        let base = self.base_url.as_str().trim_end_matches('/');
        let raw = format!("{base}/api/{}", endpoint.path());
        let mut url = Url::parse(&raw).map_err(|source| Error::InvalidUrl { url: raw, source })?;

        {
            let mut query = url.query_pairs_mut();
            for (key, value) in self.credentials.query_pairs() {
                query.append_pair(key, value);
            }
            for (key, value) in params {
                if AUTH_PARAMS.contains(&key.as_str()) {
                    warn!(%endpoint, param = %key, "ignoring caller parameter that shadows auth");
                    continue;
                }
                query.append_pair(key, value);
            }
        }

        Ok(url)
    }
}

/// Cache key for one logical request: endpoint plus every non-auth parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(endpoint: Endpoint, params: &Params) -> Self {
        let mut key = endpoint.to_string();
        for (name, value) in params {
            if AUTH_PARAMS.contains(&name.as_str()) {
                continue;
            }
            let _ = write!(key, "|{name}={value}");
        }
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Strip the query string from a URL for logging (it carries secrets).
pub(crate) fn redact(url: &Url) -> String {
    let mut clean = url.clone();
    clean.set_query(None);
    clean.to_string()
}

fn parse_base_url(host: &str) -> Result<Url, Error> {
    let host = host.trim();
    let candidate = if host.contains("://") {
        host.to_owned()
    } else {
        format!("https://{host}")
    };
    let url = Url::parse(&candidate).map_err(|source| Error::InvalidUrl {
        url: candidate.clone(),
        source,
    })?;
    if url.host_str().is_none_or(str::is_empty) {
        return Err(Error::InvalidUrl {
            url: candidate,
            source: url::ParseError::EmptyHost,
        });
    }
    Ok(url)
}

/// Shorthand for building a [`Params`] map from literal pairs.
pub(crate) fn params<const N: usize>(pairs: [(&str, &str); N]) -> Params {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn builder() -> RequestBuilder {
        RequestBuilder::new("prtg.example.com", Credentials::api_token("tok")).unwrap()
    }

    #[test]
    fn bare_host_gets_https_scheme() {
        let b = builder();
        assert_eq!(b.base_url().as_str(), "https://prtg.example.com/");
    }

    #[test]
    fn auth_comes_first_then_sorted_params() {
        let url = builder()
            .build(
                Endpoint::Groups,
                &params([("count", "50000"), ("columns", "objid"), ("content", "groups")]),
            )
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://prtg.example.com/api/table.json?apitoken=tok&columns=objid&content=groups&count=50000"
        );
    }

    #[test]
    fn caller_cannot_clobber_auth() {
        let url = builder()
            .build(Endpoint::Status, &params([("apitoken", "evil")]))
            .unwrap();
        let tokens: Vec<_> = url
            .query_pairs()
            .filter(|(k, _)| k == "apitoken")
            .map(|(_, v)| v.into_owned())
            .collect();
        assert_eq!(tokens, ["tok"]);
    }

    #[test]
    fn password_and_hash_never_both_sent() {
        let b = RequestBuilder::new("https://prtg.local:8443", Credentials::password("admin", "pw"))
            .unwrap();
        let url = b
            .build(Endpoint::Status, &params([("passhash", "123")]))
            .unwrap();
        let keys: Vec<_> = url.query_pairs().map(|(k, _)| k.into_owned()).collect();
        assert_eq!(keys, ["username", "password"]);
    }

    #[test]
    fn missing_required_param_is_invalid_query() {
        let err = builder()
            .build(Endpoint::SensorDetails, &Params::new())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidQuery { .. }));
    }

    #[test]
    fn unparsable_host_is_invalid_url() {
        let err = RequestBuilder::new("https://", Credentials::api_token("t")).unwrap_err();
        assert!(matches!(err, Error::InvalidUrl { .. }));
        let err = RequestBuilder::new("http://[::1", Credentials::api_token("t")).unwrap_err();
        assert!(matches!(err, Error::InvalidUrl { .. }));
    }

    #[test]
    fn cache_key_ignores_auth_and_is_order_stable() {
        let a = CacheKey::new(Endpoint::Sensors, &params([("b", "2"), ("a", "1")]));
        let b = CacheKey::new(
            Endpoint::Sensors,
            &params([("a", "1"), ("apitoken", "x"), ("b", "2")]),
        );
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "sensors|a=1|b=2");
        assert_ne!(a, CacheKey::new(Endpoint::Devices, &params([("a", "1"), ("b", "2")])));
    }

    #[test]
    fn redact_drops_query() {
        let url = builder().build(Endpoint::Status, &Params::new()).unwrap();
        assert_eq!(redact(&url), "https://prtg.example.com/api/status.json");
    }
}
