//! Settings for the PRTG data source.
//!
//! Layered loading (defaults, TOML file, host JSON settings, `PRTG_`
//! environment), secret resolution from the host's secure map with an
//! environment fallback, and translation to `prtg_api::ClientConfig`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use prtg_api::request::RequestBuilder;
use prtg_api::{
    AggregationInterval, AuthMode, ClientConfig, Credentials, IntervalPolicy, IntervalStep, TlsMode,
};

/// Prefix for environment overrides (`PRTG_PATH`, `PRTG_TIMEOUT`, ...).
pub const ENV_PREFIX: &str = "PRTG_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for auth mode '{mode}'")]
    NoCredentials { mode: String },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl ConfigError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// ── Settings ────────────────────────────────────────────────────────

/// Non-secret data source settings.
///
/// Field names follow the TOML/env spelling; the host's camelCase JSON
/// keys are translated on load (`cacheTime` → `cache_time`).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    /// PRTG server host, optionally with scheme and port.
    #[serde(default)]
    pub path: String,

    /// Cache lifetime in seconds. `0` uses the client default.
    #[serde(default)]
    pub cache_time: u64,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// `apitoken`, `password` or `passhash`.
    #[serde(default = "default_auth_mode")]
    pub auth_mode: String,

    /// Account name for `password` / `passhash` modes.
    #[serde(default)]
    pub username: Option<String>,

    /// Skip certificate verification.
    #[serde(default)]
    pub insecure: bool,

    /// Extra CA certificate (PEM).
    #[serde(default)]
    pub ca_cert: Option<PathBuf>,

    /// Accept malformed XML from older servers.
    #[serde(default = "default_true")]
    pub lenient_xml: bool,

    /// Custom window → averaging steps. Empty keeps the built-in table.
    #[serde(default)]
    pub intervals: Vec<IntervalStep>,

    /// Interval for windows longer than the last step.
    #[serde(default)]
    pub interval_fallback: Option<AggregationInterval>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            path: String::new(),
            cache_time: 0,
            timeout: default_timeout(),
            auth_mode: default_auth_mode(),
            username: None,
            insecure: false,
            ca_cert: None,
            lenient_xml: true,
            intervals: Vec::new(),
            interval_fallback: None,
        }
    }
}

fn default_timeout() -> u64 {
    10
}
fn default_auth_mode() -> String {
    AuthMode::ApiToken.to_string()
}
fn default_true() -> bool {
    true
}

impl Settings {
    pub fn auth_mode(&self) -> Result<AuthMode, ConfigError> {
        AuthMode::from_str(self.auth_mode.trim()).map_err(|_| {
            ConfigError::invalid(
                "auth_mode",
                format!(
                    "expected 'apitoken', 'password', or 'passhash', got '{}'",
                    self.auth_mode
                ),
            )
        })
    }
}

// ── Secrets ─────────────────────────────────────────────────────────

/// Secret material from the host's secure settings.
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    pub api_key: Option<SecretString>,
    pub password: Option<SecretString>,
    pub passhash: Option<SecretString>,
}

impl Secrets {
    /// Read `apiKey`, `password` and `passhash` from the secure map.
    /// Blank values count as absent.
    pub fn from_map(secure: &HashMap<String, String>) -> Self {
        let get = |key: &str| {
            secure
                .get(key)
                .filter(|v| !v.trim().is_empty())
                .map(|v| SecretString::from(v.clone()))
        };
        Self {
            api_key: get("apiKey"),
            password: get("password"),
            passhash: get("passhash"),
        }
    }

    /// Fill any missing secret from `PRTG_API_KEY`, `PRTG_PASSWORD`,
    /// `PRTG_PASSHASH`.
    pub fn with_env_fallback(self) -> Self {
        self.with_fallback(|name| std::env::var(name).ok())
    }

    fn with_fallback(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}"))
                .filter(|v| !v.trim().is_empty())
                .map(SecretString::from)
        };
        if self.api_key.is_none() {
            self.api_key = read("API_KEY");
        }
        if self.password.is_none() {
            self.password = read("PASSWORD");
        }
        if self.passhash.is_none() {
            self.passhash = read("PASSHASH");
        }
        self
    }
}

// ── Loading ─────────────────────────────────────────────────────────

/// Load settings: defaults, then `file` (TOML, optional), then the host's
/// JSON settings, then `PRTG_` environment variables.
pub fn load_settings(
    file: Option<&Path>,
    json_data: Option<&str>,
) -> Result<Settings, ConfigError> {
    let mut figment = Figment::new().merge(Serialized::defaults(Settings::default()));
    if let Some(path) = file {
        debug!(path = %path.display(), "loading settings file");
        figment = figment.merge(Toml::file(path));
    }
    if let Some(json) = json_data.filter(|j| !j.trim().is_empty()) {
        figment = figment.merge(Serialized::defaults(host_json(json)?));
    }
    figment = figment.merge(Env::prefixed(ENV_PREFIX));

    let settings: Settings = figment.extract()?;
    Ok(settings)
}

/// Parse the host's JSON settings, renaming keys to the settings spelling.
fn host_json(json: &str) -> Result<Map<String, Value>, ConfigError> {
    let map: Map<String, Value> =
        serde_json::from_str(json).map_err(|e| ConfigError::invalid("jsonData", e.to_string()))?;
    Ok(map
        .into_iter()
        .map(|(key, value)| (settings_key(&key), value))
        .collect())
}

fn settings_key(host_key: &str) -> String {
    match host_key {
        "tlsSkipVerify" => "insecure".to_owned(),
        "host" => "path".to_owned(),
        other => {
            let mut key = String::with_capacity(other.len() + 4);
            for c in other.chars() {
                if c.is_ascii_uppercase() {
                    key.push('_');
                    key.push(c.to_ascii_lowercase());
                } else {
                    key.push(c);
                }
            }
            key
        }
    }
}

/// Resolve credentials for the configured auth mode.
///
/// Only the selected mode's secret is used, so a stored password and
/// passhash can never both be sent.
pub fn resolve_credentials(
    settings: &Settings,
    secrets: &Secrets,
) -> Result<Credentials, ConfigError> {
    let mode = settings.auth_mode()?;
    let missing = || ConfigError::NoCredentials {
        mode: mode.to_string(),
    };
    let username = || {
        settings
            .username
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(missing)
    };
    let expose = |s: &SecretString| s.expose_secret().to_owned();

    match mode {
        AuthMode::ApiToken => secrets
            .api_key
            .as_ref()
            .map(|k| Credentials::api_token(expose(k)))
            .ok_or_else(missing),
        AuthMode::Password => {
            let user = username()?;
            secrets
                .password
                .as_ref()
                .map(|p| Credentials::password(user, expose(p)))
                .ok_or_else(missing)
        }
        AuthMode::PassHash => {
            let user = username()?;
            secrets
                .passhash
                .as_ref()
                .map(|h| Credentials::passhash(user, expose(h)))
                .ok_or_else(missing)
        }
    }
}

/// Build a validated `ClientConfig`.
pub fn to_client_config(
    settings: &Settings,
    secrets: &Secrets,
) -> Result<ClientConfig, ConfigError> {
    let path = settings.path.trim();
    if path.is_empty() {
        return Err(ConfigError::invalid("path", "server address is empty"));
    }
    if settings.timeout == 0 {
        return Err(ConfigError::invalid("timeout", "must be at least one second"));
    }

    let credentials = resolve_credentials(settings, secrets)?;
    RequestBuilder::new(path, credentials.clone())
        .map_err(|e| ConfigError::invalid("path", e.to_string()))?;

    let tls = if settings.insecure {
        warn!(server = path, "certificate verification disabled for this data source");
        TlsMode::DangerAcceptInvalid
    } else if let Some(ref ca) = settings.ca_cert {
        TlsMode::CustomCa(ca.clone())
    } else {
        TlsMode::System
    };

    let mut config = ClientConfig::new(path, credentials)
        .with_timeout(Duration::from_secs(settings.timeout))
        .with_tls(tls)
        .with_lenient_xml(settings.lenient_xml);

    if settings.cache_time > 0 {
        config = config.with_cache_ttl(Duration::from_secs(settings.cache_time));
    }

    if !settings.intervals.is_empty() || settings.interval_fallback.is_some() {
        let steps = if settings.intervals.is_empty() {
            IntervalPolicy::default().steps().to_vec()
        } else {
            settings.intervals.clone()
        };
        let fallback = settings
            .interval_fallback
            .unwrap_or(AggregationInterval::OneDay);
        let policy = IntervalPolicy::new(steps, fallback)
            .map_err(|e| ConfigError::invalid("intervals", e.to_string()))?;
        config = config.with_intervals(policy);
    }

    Ok(config)
}

/// Load settings and secrets and build the client configuration in one go.
pub fn load_client_config(
    file: Option<&Path>,
    json_data: Option<&str>,
    secure: &HashMap<String, String>,
) -> Result<ClientConfig, ConfigError> {
    let settings = load_settings(file, json_data)?;
    let secrets = Secrets::from_map(secure).with_env_fallback();
    to_client_config(&settings, &secrets)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn secure(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect()
    }

    fn settings(path: &str) -> Settings {
        Settings {
            path: path.into(),
            ..Settings::default()
        }
    }

    #[test]
    fn host_json_uses_camel_case_keys() {
        let s = load_settings(
            None,
            Some(r#"{"path": "prtg.example.com", "cacheTime": 60, "authMode": "passhash", "username": "admin"}"#),
        )
        .unwrap();
        assert_eq!(s.path, "prtg.example.com");
        assert_eq!(s.cache_time, 60);
        assert_eq!(s.auth_mode().unwrap(), AuthMode::PassHash);
        assert_eq!(s.timeout, 10);
        assert!(s.lenient_xml);
    }

    #[test]
    fn host_keys_map_to_settings_keys() {
        assert_eq!(settings_key("cacheTime"), "cache_time");
        assert_eq!(settings_key("lenientXml"), "lenient_xml");
        assert_eq!(settings_key("tlsSkipVerify"), "insecure");
        assert_eq!(settings_key("path"), "path");
    }

    #[test]
    fn malformed_host_json_is_rejected() {
        let err = load_settings(None, Some("{not json")).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "jsonData"));
    }

    #[test]
    fn json_overrides_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "path = \"file.example.com\"\ntimeout = 25\n\n[[intervals]]\nmax_hours = 24.0\ninterval = \"raw\"\n"
        )
        .unwrap();

        let s = load_settings(Some(file.path()), Some(r#"{"path": "json.example.com"}"#)).unwrap();
        assert_eq!(s.path, "json.example.com");
        assert_eq!(s.timeout, 25);
        assert_eq!(s.intervals.len(), 1);
        assert_eq!(s.intervals[0].interval, AggregationInterval::Raw);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let s = load_settings(Some(Path::new("/nonexistent/prtg.toml")), None).unwrap();
        assert_eq!(s.timeout, 10);
        assert_eq!(s.auth_mode, "apitoken");
    }

    #[test]
    fn api_token_from_secure_map() {
        let secrets = Secrets::from_map(&secure(&[("apiKey", "tok")]));
        let config = to_client_config(&settings("prtg.local"), &secrets).unwrap();
        assert_eq!(config.credentials.mode(), AuthMode::ApiToken);
        assert_eq!(config.effective_cache_ttl(), Duration::from_secs(30));
        assert_eq!(config.tls, TlsMode::System);
    }

    #[test]
    fn missing_secret_is_no_credentials() {
        let err = to_client_config(&settings("prtg.local"), &Secrets::default()).unwrap_err();
        assert!(matches!(err, ConfigError::NoCredentials { .. }));

        let blank = Secrets::from_map(&secure(&[("apiKey", "  ")]));
        assert!(blank.api_key.is_none());
    }

    #[test]
    fn passhash_mode_ignores_stored_password() {
        let s = Settings {
            auth_mode: "passhash".into(),
            username: Some("admin".into()),
            ..settings("prtg.local")
        };
        let secrets = Secrets::from_map(&secure(&[("password", "pw"), ("passhash", "123")]));
        let creds = resolve_credentials(&s, &secrets).unwrap();
        assert_eq!(creds.mode(), AuthMode::PassHash);

        let no_user = Settings {
            username: None,
            ..s
        };
        assert!(matches!(
            resolve_credentials(&no_user, &secrets),
            Err(ConfigError::NoCredentials { .. })
        ));
    }

    #[test]
    fn env_fallback_fills_only_missing_secrets() {
        let env = secure(&[("PRTG_API_KEY", "from-env"), ("PRTG_PASSWORD", "env-pw")]);
        let secrets = Secrets::from_map(&secure(&[("password", "map-pw")]))
            .with_fallback(|name| env.get(name).cloned());
        assert_eq!(secrets.api_key.unwrap().expose_secret(), "from-env");
        assert_eq!(secrets.password.unwrap().expose_secret(), "map-pw");
        assert!(secrets.passhash.is_none());
    }

    #[test]
    fn validation_errors() {
        let secrets = Secrets::from_map(&secure(&[("apiKey", "tok")]));

        let err = to_client_config(&settings("  "), &secrets).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "path"));

        let zero = Settings {
            timeout: 0,
            ..settings("prtg.local")
        };
        assert!(to_client_config(&zero, &secrets).is_err());

        let bad_mode = Settings {
            auth_mode: "kerberos".into(),
            ..settings("prtg.local")
        };
        assert!(matches!(
            to_client_config(&bad_mode, &secrets),
            Err(ConfigError::Validation { .. })
        ));

        let bad_steps = Settings {
            intervals: vec![
                IntervalStep { max_hours: 48.0, interval: AggregationInterval::OneHour },
                IntervalStep { max_hours: 24.0, interval: AggregationInterval::OneDay },
            ],
            ..settings("prtg.local")
        };
        assert!(matches!(
            to_client_config(&bad_steps, &secrets),
            Err(ConfigError::Validation { ref field, .. }) if field == "intervals"
        ));
    }

    #[test]
    fn tls_and_cache_settings_carry_through() {
        let secrets = Secrets::from_map(&secure(&[("apiKey", "tok")]));
        let s = Settings {
            insecure: true,
            cache_time: 5,
            interval_fallback: Some(AggregationInterval::FourHours),
            ..settings("https://prtg.local:8443")
        };
        let config = to_client_config(&s, &secrets).unwrap();
        assert_eq!(config.tls, TlsMode::DangerAcceptInvalid);
        assert_eq!(config.effective_cache_ttl(), Duration::from_secs(5));
        assert_eq!(config.intervals.select(10_000.0), AggregationInterval::FourHours);
    }
}
