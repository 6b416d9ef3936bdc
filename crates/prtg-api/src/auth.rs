use secrecy::{ExposeSecret, SecretString};

/// Query-parameter names that carry authentication.
///
/// The request builder refuses to let caller parameters overwrite these.
pub const AUTH_PARAMS: [&str; 4] = ["apitoken", "username", "password", "passhash"];

/// Which authentication mode a set of credentials uses.
///
/// Marker enum (no data) -- the actual secrets live in [`Credentials`].
/// Useful for branching on auth flow without carrying secret material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum AuthMode {
    /// `apitoken=` query parameter.
    ApiToken,
    /// `username=` + `password=`.
    Password,
    /// `username=` + `passhash=`.
    PassHash,
}

/// Credentials for authenticating with a PRTG server.
///
/// Exactly one mode is active per value, so a password and a passhash
/// can never be sent together.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// API token generated under the user's account settings.
    ApiToken { token: SecretString },

    /// Plaintext account password.
    Password {
        username: String,
        password: SecretString,
    },

    /// Password hash as returned by `/api/getpasshash.htm`.
    PassHash {
        username: String,
        passhash: SecretString,
    },
}

impl Credentials {
    pub fn api_token(token: impl Into<String>) -> Self {
        Self::ApiToken {
            token: SecretString::from(token.into()),
        }
    }

    pub fn password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Password {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    pub fn passhash(username: impl Into<String>, passhash: impl Into<String>) -> Self {
        Self::PassHash {
            username: username.into(),
            passhash: SecretString::from(passhash.into()),
        }
    }

    pub fn mode(&self) -> AuthMode {
        match self {
            Self::ApiToken { .. } => AuthMode::ApiToken,
            Self::Password { .. } => AuthMode::Password,
            Self::PassHash { .. } => AuthMode::PassHash,
        }
    }

    /// `true` if the secret (and username, where needed) is empty.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::ApiToken { token } => token.expose_secret().is_empty(),
            Self::Password { username, password } => {
                username.is_empty() || password.expose_secret().is_empty()
            }
            Self::PassHash { username, passhash } => {
                username.is_empty() || passhash.expose_secret().is_empty()
            }
        }
    }

    /// The query pairs this mode contributes to every request.
    pub(crate) fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        match self {
            Self::ApiToken { token } => vec![("apitoken", token.expose_secret())],
            Self::Password { username, password } => vec![
                ("username", username.as_str()),
                ("password", password.expose_secret()),
            ],
            Self::PassHash { username, passhash } => vec![
                ("username", username.as_str()),
                ("passhash", passhash.expose_secret()),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_mode_never_carries_passhash() {
        let creds = Credentials::password("admin", "secret");
        let keys: Vec<_> = creds.query_pairs().iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, ["username", "password"]);
    }

    #[test]
    fn passhash_mode_never_carries_password() {
        let creds = Credentials::passhash("admin", "123456");
        let keys: Vec<_> = creds.query_pairs().iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, ["username", "passhash"]);
    }

    #[test]
    fn blank_detection() {
        assert!(Credentials::api_token("").is_blank());
        assert!(Credentials::password("", "pw").is_blank());
        assert!(!Credentials::passhash("admin", "42").is_blank());
    }

    #[test]
    fn auth_mode_parses_from_settings_strings() {
        assert_eq!("apitoken".parse::<AuthMode>().ok(), Some(AuthMode::ApiToken));
        assert_eq!("passhash".parse::<AuthMode>().ok(), Some(AuthMode::PassHash));
        assert_eq!(AuthMode::Password.to_string(), "password");
    }
}
