//! Configuration and request vocabulary for the YOURLS API.
//!
//! # Design
//! `Credentials` is an enum so a client is in exactly one authentication
//! mode for its whole lifetime. Both `ClientConfig` and `Credentials` derive
//! serde traits so a host application can load them from whatever format it
//! already uses for configuration.

use serde::{Deserialize, Serialize};

/// API actions the client issues, serialized as the `action` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ShortUrl,
    UrlStats,
    Expand,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::ShortUrl => "shorturl",
            Action::UrlStats => "url-stats",
            Action::Expand => "expand",
        }
    }
}

/// How requests are authenticated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Credentials {
    /// Sends `username` and `password` with every request.
    Password { username: String, password: String },
    /// Sends `timestamp` and `signature = md5(token + timestamp)`.
    Signature { token: String },
}

impl Credentials {
    /// Pick the mode from optional positional values.
    ///
    /// A non-empty username selects `Password`; anything else selects
    /// `Signature`. Missing values become empty strings, so this never fails
    /// and a bad combination only shows up once the server rejects it.
    pub fn from_parts(username: Option<&str>, password: Option<&str>, token: Option<&str>) -> Self {
        match username {
            Some(username) if !username.is_empty() => Credentials::Password {
                username: username.to_string(),
                password: password.unwrap_or_default().to_string(),
            },
            _ => Credentials::Signature {
                token: token.unwrap_or_default().to_string(),
            },
        }
    }

    /// Short name of the mode, for logging.
    pub fn mode(&self) -> &'static str {
        match self {
            Credentials::Password { .. } => "password",
            Credentials::Signature { .. } => "signature",
        }
    }
}

/// Everything a `YourlsClient` needs to reach the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Full URL of the API script, e.g. `https://sho.rt/yourls-api.php`.
    pub endpoint: String,
    pub credentials: Credentials,
}

impl ClientConfig {
    pub fn new(endpoint: &str, credentials: Credentials) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            credentials,
        }
    }
}
