//! Session token configuration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum signing secret length in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Configuration for the session token codec.
///
/// Fields with defaults can be omitted when loading from environment variables.
#[derive(Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Symmetric signing key shared by every node.
    secret: String,
    /// `iss` claim emitted and enforced on verify.
    /// Default: "waymark"
    #[serde(default = "default_issuer")]
    issuer: String,
    /// Access token lifetime in seconds.
    /// Default: 900
    #[serde(default = "default_access_token_ttl")]
    access_token_ttl: u64,
    /// Refresh token lifetime in seconds.
    /// Default: 604800
    #[serde(default = "default_refresh_token_ttl")]
    refresh_token_ttl: u64,
    /// HTTP header carrying the access token.
    /// Default: "Authorization"
    #[serde(default = "default_header_name")]
    header_name: String,
}

fn default_issuer() -> String {
    "waymark".to_string()
}

fn default_access_token_ttl() -> u64 {
    15 * 60
}

fn default_refresh_token_ttl() -> u64 {
    7 * 24 * 60 * 60
}

fn default_header_name() -> String {
    "Authorization".to_string()
}

impl JwtConfig {
    /// Creates a configuration with defaults for optional fields.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer: default_issuer(),
            access_token_ttl: default_access_token_ttl(),
            refresh_token_ttl: default_refresh_token_ttl(),
            header_name: default_header_name(),
        }
    }

    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    #[must_use]
    pub fn with_access_token_ttl(mut self, seconds: u64) -> Self {
        self.access_token_ttl = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_token_ttl(mut self, seconds: u64) -> Self {
        self.refresh_token_ttl = seconds;
        self
    }

    #[must_use]
    pub fn with_header_name(mut self, header_name: impl Into<String>) -> Self {
        self.header_name = header_name.into();
        self
    }

    #[must_use]
    pub fn secret(&self) -> &str {
        &self.secret
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    #[must_use]
    pub fn access_token_ttl(&self) -> u64 {
        self.access_token_ttl
    }

    #[must_use]
    pub fn refresh_token_ttl(&self) -> u64 {
        self.refresh_token_ttl
    }

    #[must_use]
    pub fn header_name(&self) -> &str {
        &self.header_name
    }
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .field("header_name", &self.header_name)
            .finish()
    }
}
