//! Centralized server configuration.
//!
//! Loaded via the `config` crate from an optional `waymark.{toml,yaml,json}`
//! file, then environment variables with `__` as the nesting separator
//! (`JWT__SECRET`, `OPENID__CLIENT_ID`).
//!
//! See [`JwtConfig`] and [`OpenIdConfig`] for the library sections.

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use waymark_identity::{JwtConfig, OpenIdConfig};

/// Server configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// PostgreSQL database connection URL.
    pub database_url: String,

    /// Address the HTTP listener binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Whether to set the Secure flag on cookies (requires HTTPS).
    /// Defaults to true for production safety; set to false for local HTTP development.
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,

    /// Session token configuration.
    pub jwt: JwtConfig,

    /// OpenID federation; disabled when omitted.
    #[serde(default)]
    pub openid: OpenIdConfig,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_secure_cookies() -> bool {
    true
}

impl ServerConfig {
    /// Loads configuration from the optional file and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_builder(
            config::Config::builder()
                .add_source(File::with_name("waymark").required(false))
                .add_source(Environment::default().separator("__").try_parsing(true)),
        )
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        builder.build()?.try_deserialize()
    }
}
