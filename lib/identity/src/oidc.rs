//! OpenID Connect federation configuration.
//!
//! Federation is optional. When `enabled` is false the remaining fields may
//! be left empty and no provider discovery is attempted.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Configuration for the OpenID provider.
///
/// Every field has a default so a disabled section can be omitted entirely
/// when loading from environment variables.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenIdConfig {
    /// Feature gate for federation.
    enabled: bool,
    /// Discovery base URL (the issuer).
    provider_url: String,
    /// OAuth2 client ID, also checked as the ID token audience.
    client_id: String,
    client_secret: String,
    /// Callback URL sent to the provider.
    redirect_url: String,
    /// Scopes as a comma-separated string.
    /// Default: "openid,profile,email"
    scopes: String,
    /// Dotted path to the roles array inside the ID token claims,
    /// e.g. "realm_access.roles".
    roles_claim: Option<String>,
    /// Display name for the login button.
    /// Default: "OpenID"
    name: String,
    /// Display icon for the login button.
    icon: Option<String>,
}

fn default_scopes() -> String {
    "openid,profile,email".to_string()
}

fn default_name() -> String {
    "OpenID".to_string()
}

impl Default for OpenIdConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider_url: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            redirect_url: String::new(),
            scopes: default_scopes(),
            roles_claim: None,
            name: default_name(),
            icon: None,
        }
    }
}

impl OpenIdConfig {
    /// Creates an enabled configuration builder.
    #[must_use]
    pub fn builder(
        provider_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_url: impl Into<String>,
    ) -> OpenIdConfigBuilder {
        OpenIdConfigBuilder::new(provider_url, client_id, client_secret, redirect_url)
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn provider_url(&self) -> &str {
        &self.provider_url
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    #[must_use]
    pub fn redirect_url(&self) -> &str {
        &self.redirect_url
    }

    /// Returns the scopes to request, parsed from the comma-separated string.
    #[must_use]
    pub fn scopes(&self) -> Vec<&str> {
        self.scopes
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Returns the roles claim path, if configured and non-empty.
    #[must_use]
    pub fn roles_claim(&self) -> Option<&str> {
        self.roles_claim.as_deref().filter(|p| !p.is_empty())
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn icon(&self) -> Option<&str> {
        self.icon.as_deref()
    }
}

impl fmt::Debug for OpenIdConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenIdConfig")
            .field("enabled", &self.enabled)
            .field("provider_url", &self.provider_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_url", &self.redirect_url)
            .field("scopes", &self.scopes)
            .field("roles_claim", &self.roles_claim)
            .field("name", &self.name)
            .field("icon", &self.icon)
            .finish()
    }
}

/// Builder for `OpenIdConfig`.
#[derive(Debug)]
pub struct OpenIdConfigBuilder {
    config: OpenIdConfig,
    scopes: Vec<String>,
}

impl OpenIdConfigBuilder {
    /// Creates a builder with the required fields.
    #[must_use]
    pub fn new(
        provider_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_url: impl Into<String>,
    ) -> Self {
        Self {
            config: OpenIdConfig {
                enabled: true,
                provider_url: provider_url.into(),
                client_id: client_id.into(),
                client_secret: client_secret.into(),
                redirect_url: redirect_url.into(),
                ..OpenIdConfig::default()
            },
            scopes: vec![
                "openid".to_string(),
                "profile".to_string(),
                "email".to_string(),
            ],
        }
    }

    /// Adds a scope unless already present.
    #[must_use]
    pub fn add_scope(mut self, scope: impl Into<String>) -> Self {
        let scope = scope.into();
        if !self.scopes.contains(&scope) {
            self.scopes.push(scope);
        }
        self
    }

    #[must_use]
    pub fn roles_claim(mut self, path: impl Into<String>) -> Self {
        self.config.roles_claim = Some(path.into());
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    #[must_use]
    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.config.icon = Some(icon.into());
        self
    }

    #[must_use]
    pub fn build(mut self) -> OpenIdConfig {
        self.config.scopes = self.scopes.join(",");
        self.config
    }
}
