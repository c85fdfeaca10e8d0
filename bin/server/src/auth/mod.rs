//! Authentication surface of the waymark server.
//!
//! This module provides:
//! - Password login, refresh and logout over JSON
//! - OpenID Connect sign-in with a state cookie binding the callback
//! - The `RequireAuth` extractor validating access tokens
//!
//! Handlers return the session as JSON; clients carry the access token in
//! the configured header and trade the refresh token for a new pair.

pub mod middleware;
pub mod routes;

use rootcause::prelude::Report;
use std::sync::Arc;
use waymark_authz::{Authorizer, PermissionStore};
use waymark_identity::{
    AuthService, IdentityProvider, OidcService, OpenIdConfig, PasswordHasher,
    RequestAuthenticator, TokenCodec, TokenError, UserDirectory,
};

use crate::config::ServerConfig;

pub use middleware::RequireAuth;

/// Shared application state.
pub struct AppState {
    /// Password sign-in and session rotation.
    pub auth: AuthService,
    /// OpenID sign-in, present when federation is enabled.
    pub oidc: Option<OidcService>,
    /// Federation settings, for the login page.
    pub openid: OpenIdConfig,
    /// Access-token validation.
    pub authenticator: RequestAuthenticator,
    /// Permission decisions.
    pub authorizer: Authorizer,
    /// Whether to set the Secure flag on cookies.
    pub secure_cookies: bool,
}

impl AppState {
    /// Wires the services over the given stores.
    ///
    /// `provider` is ignored unless federation is enabled in `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the token signing secret is unusable.
    pub fn new(
        config: &ServerConfig,
        users: Arc<dyn UserDirectory>,
        permissions: Arc<dyn PermissionStore>,
        hasher: PasswordHasher,
        provider: Option<Arc<dyn IdentityProvider>>,
    ) -> Result<Self, Report<TokenError>> {
        let codec = TokenCodec::new(&config.jwt)?;

        let oidc = provider
            .filter(|_| config.openid.enabled())
            .map(|provider| OidcService::new(provider, users.clone(), codec.clone()));

        Ok(Self {
            auth: AuthService::new(users.clone(), codec.clone(), hasher),
            oidc,
            openid: config.openid.clone(),
            authenticator: RequestAuthenticator::new(codec, users, config.jwt.header_name()),
            authorizer: Authorizer::new(permissions),
            secure_cookies: config.secure_cookies,
        })
    }
}
