//! Access-token authentication for incoming calls.

use rootcause::prelude::Report;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;
use waymark_core::UserId;

use crate::directory::UserDirectory;
use crate::error::AuthError;
use crate::token::{AuthType, TokenCodec, TokenType};

/// Identity attached to an authenticated call.
///
/// Carries no permissions; those are fetched fresh for every decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallContext {
    pub user_id: UserId,
    pub username: String,
    pub auth_type: AuthType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
}

/// Validates the access token carried in a configurable header.
#[derive(Clone)]
pub struct RequestAuthenticator {
    codec: TokenCodec,
    users: Arc<dyn UserDirectory>,
    header_name: String,
}

impl RequestAuthenticator {
    pub fn new(
        codec: TokenCodec,
        users: Arc<dyn UserDirectory>,
        header_name: impl Into<String>,
    ) -> Self {
        Self {
            codec,
            users,
            header_name: header_name.into(),
        }
    }

    /// The header the access token is read from.
    #[must_use]
    pub fn header_name(&self) -> &str {
        &self.header_name
    }

    /// Authenticates a call from its header value.
    ///
    /// Every rejection is `Unauthenticated`, apart from store failures.
    pub async fn authenticate(
        &self,
        header_value: Option<&str>,
    ) -> Result<CallContext, Report<AuthError>> {
        let unauthenticated = |reason: &str| AuthError::Unauthenticated {
            reason: reason.to_string(),
        };

        let token = header_value
            .map(bearer_token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| unauthenticated("missing access token"))?;

        let claims = self
            .codec
            .verify(token)
            .map_err(|e| unauthenticated(&e.current_context().to_string()))?;
        if claims.token_type != TokenType::Access {
            return Err(unauthenticated("not an access token").into());
        }

        let user = self
            .users
            .find_by_id(claims.user_id)
            .await
            .map_err(AuthError::store)?
            .ok_or_else(|| unauthenticated("unknown user"))?;
        if !user.is_active() {
            debug!(user_id = %user.id(), "inactive user rejected");
            return Err(unauthenticated("user is inactive").into());
        }

        Ok(CallContext {
            user_id: user.id(),
            username: user.username().to_string(),
            auth_type: claims.auth_type,
            roles: claims.roles,
        })
    }
}

/// Strips an optional `Bearer ` scheme prefix.
fn bearer_token(value: &str) -> &str {
    let value = value.trim();
    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") => token.trim(),
        _ => value,
    }
}
