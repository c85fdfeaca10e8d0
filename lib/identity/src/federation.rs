//! Sign-in through the OpenID provider.
//!
//! `begin_auth` hands out a [`LoginBinding`] that transport keeps in a
//! short-lived cookie. `complete_auth` requires the callback to present the
//! same state before any code is exchanged, then proves the exchange with the
//! PKCE verifier and requires the ID token to carry the binding's nonce.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use rand::rngs::OsRng;
use rootcause::prelude::Report;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::directory::UserDirectory;
use crate::error::AuthError;
use crate::provider::{IdentityProvider, LoginBinding};
use crate::session::{self, Session};
use crate::token::{AuthType, TokenCodec};
use crate::user::NewUser;

/// Bytes of randomness in a state value.
const STATE_BYTES: usize = 32;

/// Where to send the browser, and what to remember until it returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginInitiation {
    pub authorization_url: String,
    pub binding: LoginBinding,
}

/// OpenID Connect sign-in.
#[derive(Clone)]
pub struct OidcService {
    provider: Arc<dyn IdentityProvider>,
    users: Arc<dyn UserDirectory>,
    codec: TokenCodec,
}

impl OidcService {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        users: Arc<dyn UserDirectory>,
        codec: TokenCodec,
    ) -> Self {
        Self {
            provider,
            users,
            codec,
        }
    }

    /// Starts a sign-in with a fresh state, nonce and PKCE verifier.
    #[must_use]
    pub fn begin_auth(&self) -> LoginInitiation {
        let binding = LoginBinding::generate();
        LoginInitiation {
            authorization_url: self.provider.auth_url(&binding),
            binding,
        }
    }

    /// Finishes a sign-in from the provider callback.
    ///
    /// Users are created on first sign-in under their email, or their
    /// subject when the provider sends no email.
    #[instrument(skip_all)]
    pub async fn complete_auth(
        &self,
        code: &str,
        received_state: &str,
        expected: &LoginBinding,
    ) -> Result<Session, Report<AuthError>> {
        let expected_state = expected.state.as_str();
        if expected_state.is_empty() || received_state.as_bytes() != expected_state.as_bytes() {
            warn!("state mismatch on callback");
            return Err(AuthError::InvalidState.into());
        }

        let token = self
            .provider
            .exchange(code, &expected.pkce_verifier)
            .await
            .map_err(|e| AuthError::ProviderFailed {
                reason: e.to_string(),
            })?;
        let raw_id_token = token
            .id_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::IdTokenMissing)?;

        let id_token = self
            .provider
            .verify_id_token(raw_id_token, &expected.nonce)
            .await
            .map_err(|e| AuthError::IdTokenInvalid {
                reason: e.to_string(),
            })?;
        let info = self
            .provider
            .user_info(&token, &id_token)
            .map_err(|e| AuthError::IdTokenInvalid {
                reason: e.to_string(),
            })?;

        let user = self
            .users
            .find_or_create(
                NewUser::new(info.username()).with_names(&info.first_name, &info.last_name),
            )
            .await
            .map_err(AuthError::store)?;
        if !user.is_active() {
            return Err(AuthError::UserInactive {
                username: user.username().to_string(),
            }
            .into());
        }

        let session = session::establish(
            self.users.as_ref(),
            &self.codec,
            user,
            AuthType::OpenId,
            info.roles,
        )
        .await?;
        info!(user_id = %session.user.id(), "openid login");
        Ok(session)
    }
}

/// 32 random bytes, base64url without padding.
#[must_use]
pub fn generate_state() -> String {
    let mut bytes = [0u8; STATE_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
