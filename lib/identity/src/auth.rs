//! Password sign-in, refresh-token rotation and sign-out.
//!
//! Each user has at most one outstanding refresh token. Signing in or
//! refreshing replaces it; signing out clears it. Concurrent refreshes with
//! the same token race on the stored digest and the last write wins.
//!
//! Unknown users and users without a password still pay for one Argon2
//! verification, against a placeholder digest.

use rootcause::prelude::Report;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, instrument, warn};
use waymark_core::UserId;

use crate::directory::UserDirectory;
use crate::error::{AuthError, TokenError};
use crate::password::PasswordHasher;
use crate::session::{self, Session};
use crate::token::{AuthType, TokenCodec, TokenType};

/// Plaintext behind the placeholder digest.
const PLACEHOLDER_PASSWORD: &str = "waymark-placeholder";

/// Password and refresh-token authentication.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserDirectory>,
    codec: TokenCodec,
    hasher: PasswordHasher,
    /// Hashed with `hasher` on first use.
    placeholder_digest: Arc<OnceCell<String>>,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserDirectory>, codec: TokenCodec, hasher: PasswordHasher) -> Self {
        Self {
            users,
            codec,
            hasher,
            placeholder_digest: Arc::new(OnceCell::new()),
        }
    }

    /// Signs a user in with a password.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, Report<AuthError>> {
        let Some(user) = self
            .users
            .find_by_username(username)
            .await
            .map_err(AuthError::store)?
        else {
            self.verify_placeholder(password).await;
            return Err(AuthError::UserNotFound {
                username: username.to_string(),
            }
            .into());
        };

        let Some(digest) = user.password_hash().filter(|_| user.has_password()) else {
            self.verify_placeholder(password).await;
            info!("user has no password");
            return Err(AuthError::InvalidCredentials.into());
        };

        let matches = self
            .hasher
            .verify_async(password, digest)
            .await
            .map_err(AuthError::internal)?;
        if !matches {
            info!("password mismatch");
            return Err(AuthError::InvalidCredentials.into());
        }

        if !user.is_active() {
            return Err(AuthError::UserInactive {
                username: username.to_string(),
            }
            .into());
        }

        let session =
            session::establish(self.users.as_ref(), &self.codec, user, AuthType::Password, None)
                .await?;
        info!(user_id = %session.user.id(), "password login");
        Ok(session)
    }

    /// Runs one discarded verification against the placeholder digest.
    async fn verify_placeholder(&self, password: &str) {
        let digest = self
            .placeholder_digest
            .get_or_try_init(|| self.hasher.hash_async(PLACEHOLDER_PASSWORD))
            .await;
        match digest {
            Ok(digest) => {
                let _ = self.hasher.verify_async(password, digest).await;
            }
            Err(e) => warn!(error = %e, "placeholder digest unavailable"),
        }
    }

    /// Exchanges a refresh token for a new pair, revoking the old one.
    #[instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &str) -> Result<Session, Report<AuthError>> {
        let claims = self.codec.verify(refresh_token).map_err(|e| {
            let reason = match e.current_context() {
                TokenError::Expired => "refresh token has expired".to_string(),
                other => other.to_string(),
            };
            AuthError::TokenInvalid { reason }
        })?;
        if claims.token_type != TokenType::Refresh {
            return Err(AuthError::TokenInvalid {
                reason: "not a refresh token".to_string(),
            }
            .into());
        }

        let user = self
            .users
            .find_by_id(claims.user_id)
            .await
            .map_err(AuthError::store)?
            .ok_or_else(|| AuthError::UserNotFound {
                username: claims.username.clone(),
            })?;
        if !user.is_active() {
            return Err(AuthError::UserInactive {
                username: user.username().to_string(),
            }
            .into());
        }

        let presented = TokenCodec::hash_refresh(refresh_token);
        if user.refresh_token_hash() != Some(presented.as_str()) {
            warn!(user_id = %user.id(), "revoked refresh token presented");
            return Err(AuthError::InvalidCredentials.into());
        }

        session::establish(
            self.users.as_ref(),
            &self.codec,
            user,
            claims.auth_type,
            claims.roles,
        )
        .await
    }

    /// Revokes the user's refresh token. Idempotent.
    #[instrument(skip(self))]
    pub async fn logout(&self, user_id: UserId) -> Result<(), Report<AuthError>> {
        self.users
            .update_refresh_token_hash(user_id, None)
            .await
            .map_err(AuthError::store)?;
        info!("logged out");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;
    use crate::directory::MemoryUserDirectory;
    use crate::password::cheap_hasher;
    use crate::token::TEST_SECRET;
    use crate::user::NewUser;

    struct Fixture {
        users: Arc<MemoryUserDirectory>,
        codec: TokenCodec,
        service: AuthService,
    }

    async fn fixture() -> Fixture {
        let users = Arc::new(MemoryUserDirectory::with_hasher(cheap_hasher()));
        users
            .insert_with_password(NewUser::new("u"), "pw")
            .await
            .expect("seed");
        let codec = TokenCodec::new(&JwtConfig::new(TEST_SECRET)).expect("codec");
        let service = AuthService::new(users.clone(), codec.clone(), cheap_hasher());
        Fixture {
            users,
            codec,
            service,
        }
    }

    async fn stored_hash(users: &MemoryUserDirectory, username: &str) -> Option<String> {
        users
            .find_by_username(username)
            .await
            .expect("find")
            .expect("present")
            .refresh_token_hash()
            .map(str::to_string)
    }

    fn kind(err: &Report<AuthError>) -> &AuthError {
        err.current_context()
    }

    #[tokio::test]
    async fn login_issues_pair_and_stores_digest() {
        let f = fixture().await;

        let session = f.service.login("u", "pw").await.expect("login");

        assert_eq!(session.user.username(), "u");
        assert_eq!(
            stored_hash(&f.users, "u").await,
            Some(TokenCodec::hash_refresh(&session.tokens.refresh_token))
        );
        let claims = f.codec.verify(&session.tokens.access_token).expect("verify");
        assert_eq!(claims.auth_type, AuthType::Password);
        assert_eq!(claims.token_type, TokenType::Access);
    }

    #[tokio::test]
    async fn login_with_bad_password_is_invalid_credentials() {
        let f = fixture().await;

        let err = f.service.login("u", "bad").await.unwrap_err();

        assert_eq!(kind(&err), &AuthError::InvalidCredentials);
        assert_eq!(stored_hash(&f.users, "u").await, None);
    }

    #[tokio::test]
    async fn login_unknown_user_is_distinguishable() {
        let f = fixture().await;

        assert!(!f.service.placeholder_digest.initialized());

        let err = f.service.login("nobody", "pw").await.unwrap_err();

        assert!(matches!(kind(&err), AuthError::UserNotFound { username } if username == "nobody"));
        assert!(f.service.placeholder_digest.initialized());
    }

    #[tokio::test]
    async fn login_without_password_is_invalid_credentials() {
        let f = fixture().await;
        f.users
            .find_or_create(NewUser::new("federated"))
            .await
            .expect("create");

        let err = f.service.login("federated", "").await.unwrap_err();

        assert_eq!(kind(&err), &AuthError::InvalidCredentials);
        assert!(f.service.placeholder_digest.initialized());
    }

    #[tokio::test]
    async fn known_user_never_touches_placeholder() {
        let f = fixture().await;

        f.service.login("u", "pw").await.expect("login");
        f.service.login("u", "bad").await.unwrap_err();

        assert!(!f.service.placeholder_digest.initialized());
    }

    #[tokio::test]
    async fn login_inactive_user_after_password_check() {
        let f = fixture().await;
        let user = f.users.find_by_username("u").await.expect("find").expect("present");
        f.users.set_active(user.id(), false).await.expect("deactivate");

        let err = f.service.login("u", "bad").await.unwrap_err();
        assert_eq!(kind(&err), &AuthError::InvalidCredentials);

        let err = f.service.login("u", "pw").await.unwrap_err();
        assert!(matches!(kind(&err), AuthError::UserInactive { .. }));
    }

    #[tokio::test]
    async fn login_store_failure() {
        let f = fixture().await;
        f.users.set_unavailable(true).await;

        let err = f.service.login("u", "pw").await.unwrap_err();

        assert!(matches!(kind(&err), AuthError::StoreFailure { .. }));
    }

    #[tokio::test]
    async fn refresh_rotates_and_revokes_previous() {
        let f = fixture().await;
        let first = f.service.login("u", "pw").await.expect("login");

        let second = f
            .service
            .refresh(&first.tokens.refresh_token)
            .await
            .expect("refresh");

        assert_ne!(second.tokens.refresh_token, first.tokens.refresh_token);
        assert_eq!(
            stored_hash(&f.users, "u").await,
            Some(TokenCodec::hash_refresh(&second.tokens.refresh_token))
        );

        let err = f
            .service
            .refresh(&first.tokens.refresh_token)
            .await
            .unwrap_err();
        assert_eq!(kind(&err), &AuthError::InvalidCredentials);

        assert!(f.service.refresh(&second.tokens.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn refresh_carries_auth_type_and_roles() {
        let f = fixture().await;
        let user = f.users.find_by_username("u").await.expect("find").expect("present");
        let roles = Some(vec!["ops".to_string()]);
        let first = session::establish(
            f.users.as_ref(),
            &f.codec,
            user,
            AuthType::OpenId,
            roles.clone(),
        )
        .await
        .expect("establish");

        let second = f
            .service
            .refresh(&first.tokens.refresh_token)
            .await
            .expect("refresh");

        let claims = f.codec.verify(&second.tokens.access_token).expect("verify");
        assert_eq!(claims.auth_type, AuthType::OpenId);
        assert_eq!(claims.roles, roles);
    }

    #[tokio::test]
    async fn logout_revokes_refresh_token() {
        let f = fixture().await;
        let session = f.service.login("u", "pw").await.expect("login");

        f.service.logout(session.user.id()).await.expect("logout");
        f.service.logout(session.user.id()).await.expect("logout again");

        assert_eq!(stored_hash(&f.users, "u").await, None);
        let err = f
            .service
            .refresh(&session.tokens.refresh_token)
            .await
            .unwrap_err();
        assert_eq!(kind(&err), &AuthError::InvalidCredentials);
    }

    #[tokio::test]
    async fn access_token_cannot_refresh() {
        let f = fixture().await;
        let session = f.service.login("u", "pw").await.expect("login");

        let err = f
            .service
            .refresh(&session.tokens.access_token)
            .await
            .unwrap_err();

        assert!(matches!(kind(&err), AuthError::TokenInvalid { .. }));
    }

    #[tokio::test]
    async fn garbage_refresh_token_is_invalid() {
        let f = fixture().await;

        let err = f.service.refresh("garbage").await.unwrap_err();

        assert!(matches!(kind(&err), AuthError::TokenInvalid { .. }));
    }

    #[tokio::test]
    async fn refresh_for_deactivated_user() {
        let f = fixture().await;
        let session = f.service.login("u", "pw").await.expect("login");
        f.users
            .set_active(session.user.id(), false)
            .await
            .expect("deactivate");

        let err = f
            .service
            .refresh(&session.tokens.refresh_token)
            .await
            .unwrap_err();

        assert!(matches!(kind(&err), AuthError::UserInactive { .. }));
    }
}
