//! Signed-in sessions.
//!
//! A session is a freshly issued token pair whose refresh-token digest has
//! been written to the user row, replacing any earlier one.

use rootcause::prelude::Report;
use serde::Serialize;
use tracing::debug;

use crate::directory::UserDirectory;
use crate::error::AuthError;
use crate::token::{AuthType, TokenCodec, TokenPair};
use crate::user::User;

/// The user and token pair returned by every successful sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub user: User,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

/// Issues a pair for `user` and persists its refresh digest.
pub(crate) async fn establish(
    users: &dyn UserDirectory,
    codec: &TokenCodec,
    mut user: User,
    auth_type: AuthType,
    roles: Option<Vec<String>>,
) -> Result<Session, Report<AuthError>> {
    let tokens = codec
        .issue_pair(&user, auth_type, roles)
        .map_err(AuthError::internal)?;
    let digest = TokenCodec::hash_refresh(&tokens.refresh_token);

    users
        .update_refresh_token_hash(user.id(), Some(&digest))
        .await
        .map_err(AuthError::store)?;
    user.set_refresh_token_hash(Some(digest));

    debug!(user_id = %user.id(), %auth_type, "session established");
    Ok(Session { user, tokens })
}
