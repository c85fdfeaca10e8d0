//! Signed session tokens.
//!
//! Access and refresh tokens are HS256 JWTs sharing one key. Only a SHA-256
//! digest of the refresh token is persisted, so a leaked user table cannot
//! be replayed while exact-match revocation still works.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use ulid::Ulid;
use waymark_core::UserId;

use crate::config::{JwtConfig, MIN_SECRET_LEN};
use crate::error::TokenError;
use crate::user::User;

/// Which half of a pair a token is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// How the session was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    Password,
    OpenId,
}

impl AuthType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Password => "password",
            Self::OpenId => "openid",
        }
    }
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: UserId,
    pub username: String,
    pub token_type: TokenType,
    pub auth_type: AuthType,
    /// Federation-supplied roles. Advisory only; permissions are always
    /// fetched from the permission store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
    /// Unique token id, so two pairs issued in the same second differ.
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

/// An access/refresh token pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Issues and verifies session tokens.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    access_ttl: i64,
    refresh_ttl: i64,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("issuer", &self.issuer)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Builds a codec, rejecting secrets shorter than 32 bytes.
    pub fn new(config: &JwtConfig) -> Result<Self, Report<TokenError>> {
        let secret = config.secret().as_bytes();
        if secret.len() < MIN_SECRET_LEN {
            return Err(TokenError::Config {
                reason: format!(
                    "signing secret must be at least {MIN_SECRET_LEN} bytes, got {}",
                    secret.len()
                ),
            }
            .into());
        }
        let ttl = |seconds: u64| {
            i64::try_from(seconds).map_err(|_| TokenError::Config {
                reason: format!("token ttl out of range: {seconds}"),
            })
        };

        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            issuer: config.issuer().to_string(),
            access_ttl: ttl(config.access_token_ttl())?,
            refresh_ttl: ttl(config.refresh_token_ttl())?,
        })
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Issues an access and a refresh token for `user`.
    pub fn issue_pair(
        &self,
        user: &User,
        auth_type: AuthType,
        roles: Option<Vec<String>>,
    ) -> Result<TokenPair, Report<TokenError>> {
        let now = Utc::now().timestamp();
        let claims = |token_type: TokenType, ttl: i64| Claims {
            user_id: user.id(),
            username: user.username().to_string(),
            token_type,
            auth_type,
            roles: roles.clone(),
            jti: Ulid::new().to_string(),
            iat: now,
            exp: now + ttl,
            iss: self.issuer.clone(),
        };

        Ok(TokenPair {
            access_token: self.sign(&claims(TokenType::Access, self.access_ttl))?,
            refresh_token: self.sign(&claims(TokenType::Refresh, self.refresh_ttl))?,
        })
    }

    fn sign(&self, claims: &Claims) -> Result<String, Report<TokenError>> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding).map_err(|e| {
            TokenError::Signing {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Checks signature, expiry and issuer, returning the claims.
    pub fn verify(&self, token: &str) -> Result<Claims, Report<TokenError>> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_aud = false;
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss"]);

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired.into(),
                _ => TokenError::Invalid {
                    reason: e.to_string(),
                }
                .into(),
            })
    }

    /// One-way digest of a refresh token for persistence.
    ///
    /// Deterministic across processes; compared by equality only.
    #[must_use]
    pub fn hash_refresh(token: &str) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest(token.as_bytes()))
    }
}

#[cfg(test)]
pub(crate) const TEST_SECRET: &str = "0123456789abcdef0123456789abcdef";
