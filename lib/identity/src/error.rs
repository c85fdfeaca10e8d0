//! Error types for the identity crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `TokenError`: signing and verifying session tokens
//! - `PasswordError`: hashing and checking passwords
//! - `OidcError`: talking to the federation provider
//! - `AuthError`: the authentication outcomes surfaced to transport

use std::fmt;

/// Errors from the token codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The codec cannot be built from its configuration.
    Config { reason: String },
    /// Signature, issuer or payload did not check out.
    Invalid { reason: String },
    /// The token is past its expiry.
    Expired,
    /// Encoding a token failed.
    Signing { reason: String },
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { reason } => write!(f, "token configuration error: {reason}"),
            Self::Invalid { reason } => write!(f, "invalid token: {reason}"),
            Self::Expired => write!(f, "token has expired"),
            Self::Signing { reason } => write!(f, "failed to sign token: {reason}"),
        }
    }
}

impl std::error::Error for TokenError {}

/// Errors from the password hasher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordError {
    /// Hashing failed or a stored digest is malformed.
    Hash { reason: String },
}

impl fmt::Display for PasswordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hash { reason } => write!(f, "password hash error: {reason}"),
        }
    }
}

impl std::error::Error for PasswordError {}

/// Errors from the OpenID Connect provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OidcError {
    /// Discovery or client configuration failed.
    ProviderInit { reason: String },
    /// The authorization code could not be exchanged.
    ExchangeFailed { reason: String },
    /// The ID token failed verification.
    IdTokenInvalid { reason: String },
    /// The ID token claims could not be read.
    ClaimsParseFailed { reason: String },
}

impl fmt::Display for OidcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProviderInit { reason } => write!(f, "OIDC provider initialization failed: {reason}"),
            Self::ExchangeFailed { reason } => write!(f, "OIDC code exchange failed: {reason}"),
            Self::IdTokenInvalid { reason } => write!(f, "invalid ID token: {reason}"),
            Self::ClaimsParseFailed { reason } => {
                write!(f, "failed to parse ID token claims: {reason}")
            }
        }
    }
}

impl std::error::Error for OidcError {}

/// Authentication outcomes.
///
/// `UserNotFound` and `InvalidCredentials` stay distinct here for auditing;
/// transport collapses them before answering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Wrong password, no password set, or a revoked refresh token.
    InvalidCredentials,
    /// No user with this username.
    UserNotFound { username: String },
    /// The user exists but is deactivated.
    UserInactive { username: String },
    /// A presented token could not be used.
    TokenInvalid { reason: String },
    /// A presented token has expired.
    TokenExpired,
    /// The provider returned no ID token.
    IdTokenMissing,
    /// The provider's ID token failed verification.
    IdTokenInvalid { reason: String },
    /// The callback state does not match the one issued.
    InvalidState,
    /// The provider could not complete the exchange.
    ProviderFailed { reason: String },
    /// The request carries no usable access token.
    Unauthenticated { reason: String },
    /// A user or session store failed.
    StoreFailure { reason: String },
    /// Hashing or signing failed.
    Internal { reason: String },
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCredentials => write!(f, "invalid credentials"),
            Self::UserNotFound { username } => write!(f, "user not found: {username}"),
            Self::UserInactive { username } => write!(f, "user is inactive: {username}"),
            Self::TokenInvalid { reason } => write!(f, "invalid token: {reason}"),
            Self::TokenExpired => write!(f, "token has expired"),
            Self::IdTokenMissing => write!(f, "provider returned no ID token"),
            Self::IdTokenInvalid { reason } => write!(f, "invalid ID token: {reason}"),
            Self::InvalidState => write!(f, "OIDC state mismatch"),
            Self::ProviderFailed { reason } => write!(f, "OIDC provider error: {reason}"),
            Self::Unauthenticated { reason } => write!(f, "not authenticated: {reason}"),
            Self::StoreFailure { reason } => write!(f, "store failure: {reason}"),
            Self::Internal { reason } => write!(f, "internal error: {reason}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl AuthError {
    /// Wraps any displayable store error.
    pub fn store(err: impl fmt::Display) -> Self {
        Self::StoreFailure {
            reason: err.to_string(),
        }
    }

    /// Wraps any displayable internal error.
    pub fn internal(err: impl fmt::Display) -> Self {
        Self::Internal {
            reason: err.to_string(),
        }
    }
}
