//! Authentication for waymark.
//!
//! This crate provides:
//! - Users and the `UserDirectory` contract, which also holds each user's
//!   outstanding refresh-token digest
//! - Session tokens (`TokenCodec`) and Argon2id passwords (`PasswordHasher`)
//! - Password sign-in with refresh-token rotation (`AuthService`)
//! - OpenID Connect sign-in (`OidcService` over an `IdentityProvider`)
//! - Access-token checking for incoming calls (`RequestAuthenticator`)
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use waymark_identity::{
//!     AuthService, JwtConfig, MemoryUserDirectory, NewUser, PasswordHasher, TokenCodec,
//! };
//!
//! # let rt = tokio::runtime::Runtime::new().unwrap();
//! # rt.block_on(async {
//! let hasher = PasswordHasher::with_params(8, 1, 1).unwrap();
//! let users = Arc::new(MemoryUserDirectory::with_hasher(hasher.clone()));
//! users.insert_with_password(NewUser::new("alice"), "pw").await.unwrap();
//!
//! let codec = TokenCodec::new(&JwtConfig::new("0123456789abcdef0123456789abcdef")).unwrap();
//! let service = AuthService::new(users, codec, hasher);
//!
//! let session = service.login("alice", "pw").await.unwrap();
//! let rotated = service.refresh(&session.tokens.refresh_token).await.unwrap();
//! assert!(service.refresh(&session.tokens.refresh_token).await.is_err());
//! service.logout(rotated.user.id()).await.unwrap();
//! # });
//! ```

pub mod auth;
pub mod authenticator;
pub mod config;
pub mod directory;
pub mod error;
pub mod federation;
pub mod oidc;
pub mod password;
pub mod provider;
pub mod session;
pub mod token;
pub mod user;
pub mod userinfo;

// Re-export main types at crate root
pub use auth::AuthService;
pub use authenticator::{CallContext, RequestAuthenticator};
pub use config::{JwtConfig, MIN_SECRET_LEN};
pub use directory::{MemoryUserDirectory, UserDirectory};
pub use error::{AuthError, OidcError, PasswordError, TokenError};
pub use federation::{LoginInitiation, OidcService, generate_state};
pub use oidc::{OpenIdConfig, OpenIdConfigBuilder};
pub use password::PasswordHasher;
pub use provider::{IdToken, IdentityProvider, LoginBinding, OAuthToken, OidcClient};
pub use session::Session;
pub use token::{AuthType, Claims, TokenCodec, TokenPair, TokenType};
pub use user::{NewUser, User};
pub use userinfo::UserInfo;
