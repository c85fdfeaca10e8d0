//! User domain type.
//!
//! A user signs in with a password, through the OpenID provider, or both.
//! The password digest and the outstanding refresh-token digest live on the
//! record but are never serialized.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use waymark_core::UserId;

/// A user of the management service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    id: UserId,
    /// Globally unique login name.
    username: String,
    /// Password digest; `None` for federation-only users.
    #[serde(skip)]
    password_hash: Option<String>,
    firstname: String,
    lastname: String,
    active: bool,
    /// Digest of the single outstanding refresh token.
    #[serde(skip)]
    refresh_token_hash: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl User {
    /// Creates a user with all fields specified.
    ///
    /// Use this when reconstituting a user from storage.
    #[must_use]
    #[expect(clippy::too_many_arguments)]
    pub fn with_all_fields(
        id: UserId,
        username: String,
        password_hash: Option<String>,
        firstname: String,
        lastname: String,
        active: bool,
        refresh_token_hash: Option<String>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            username,
            password_hash,
            firstname,
            lastname,
            active,
            refresh_token_hash,
            created_at,
            updated_at,
        }
    }

    /// Materializes a template under a freshly assigned id.
    #[must_use]
    pub fn from_template(id: UserId, template: NewUser) -> Self {
        let now = Utc::now();
        Self {
            id,
            username: template.username,
            password_hash: template.password_hash,
            firstname: template.firstname,
            lastname: template.lastname,
            active: template.active,
            refresh_token_hash: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn password_hash(&self) -> Option<&str> {
        self.password_hash.as_deref()
    }

    /// Returns true if the user can sign in with a password.
    #[must_use]
    pub fn has_password(&self) -> bool {
        self.password_hash.as_deref().is_some_and(|h| !h.is_empty())
    }

    #[must_use]
    pub fn firstname(&self) -> &str {
        &self.firstname
    }

    #[must_use]
    pub fn lastname(&self) -> &str {
        &self.lastname
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    #[must_use]
    pub fn refresh_token_hash(&self) -> Option<&str> {
        self.refresh_token_hash.as_deref()
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Replaces the password digest.
    pub fn set_password_hash(&mut self, password_hash: Option<String>) {
        self.password_hash = password_hash;
        self.updated_at = Utc::now();
    }

    /// Replaces the outstanding refresh-token digest. An empty digest clears it.
    pub fn set_refresh_token_hash(&mut self, hash: Option<String>) {
        self.refresh_token_hash = hash.filter(|h| !h.is_empty());
        self.updated_at = Utc::now();
    }

    /// Activates or deactivates the user.
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
        self.updated_at = Utc::now();
    }
}

/// Template for a user that may not exist yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub firstname: String,
    pub lastname: String,
    pub active: bool,
    pub password_hash: Option<String>,
}

impl NewUser {
    /// Creates an active template with no names and no password.
    #[must_use]
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            firstname: String::new(),
            lastname: String::new(),
            active: true,
            password_hash: None,
        }
    }

    #[must_use]
    pub fn with_names(mut self, firstname: impl Into<String>, lastname: impl Into<String>) -> Self {
        self.firstname = firstname.into();
        self.lastname = lastname.into();
        self
    }

    #[must_use]
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    #[must_use]
    pub fn with_password_hash(mut self, password_hash: impl Into<String>) -> Self {
        self.password_hash = Some(password_hash.into());
        self
    }
}
