//! User persistence contract.
//!
//! The directory also acts as the session store: the single outstanding
//! refresh-token digest is kept on the user row.

use async_trait::async_trait;
use rootcause::prelude::Report;
use tokio::sync::RwLock;
use waymark_core::{StoreError, UserId};

use crate::password::PasswordHasher;
use crate::user::{NewUser, User};

/// Looks up and updates users.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, Report<StoreError>>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, Report<StoreError>>;

    /// Returns the user named by the template, creating it if absent.
    ///
    /// An existing user is returned unchanged.
    async fn find_or_create(&self, template: NewUser) -> Result<User, Report<StoreError>>;

    /// Hashes `plaintext` and stores it as the user's password.
    async fn update_password(&self, id: UserId, plaintext: &str) -> Result<(), Report<StoreError>>;

    /// Stores the outstanding refresh-token digest; `None` clears it.
    async fn update_refresh_token_hash(
        &self,
        id: UserId,
        hash: Option<&str>,
    ) -> Result<(), Report<StoreError>>;
}

#[derive(Debug, Default)]
struct Inner {
    users: Vec<User>,
    last_id: i64,
    unavailable: bool,
}

impl Inner {
    fn check(&self) -> Result<(), Report<StoreError>> {
        if self.unavailable {
            return Err(StoreError::unavailable("memory directory marked unavailable").into());
        }
        Ok(())
    }

    fn get_mut(&mut self, id: UserId) -> Result<&mut User, Report<StoreError>> {
        self.users
            .iter_mut()
            .find(|u| u.id() == id)
            .ok_or_else(|| StoreError::unavailable(format!("no user with id {id}")).into())
    }

    fn create(&mut self, template: NewUser) -> User {
        self.last_id += 1;
        let user = User::from_template(UserId::new(self.last_id), template);
        self.users.push(user.clone());
        user
    }
}

/// In-process user directory for tests and single-node setups.
#[derive(Debug, Default)]
pub struct MemoryUserDirectory {
    inner: RwLock<Inner>,
    hasher: PasswordHasher,
}

impl MemoryUserDirectory {
    /// Creates an empty directory hashing with the default cost.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty directory hashing with `hasher`.
    #[must_use]
    pub fn with_hasher(hasher: PasswordHasher) -> Self {
        Self {
            inner: RwLock::default(),
            hasher,
        }
    }

    /// Creates a user with `plaintext` as its password.
    pub async fn insert_with_password(
        &self,
        template: NewUser,
        plaintext: &str,
    ) -> Result<User, Report<StoreError>> {
        let digest = self.hash(plaintext).await?;
        let mut inner = self.inner.write().await;
        inner.check()?;
        Ok(inner.create(template.with_password_hash(digest)))
    }

    /// Activates or deactivates a user.
    pub async fn set_active(&self, id: UserId, active: bool) -> Result<(), Report<StoreError>> {
        let mut inner = self.inner.write().await;
        inner.get_mut(id)?.set_active(active);
        Ok(())
    }

    /// Makes every operation fail, to exercise store-failure paths.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.inner.write().await.unavailable = unavailable;
    }

    async fn hash(&self, plaintext: &str) -> Result<String, Report<StoreError>> {
        let digest = self
            .hasher
            .hash_async(plaintext)
            .await
            .map_err(|e| StoreError::Encoding {
                reason: e.to_string(),
            })?;
        Ok(digest)
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, Report<StoreError>> {
        let inner = self.inner.read().await;
        inner.check()?;
        Ok(inner.users.iter().find(|u| u.id() == id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, Report<StoreError>> {
        let inner = self.inner.read().await;
        inner.check()?;
        Ok(inner.users.iter().find(|u| u.username() == username).cloned())
    }

    async fn find_or_create(&self, template: NewUser) -> Result<User, Report<StoreError>> {
        let mut inner = self.inner.write().await;
        inner.check()?;
        if let Some(user) = inner.users.iter().find(|u| u.username() == template.username) {
            return Ok(user.clone());
        }
        Ok(inner.create(template))
    }

    async fn update_password(&self, id: UserId, plaintext: &str) -> Result<(), Report<StoreError>> {
        let digest = self.hash(plaintext).await?;
        let mut inner = self.inner.write().await;
        inner.check()?;
        inner.get_mut(id)?.set_password_hash(Some(digest));
        Ok(())
    }

    async fn update_refresh_token_hash(
        &self,
        id: UserId,
        hash: Option<&str>,
    ) -> Result<(), Report<StoreError>> {
        let mut inner = self.inner.write().await;
        inner.check()?;
        inner
            .get_mut(id)?
            .set_refresh_token_hash(hash.map(str::to_string));
        Ok(())
    }
}
