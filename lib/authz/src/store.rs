//! Permission persistence contract.

use async_trait::async_trait;
use rootcause::prelude::Report;
use std::collections::HashMap;
use tokio::sync::RwLock;
use waymark_core::StoreError;

use crate::types::{Role, SubjectPermissions};

/// Resolves subjects into their flattened permissions.
///
/// Both lookups return the union across every matching role. An unknown
/// subject resolves to an empty set, not an error.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Unions the permissions of every role bound to `username`.
    async fn permissions_by_username(
        &self,
        username: &str,
    ) -> Result<SubjectPermissions, Report<StoreError>>;

    /// Returns the permissions of the role with `code`.
    async fn permissions_by_role_code(
        &self,
        code: &str,
    ) -> Result<SubjectPermissions, Report<StoreError>>;
}

#[derive(Debug, Default)]
struct Inner {
    roles: Vec<Role>,
    bindings: HashMap<String, Vec<String>>,
    unavailable: bool,
}

/// In-process permission store for tests and single-node setups.
#[derive(Debug, Default)]
pub struct MemoryPermissionStore {
    inner: RwLock<Inner>,
}

impl MemoryPermissionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a role, keyed by code.
    pub async fn put_role(&self, role: Role) {
        let mut inner = self.inner.write().await;
        inner.roles.retain(|r| r.code != role.code);
        inner.roles.push(role);
    }

    /// Binds the role with `code` to `username`.
    pub async fn bind(&self, username: &str, code: &str) {
        let mut inner = self.inner.write().await;
        let codes = inner.bindings.entry(username.to_string()).or_default();
        if !codes.iter().any(|c| c == code) {
            codes.push(code.to_string());
        }
    }

    /// Removes every binding of `code` from `username`.
    pub async fn unbind(&self, username: &str, code: &str) {
        let mut inner = self.inner.write().await;
        if let Some(codes) = inner.bindings.get_mut(username) {
            codes.retain(|c| c != code);
        }
    }

    /// Makes every lookup fail, to exercise fail-closed paths.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.inner.write().await.unavailable = unavailable;
    }
}

#[async_trait]
impl PermissionStore for MemoryPermissionStore {
    async fn permissions_by_username(
        &self,
        username: &str,
    ) -> Result<SubjectPermissions, Report<StoreError>> {
        let inner = self.inner.read().await;
        if inner.unavailable {
            return Err(StoreError::unavailable("memory store marked unavailable").into());
        }

        let Some(codes) = inner.bindings.get(username) else {
            return Ok(SubjectPermissions::none());
        };
        Ok(SubjectPermissions::from_roles(
            inner.roles.iter().filter(|r| codes.contains(&r.code)),
        ))
    }

    async fn permissions_by_role_code(
        &self,
        code: &str,
    ) -> Result<SubjectPermissions, Report<StoreError>> {
        let inner = self.inner.read().await;
        if inner.unavailable {
            return Err(StoreError::unavailable("memory store marked unavailable").into());
        }

        Ok(SubjectPermissions::from_roles(
            inner.roles.iter().filter(|r| r.code == code),
        ))
    }
}
