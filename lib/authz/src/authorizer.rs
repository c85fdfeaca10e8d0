//! Store-backed authorization facade.
//!
//! Every decision fetches the subject's permissions fresh, so role changes
//! take effect on the next request. The `must_*` variants treat a store
//! failure as a denial.

use rootcause::prelude::Report;
use std::fmt;
use std::sync::Arc;
use tracing::{instrument, warn};
use waymark_core::StoreError;

use crate::filter::{self, ScopeFilter};
use crate::rules;
use crate::store::PermissionStore;
use crate::types::{ActionType, ResourceType, SectionType, SubjectPermissions};

/// Whose permissions a decision is made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject<'a> {
    /// A user, through every role bound to it.
    Username(&'a str),
    /// A single role.
    RoleCode(&'a str),
}

impl fmt::Display for Subject<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Username(username) => write!(f, "user:{username}"),
            Self::RoleCode(code) => write!(f, "role:{code}"),
        }
    }
}

/// Answers authorization questions for subjects held in a [`PermissionStore`].
#[derive(Clone)]
pub struct Authorizer {
    store: Arc<dyn PermissionStore>,
}

impl Authorizer {
    /// Creates a facade over `store`.
    pub fn new(store: Arc<dyn PermissionStore>) -> Self {
        Self { store }
    }

    /// Fetches the subject's flattened permissions.
    #[instrument(skip_all, fields(subject = %subject))]
    pub async fn permissions(
        &self,
        subject: Subject<'_>,
    ) -> Result<SubjectPermissions, Report<StoreError>> {
        match subject {
            Subject::Username(username) => self.store.permissions_by_username(username).await,
            Subject::RoleCode(code) => self.store.permissions_by_role_code(code).await,
        }
    }

    /// Fetches the subject's permissions, or none if the store fails.
    async fn permissions_or_none(&self, subject: Subject<'_>) -> SubjectPermissions {
        match self.permissions(subject).await {
            Ok(permissions) => permissions,
            Err(err) => {
                warn!(subject = %subject, error = %err, "permission lookup failed, denying");
                SubjectPermissions::none()
            }
        }
    }

    /// Whether the subject may perform `action` on `resource` in the scope.
    pub async fn can_resource(
        &self,
        subject: Subject<'_>,
        namespace: &str,
        project: &str,
        resource: ResourceType,
        action: ActionType,
    ) -> Result<bool, Report<StoreError>> {
        let permissions = self.permissions(subject).await?;
        Ok(rules::can_resource(
            &permissions,
            namespace,
            project,
            resource,
            action,
        ))
    }

    /// Like [`Self::can_resource`], denying on store failure.
    pub async fn must_can_resource(
        &self,
        subject: Subject<'_>,
        namespace: &str,
        project: &str,
        resource: ResourceType,
        action: ActionType,
    ) -> bool {
        let permissions = self.permissions_or_none(subject).await;
        rules::can_resource(&permissions, namespace, project, resource, action)
    }

    /// Whether the subject may perform `action` on the admin `section`.
    pub async fn can_admin(
        &self,
        subject: Subject<'_>,
        section: SectionType,
        action: ActionType,
    ) -> Result<bool, Report<StoreError>> {
        let permissions = self.permissions(subject).await?;
        Ok(rules::can_admin(&permissions, section, action))
    }

    /// Like [`Self::can_admin`], denying on store failure.
    pub async fn must_can_admin(
        &self,
        subject: Subject<'_>,
        section: SectionType,
        action: ActionType,
    ) -> bool {
        let permissions = self.permissions_or_none(subject).await;
        rules::can_admin(&permissions, section, action)
    }

    /// Compiles [`filter::filter_by_namespace`] for the subject.
    pub async fn namespace_filter(
        &self,
        subject: Subject<'_>,
        action: ActionType,
    ) -> Result<ScopeFilter, Report<StoreError>> {
        let permissions = self.permissions(subject).await?;
        Ok(filter::filter_by_namespace(&permissions, action))
    }

    /// Like [`Self::namespace_filter`], hiding every row on store failure.
    pub async fn must_namespace_filter(
        &self,
        subject: Subject<'_>,
        action: ActionType,
    ) -> ScopeFilter {
        let permissions = self.permissions_or_none(subject).await;
        filter::filter_by_namespace(&permissions, action)
    }

    /// Compiles [`filter::filter_by_project`] for the subject.
    pub async fn project_filter(
        &self,
        subject: Subject<'_>,
        namespace: &str,
        action: ActionType,
    ) -> Result<ScopeFilter, Report<StoreError>> {
        let permissions = self.permissions(subject).await?;
        Ok(filter::filter_by_project(&permissions, namespace, action))
    }

    /// Like [`Self::project_filter`], hiding every row on store failure.
    pub async fn must_project_filter(
        &self,
        subject: Subject<'_>,
        namespace: &str,
        action: ActionType,
    ) -> ScopeFilter {
        let permissions = self.permissions_or_none(subject).await;
        filter::filter_by_project(&permissions, namespace, action)
    }

    /// Compiles [`filter::filter_by_namespace_project`] for the subject.
    pub async fn namespace_project_filter(
        &self,
        subject: Subject<'_>,
        action: ActionType,
    ) -> Result<ScopeFilter, Report<StoreError>> {
        let permissions = self.permissions(subject).await?;
        Ok(filter::filter_by_namespace_project(&permissions, action))
    }

    /// Like [`Self::namespace_project_filter`], hiding every row on store
    /// failure.
    pub async fn must_namespace_project_filter(
        &self,
        subject: Subject<'_>,
        action: ActionType,
    ) -> ScopeFilter {
        let permissions = self.permissions_or_none(subject).await;
        filter::filter_by_namespace_project(&permissions, action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryPermissionStore;
    use crate::types::{AdminPermission, ResourcePermission, Role, RoleType};
    use waymark_core::RoleId;

    async fn authorizer() -> (Arc<MemoryPermissionStore>, Authorizer) {
        let store = Arc::new(MemoryPermissionStore::new());
        store
            .put_role(
                Role::new(RoleId::new(1), "editors", RoleType::Role)
                    .with_resource(ResourcePermission::new(
                        "ns1",
                        "*",
                        ResourceType::Redirect,
                        ActionType::All,
                    ))
                    .with_admin(AdminPermission::new(SectionType::Projects, ActionType::Read)),
            )
            .await;
        store
            .put_role(
                Role::new(RoleId::new(2), "alice", RoleType::User).with_resource(
                    ResourcePermission::new("ns2", "prj1", ResourceType::Page, ActionType::Read),
                ),
            )
            .await;
        store.bind("alice", "editors").await;
        store.bind("alice", "alice").await;

        let authorizer = Authorizer::new(store.clone());
        (store, authorizer)
    }

    #[tokio::test]
    async fn username_subject_uses_union_of_roles() {
        let (_, authorizer) = authorizer().await;
        let alice = Subject::Username("alice");

        assert!(
            authorizer
                .can_resource(alice, "ns1", "any", ResourceType::Redirect, ActionType::Write)
                .await
                .expect("check")
        );
        assert!(
            authorizer
                .can_resource(alice, "ns2", "prj1", ResourceType::Page, ActionType::Read)
                .await
                .expect("check")
        );
        assert!(
            !authorizer
                .can_resource(alice, "ns2", "prj1", ResourceType::Page, ActionType::Write)
                .await
                .expect("check")
        );
    }

    #[tokio::test]
    async fn role_code_subject_uses_single_role() {
        let (_, authorizer) = authorizer().await;
        let editors = Subject::RoleCode("editors");

        assert!(
            !authorizer
                .can_resource(editors, "ns2", "prj1", ResourceType::Page, ActionType::Read)
                .await
                .expect("check")
        );
        assert!(
            authorizer
                .can_admin(editors, SectionType::Projects, ActionType::Read)
                .await
                .expect("check")
        );
    }

    #[tokio::test]
    async fn revocation_applies_to_next_decision() {
        let (store, authorizer) = authorizer().await;
        let alice = Subject::Username("alice");

        assert!(
            authorizer
                .must_can_resource(alice, "ns1", "x", ResourceType::Redirect, ActionType::Read)
                .await
        );

        store.unbind("alice", "editors").await;

        assert!(
            !authorizer
                .must_can_resource(alice, "ns1", "x", ResourceType::Redirect, ActionType::Read)
                .await
        );
    }

    #[tokio::test]
    async fn must_variants_fail_closed() {
        let (store, authorizer) = authorizer().await;
        store.set_unavailable(true).await;
        let alice = Subject::Username("alice");

        assert!(
            authorizer
                .can_resource(alice, "ns1", "x", ResourceType::Redirect, ActionType::Read)
                .await
                .is_err()
        );
        assert!(
            !authorizer
                .must_can_resource(alice, "ns1", "x", ResourceType::Redirect, ActionType::Read)
                .await
        );
        assert!(
            !authorizer
                .must_can_admin(alice, SectionType::Projects, ActionType::Read)
                .await
        );
        assert_eq!(
            authorizer
                .must_namespace_project_filter(alice, ActionType::Read)
                .await,
            ScopeFilter::DenyAll
        );
        assert_eq!(
            authorizer.must_namespace_filter(alice, ActionType::Read).await,
            ScopeFilter::DenyAll
        );
        assert_eq!(
            authorizer
                .must_project_filter(alice, "ns1", ActionType::Read)
                .await,
            ScopeFilter::DenyAll
        );
    }

    #[tokio::test]
    async fn filters_for_subject() {
        let (_, authorizer) = authorizer().await;
        let alice = Subject::Username("alice");

        let filter = authorizer
            .namespace_project_filter(alice, ActionType::Read)
            .await
            .expect("filter");
        assert!(filter.admits("ns1", "anything"));
        assert!(filter.admits("ns2", "prj1"));
        assert!(!filter.admits("ns2", "prj2"));

        let filter = authorizer
            .project_filter(alice, "ns2", ActionType::Read)
            .await
            .expect("filter");
        assert!(filter.admits("ns2", "prj1"));
        assert!(!filter.admits("ns1", "prj1"));

        let filter = authorizer
            .namespace_filter(alice, ActionType::Write)
            .await
            .expect("filter");
        assert!(filter.admits("ns1", ""));
        assert!(!filter.admits("ns2", ""));
    }
}
