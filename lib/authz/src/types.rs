//! Role and permission types.
//!
//! A role carries two permission lists: resource permissions scoped to a
//! namespace/project pair, and admin permissions scoped to a management
//! section. A subject's effective permissions are the union over every role
//! bound to it.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use waymark_core::{RoleId, Scope};

use crate::rules;

/// Kinds of domain rows a resource permission can cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    /// Wildcard: the permission covers every resource type.
    #[serde(rename = "*")]
    All,
    /// Query-side only: "any kind of access under this scope".
    Any,
    /// Redirect rules.
    Redirect,
    /// Page rules.
    Page,
    /// Agents serving the rules.
    Agent,
}

impl ResourceType {
    /// Returns the persisted name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "*",
            Self::Any => "any",
            Self::Redirect => "redirect",
            Self::Page => "page",
            Self::Agent => "agent",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Actions a permission can grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    /// Wildcard: the permission grants every action.
    #[serde(rename = "*")]
    All,
    /// Read access.
    Read,
    /// Write access.
    Write,
}

impl ActionType {
    /// Returns the persisted name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "*",
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Management sections guarded by admin permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionType {
    /// Wildcard: the permission covers every section.
    #[serde(rename = "*")]
    All,
    /// User administration.
    Users,
    /// Role administration.
    Roles,
    /// Namespace administration.
    Namespaces,
    /// Project administration.
    Projects,
}

impl SectionType {
    /// Returns the persisted name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "*",
            Self::Users => "users",
            Self::Roles => "roles",
            Self::Namespaces => "namespaces",
            Self::Projects => "projects",
        }
    }
}

impl fmt::Display for SectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Permission to act on resources inside a namespace/project scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourcePermission {
    /// Namespace code, or the wildcard.
    pub namespace: Scope,
    /// Project code, or the wildcard.
    pub project: Scope,
    /// Resource type covered.
    pub resource: ResourceType,
    /// Action granted.
    pub action: ActionType,
}

impl ResourcePermission {
    /// Creates a resource permission.
    #[must_use]
    pub fn new(
        namespace: impl Into<Scope>,
        project: impl Into<Scope>,
        resource: ResourceType,
        action: ActionType,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            project: project.into(),
            resource,
            action,
        }
    }

    /// Returns true if this permission grants `action` on `resource` in the
    /// given namespace and project.
    #[must_use]
    pub fn grants(
        &self,
        namespace: &str,
        project: &str,
        resource: ResourceType,
        action: ActionType,
    ) -> bool {
        self.namespace.matches(namespace)
            && self.project.matches(project)
            && rules::resource_matches(self.resource, resource)
            && rules::action_matches(self.action, action)
    }
}

/// Permission to act on a management section.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdminPermission {
    /// Section covered, or the wildcard.
    pub section: SectionType,
    /// Action granted.
    pub action: ActionType,
}

impl AdminPermission {
    /// Creates an admin permission.
    #[must_use]
    pub fn new(section: SectionType, action: ActionType) -> Self {
        Self { section, action }
    }

    /// Returns true if this permission grants `action` on `section`.
    #[must_use]
    pub fn grants(&self, section: SectionType, action: ActionType) -> bool {
        rules::section_matches(self.section, section) && rules::action_matches(self.action, action)
    }
}

/// Whether a role is shared or attached to a single user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleType {
    /// Reusable role bound to any number of users.
    Role,
    /// Per-user "self" role holding permissions granted to one user.
    User,
}

impl RoleType {
    /// Returns the persisted name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Role => "role",
            Self::User => "user",
        }
    }

    /// Parses the persisted name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "role" => Some(Self::Role),
            "user" => Some(Self::User),
            _ => None,
        }
    }
}

impl fmt::Display for RoleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A named set of permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    /// Unique role code.
    pub code: String,
    #[serde(rename = "type")]
    pub role_type: RoleType,
    #[serde(default)]
    pub resources: Vec<ResourcePermission>,
    #[serde(default)]
    pub admin: Vec<AdminPermission>,
}

impl Role {
    /// Creates a role with no permissions.
    #[must_use]
    pub fn new(id: RoleId, code: impl Into<String>, role_type: RoleType) -> Self {
        Self {
            id,
            code: code.into(),
            role_type,
            resources: Vec::new(),
            admin: Vec::new(),
        }
    }

    /// Adds a resource permission.
    #[must_use]
    pub fn with_resource(mut self, permission: ResourcePermission) -> Self {
        self.resources.push(permission);
        self
    }

    /// Adds an admin permission.
    #[must_use]
    pub fn with_admin(mut self, permission: AdminPermission) -> Self {
        self.admin.push(permission);
        self
    }
}

/// The flattened permissions of a subject across all its roles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectPermissions {
    pub resources: Vec<ResourcePermission>,
    pub admin: Vec<AdminPermission>,
}

impl SubjectPermissions {
    /// Creates an empty permission set (denies everything).
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Unions the permissions of every role, dropping duplicates.
    #[must_use]
    pub fn from_roles<'a>(roles: impl IntoIterator<Item = &'a Role>) -> Self {
        let roles: Vec<&Role> = roles.into_iter().collect();
        let mut permissions = Self::none();
        permissions.merge(
            roles.iter().flat_map(|role| &role.resources),
            roles.iter().flat_map(|role| &role.admin),
        );
        permissions
    }

    /// Adds permissions not already present, keeping first-seen order.
    pub fn merge<'a>(
        &mut self,
        resources: impl IntoIterator<Item = &'a ResourcePermission>,
        admin: impl IntoIterator<Item = &'a AdminPermission>,
    ) {
        extend_unique(&mut self.resources, resources);
        extend_unique(&mut self.admin, admin);
    }

    /// Returns true if no permission is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty() && self.admin.is_empty()
    }
}

fn extend_unique<'a, T>(held: &mut Vec<T>, incoming: impl IntoIterator<Item = &'a T>)
where
    T: Clone + Eq + Hash + 'a,
{
    let mut seen: HashSet<T> = held.iter().cloned().collect();
    for item in incoming {
        if seen.insert(item.clone()) {
            held.push(item.clone());
        }
    }
}
