//! The authorization rule table.
//!
//! A permission grants a request when every field matches, each field either
//! equal to the requested value or the wildcard. The in-memory checks here and
//! the query filters in [`crate::filter`] both go through these functions.

use crate::types::{ActionType, ResourceType, SectionType, SubjectPermissions};

/// Returns true if a permission on `granted` covers a request for `requested`.
///
/// A request for [`ResourceType::Any`] asks for any kind of access and is
/// covered by every permission.
#[must_use]
pub fn resource_matches(granted: ResourceType, requested: ResourceType) -> bool {
    granted == ResourceType::All || requested == ResourceType::Any || granted == requested
}

/// Returns true if a permission granting `granted` covers `requested`.
#[must_use]
pub fn action_matches(granted: ActionType, requested: ActionType) -> bool {
    granted == ActionType::All || granted == requested
}

/// Returns true if a permission on `granted` covers `requested`.
#[must_use]
pub fn section_matches(granted: SectionType, requested: SectionType) -> bool {
    granted == SectionType::All || granted == requested
}

/// Answers whether the permissions allow `action` on `resource` in the
/// given namespace and project.
#[must_use]
pub fn can_resource(
    permissions: &SubjectPermissions,
    namespace: &str,
    project: &str,
    resource: ResourceType,
    action: ActionType,
) -> bool {
    permissions
        .resources
        .iter()
        .any(|p| p.grants(namespace, project, resource, action))
}

/// Answers whether the permissions allow `action` on the admin `section`.
#[must_use]
pub fn can_admin(permissions: &SubjectPermissions, section: SectionType, action: ActionType) -> bool {
    permissions.admin.iter().any(|p| p.grants(section, action))
}
