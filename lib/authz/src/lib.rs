//! Authorization engine for waymark.
//!
//! Subjects hold roles; roles hold resource permissions scoped to a
//! namespace/project pair and admin permissions scoped to a management
//! section. This crate provides:
//! - The permission model (`Role`, `ResourcePermission`, `AdminPermission`)
//! - The rule table answering "allowed?" (`can_resource`, `can_admin`)
//! - The query-filter compiler pushing the same rules into SQL (`ScopeFilter`)
//! - The `PermissionStore` contract and the `Authorizer` facade over it
//!
//! # Example
//!
//! ```
//! use waymark_authz::{
//!     ActionType, ResourcePermission, ResourceType, SubjectPermissions, can_resource,
//!     filter_by_namespace_project,
//! };
//!
//! let permissions = SubjectPermissions {
//!     resources: vec![ResourcePermission::new(
//!         "marketing",
//!         "*",
//!         ResourceType::Redirect,
//!         ActionType::All,
//!     )],
//!     admin: Vec::new(),
//! };
//!
//! assert!(can_resource(
//!     &permissions,
//!     "marketing",
//!     "spring-sale",
//!     ResourceType::Redirect,
//!     ActionType::Write,
//! ));
//!
//! let filter = filter_by_namespace_project(&permissions, ActionType::Read);
//! assert!(filter.admits("marketing", "spring-sale"));
//! assert!(!filter.admits("support", "faq"));
//! ```

pub mod authorizer;
pub mod filter;
pub mod rules;
pub mod store;
pub mod types;

pub use authorizer::{Authorizer, Subject};
pub use filter::{
    Joiner, ScopeClause, ScopeFilter, filter_by_namespace, filter_by_namespace_project,
    filter_by_project,
};
pub use rules::{can_admin, can_resource};
pub use store::{MemoryPermissionStore, PermissionStore};
pub use types::{
    ActionType, AdminPermission, ResourcePermission, ResourceType, Role, RoleType, SectionType,
    SubjectPermissions,
};
