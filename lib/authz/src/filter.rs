//! Query-filter compiler.
//!
//! List endpoints must never return rows the subject cannot see. Instead of
//! checking every row after the fact, the permission set is compiled into a
//! [`ScopeFilter`] and appended to the caller's query as a `WHERE` fragment
//! over the `namespace_code` and `project_code` columns.
//!
//! Filtered rows do not carry a resource type, so compilation evaluates the
//! rule table with [`ResourceType::Any`]. A compiled filter admits a row
//! exactly when [`crate::rules::can_resource`] would allow it.

use sqlx::{Postgres, QueryBuilder};
use std::collections::{BTreeMap, BTreeSet};
use waymark_core::Scope;

use crate::rules;
use crate::types::{ActionType, ResourcePermission, ResourceType, SubjectPermissions};

/// Column holding a row's namespace code.
pub const NAMESPACE_COLUMN: &str = "namespace_code";

/// Column holding a row's project code.
pub const PROJECT_COLUMN: &str = "project_code";

/// How the fragment attaches to the caller's query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Joiner {
    /// The query has no `WHERE` clause yet.
    Where,
    /// Conjoin with an existing `WHERE` clause.
    And,
}

impl Joiner {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Where => " WHERE ",
            Self::And => " AND ",
        }
    }
}

/// One disjunct of a compiled filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeClause {
    /// `namespace_code IN (..)`
    NamespaceIn(BTreeSet<String>),
    /// `project_code IN (..)`, in any namespace.
    ProjectIn(BTreeSet<String>),
    /// `namespace_code = ..`
    NamespaceIs(String),
    /// `namespace_code = .. AND project_code IN (..)`
    ProjectsIn {
        namespace: String,
        projects: BTreeSet<String>,
    },
}

impl ScopeClause {
    /// Evaluates the clause against a row.
    #[must_use]
    pub fn admits(&self, namespace: &str, project: &str) -> bool {
        match self {
            Self::NamespaceIn(namespaces) => namespaces.contains(namespace),
            Self::ProjectIn(projects) => projects.contains(project),
            Self::NamespaceIs(own) => own == namespace,
            Self::ProjectsIn {
                namespace: own,
                projects,
            } => own == namespace && projects.contains(project),
        }
    }

    fn push_onto<'args>(&self, qb: &mut QueryBuilder<'args, Postgres>) {
        match self {
            Self::NamespaceIn(namespaces) => push_in(qb, NAMESPACE_COLUMN, namespaces),
            Self::ProjectIn(projects) => push_in(qb, PROJECT_COLUMN, projects),
            Self::NamespaceIs(namespace) => {
                qb.push(NAMESPACE_COLUMN)
                    .push(" = ")
                    .push_bind(namespace.clone());
            }
            Self::ProjectsIn {
                namespace,
                projects,
            } => {
                qb.push(NAMESPACE_COLUMN)
                    .push(" = ")
                    .push_bind(namespace.clone())
                    .push(" AND ");
                push_in(qb, PROJECT_COLUMN, projects);
            }
        }
    }
}

fn push_in<'args>(qb: &mut QueryBuilder<'args, Postgres>, column: &str, values: &BTreeSet<String>) {
    qb.push(column).push(" IN (");
    let mut separated = qb.separated(", ");
    for value in values {
        separated.push_bind(value.clone());
    }
    separated.push_unseparated(")");
}

/// A compiled authorization filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeFilter {
    /// Every row is visible; nothing is appended.
    Unrestricted,
    /// No row is visible; appends `1 = 0`.
    DenyAll,
    /// A row is visible if any clause admits it. Never empty.
    AnyOf(Vec<ScopeClause>),
}

impl ScopeFilter {
    fn from_clauses(clauses: Vec<ScopeClause>) -> Self {
        if clauses.is_empty() {
            Self::DenyAll
        } else {
            Self::AnyOf(clauses)
        }
    }

    /// Evaluates the filter against a row in memory.
    #[must_use]
    pub fn admits(&self, namespace: &str, project: &str) -> bool {
        match self {
            Self::Unrestricted => true,
            Self::DenyAll => false,
            Self::AnyOf(clauses) => clauses.iter().any(|c| c.admits(namespace, project)),
        }
    }

    /// Appends the filter to `qb`. Values are always bound, never inlined.
    pub fn push_onto<'args>(&self, qb: &mut QueryBuilder<'args, Postgres>, joiner: Joiner) {
        match self {
            Self::Unrestricted => {}
            Self::DenyAll => {
                qb.push(joiner.as_sql()).push("1 = 0");
            }
            Self::AnyOf(clauses) => {
                qb.push(joiner.as_sql());
                if let [clause] = clauses.as_slice() {
                    clause.push_onto(qb);
                    return;
                }
                qb.push("(");
                for (i, clause) in clauses.iter().enumerate() {
                    if i > 0 {
                        qb.push(" OR ");
                    }
                    qb.push("(");
                    clause.push_onto(qb);
                    qb.push(")");
                }
                qb.push(")");
            }
        }
    }
}

/// Permissions that can contribute to a row-level decision for `action`.
fn applicable(
    permissions: &SubjectPermissions,
    action: ActionType,
) -> impl Iterator<Item = &ResourcePermission> {
    permissions.resources.iter().filter(move |p| {
        rules::resource_matches(p.resource, ResourceType::Any)
            && rules::action_matches(p.action, action)
    })
}

/// Restricts rows to the namespaces the subject may touch with `action`.
#[must_use]
pub fn filter_by_namespace(permissions: &SubjectPermissions, action: ActionType) -> ScopeFilter {
    let mut namespaces = BTreeSet::new();
    for permission in applicable(permissions, action) {
        match &permission.namespace {
            Scope::Any => return ScopeFilter::Unrestricted,
            Scope::Exact(namespace) => {
                namespaces.insert(namespace.clone());
            }
        }
    }

    if namespaces.is_empty() {
        ScopeFilter::DenyAll
    } else {
        ScopeFilter::AnyOf(vec![ScopeClause::NamespaceIn(namespaces)])
    }
}

/// Restricts rows to the projects of `namespace` the subject may touch with
/// `action`. Rows outside `namespace` are never admitted.
#[must_use]
pub fn filter_by_project(
    permissions: &SubjectPermissions,
    namespace: &str,
    action: ActionType,
) -> ScopeFilter {
    let mut projects = BTreeSet::new();
    for permission in applicable(permissions, action).filter(|p| p.namespace.matches(namespace)) {
        match &permission.project {
            Scope::Any => {
                return ScopeFilter::AnyOf(vec![ScopeClause::NamespaceIs(namespace.to_string())]);
            }
            Scope::Exact(project) => {
                projects.insert(project.clone());
            }
        }
    }

    if projects.is_empty() {
        ScopeFilter::DenyAll
    } else {
        ScopeFilter::AnyOf(vec![ScopeClause::ProjectsIn {
            namespace: namespace.to_string(),
            projects,
        }])
    }
}

/// Restricts rows across all namespaces to the namespace/project pairs the
/// subject may touch with `action`.
#[must_use]
pub fn filter_by_namespace_project(
    permissions: &SubjectPermissions,
    action: ActionType,
) -> ScopeFilter {
    let mut full_namespaces = BTreeSet::new();
    let mut any_namespace_projects = BTreeSet::new();
    let mut scoped: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for permission in applicable(permissions, action) {
        match (&permission.namespace, &permission.project) {
            (Scope::Any, Scope::Any) => return ScopeFilter::Unrestricted,
            (Scope::Exact(namespace), Scope::Any) => {
                full_namespaces.insert(namespace.clone());
            }
            (Scope::Any, Scope::Exact(project)) => {
                any_namespace_projects.insert(project.clone());
            }
            (Scope::Exact(namespace), Scope::Exact(project)) => {
                scoped
                    .entry(namespace.clone())
                    .or_default()
                    .insert(project.clone());
            }
        }
    }

    // Full access to a namespace subsumes its project lists.
    scoped.retain(|namespace, _| !full_namespaces.contains(namespace));

    let mut clauses = Vec::new();
    if !full_namespaces.is_empty() {
        clauses.push(ScopeClause::NamespaceIn(full_namespaces));
    }
    if !any_namespace_projects.is_empty() {
        clauses.push(ScopeClause::ProjectIn(any_namespace_projects));
    }
    clauses.extend(
        scoped
            .into_iter()
            .map(|(namespace, projects)| ScopeClause::ProjectsIn {
                namespace,
                projects,
            }),
    );

    ScopeFilter::from_clauses(clauses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::can_resource;

    const BASE: &str = "SELECT id FROM redirects";
    const BASE_WITH_WHERE: &str = "SELECT id FROM redirects WHERE deleted_at IS NULL";

    fn perms(resources: Vec<ResourcePermission>) -> SubjectPermissions {
        SubjectPermissions {
            resources,
            admin: Vec::new(),
        }
    }

    fn rendered(filter: &ScopeFilter, joiner: Joiner) -> String {
        let base = match joiner {
            Joiner::Where => BASE,
            Joiner::And => BASE_WITH_WHERE,
        };
        let mut qb = QueryBuilder::<Postgres>::new(base);
        filter.push_onto(&mut qb, joiner);
        qb.sql().to_string()
    }

    #[test]
    fn namespace_filter_emits_false_when_action_does_not_match() {
        let perms = perms(vec![ResourcePermission::new(
            "ns1",
            "prj1",
            ResourceType::All,
            ActionType::Write,
        )]);

        let filter = filter_by_namespace(&perms, ActionType::Read);

        assert_eq!(filter, ScopeFilter::DenyAll);
        assert_eq!(
            rendered(&filter, Joiner::Where),
            "SELECT id FROM redirects WHERE 1 = 0"
        );
    }

    #[test]
    fn namespace_filter_wildcard_adds_nothing() {
        let perms = perms(vec![
            ResourcePermission::new("ns1", "prj1", ResourceType::Redirect, ActionType::Read),
            ResourcePermission::new("*", "prj2", ResourceType::Page, ActionType::All),
        ]);

        let filter = filter_by_namespace(&perms, ActionType::Read);

        assert_eq!(filter, ScopeFilter::Unrestricted);
        assert_eq!(rendered(&filter, Joiner::And), BASE_WITH_WHERE);
    }

    #[test]
    fn namespace_filter_collects_distinct_namespaces() {
        let perms = perms(vec![
            ResourcePermission::new("ns2", "prj1", ResourceType::Redirect, ActionType::Read),
            ResourcePermission::new("ns1", "*", ResourceType::All, ActionType::All),
            ResourcePermission::new("ns2", "prj2", ResourceType::Page, ActionType::Read),
            ResourcePermission::new("ns3", "*", ResourceType::All, ActionType::Write),
        ]);

        let filter = filter_by_namespace(&perms, ActionType::Read);

        assert_eq!(
            filter,
            ScopeFilter::AnyOf(vec![ScopeClause::NamespaceIn(BTreeSet::from([
                "ns1".to_string(),
                "ns2".to_string(),
            ]))])
        );
        assert_eq!(
            rendered(&filter, Joiner::Where),
            "SELECT id FROM redirects WHERE namespace_code IN ($1, $2)"
        );
    }

    #[test]
    fn project_filter_with_project_wildcard_scopes_to_namespace_only() {
        let perms = perms(vec![
            ResourcePermission::new("ns1", "prj1", ResourceType::All, ActionType::Read),
            ResourcePermission::new("*", "*", ResourceType::Redirect, ActionType::Read),
        ]);

        let filter = filter_by_project(&perms, "ns1", ActionType::Read);

        assert_eq!(
            filter,
            ScopeFilter::AnyOf(vec![ScopeClause::NamespaceIs("ns1".to_string())])
        );
        assert_eq!(
            rendered(&filter, Joiner::And),
            "SELECT id FROM redirects WHERE deleted_at IS NULL AND namespace_code = $1"
        );
    }

    #[test]
    fn project_filter_collects_exact_and_wildcard_namespace_rows() {
        let perms = perms(vec![
            ResourcePermission::new("ns1", "prj1", ResourceType::All, ActionType::Read),
            ResourcePermission::new("*", "prj2", ResourceType::All, ActionType::All),
            ResourcePermission::new("ns2", "prj3", ResourceType::All, ActionType::Read),
        ]);

        let filter = filter_by_project(&perms, "ns1", ActionType::Read);

        assert_eq!(
            filter,
            ScopeFilter::AnyOf(vec![ScopeClause::ProjectsIn {
                namespace: "ns1".to_string(),
                projects: BTreeSet::from(["prj1".to_string(), "prj2".to_string()]),
            }])
        );
        assert_eq!(
            rendered(&filter, Joiner::Where),
            "SELECT id FROM redirects WHERE namespace_code = $1 AND project_code IN ($2, $3)"
        );
    }

    #[test]
    fn project_filter_empty_is_false() {
        let perms = perms(vec![ResourcePermission::new(
            "ns2",
            "*",
            ResourceType::All,
            ActionType::All,
        )]);

        assert_eq!(
            filter_by_project(&perms, "ns1", ActionType::Read),
            ScopeFilter::DenyAll
        );
    }

    #[test]
    fn global_filter_full_wildcard_is_unrestricted() {
        let perms = perms(vec![ResourcePermission::new(
            "*",
            "*",
            ResourceType::Page,
            ActionType::Read,
        )]);

        assert_eq!(
            filter_by_namespace_project(&perms, ActionType::Read),
            ScopeFilter::Unrestricted
        );
    }

    #[test]
    fn global_filter_partitions_namespaces() {
        let perms = perms(vec![
            ResourcePermission::new("ns1", "*", ResourceType::All, ActionType::Read),
            ResourcePermission::new("ns1", "prj7", ResourceType::All, ActionType::Read),
            ResourcePermission::new("ns2", "prj1", ResourceType::All, ActionType::Read),
            ResourcePermission::new("ns2", "prj2", ResourceType::All, ActionType::All),
            ResourcePermission::new("*", "shared", ResourceType::All, ActionType::Read),
        ]);

        let filter = filter_by_namespace_project(&perms, ActionType::Read);

        assert_eq!(
            filter,
            ScopeFilter::AnyOf(vec![
                ScopeClause::NamespaceIn(BTreeSet::from(["ns1".to_string()])),
                ScopeClause::ProjectIn(BTreeSet::from(["shared".to_string()])),
                ScopeClause::ProjectsIn {
                    namespace: "ns2".to_string(),
                    projects: BTreeSet::from(["prj1".to_string(), "prj2".to_string()]),
                },
            ])
        );
        assert_eq!(
            rendered(&filter, Joiner::Where),
            "SELECT id FROM redirects WHERE ((namespace_code IN ($1)) OR (project_code IN ($2)) \
             OR (namespace_code = $3 AND project_code IN ($4, $5)))"
        );
    }

    #[test]
    fn global_filter_nothing_qualifies() {
        let perms = perms(vec![ResourcePermission::new(
            "ns1",
            "*",
            ResourceType::All,
            ActionType::Write,
        )]);

        let filter = filter_by_namespace_project(&perms, ActionType::Read);

        assert_eq!(filter, ScopeFilter::DenyAll);
        assert_eq!(
            rendered(&filter, Joiner::And),
            "SELECT id FROM redirects WHERE deleted_at IS NULL AND 1 = 0"
        );
    }

    const NAMESPACE_CODES: [&str; 3] = ["*", "ns1", "ns2"];
    const PROJECT_CODES: [&str; 3] = ["*", "p1", "p2"];
    const ROW_NAMESPACES: [&str; 3] = ["ns1", "ns2", "ns3"];
    const ROW_PROJECTS: [&str; 3] = ["p1", "p2", "p3"];
    const ACTIONS: [ActionType; 3] = [ActionType::All, ActionType::Read, ActionType::Write];
    const RESOURCES: [ResourceType; 2] = [ResourceType::All, ResourceType::Redirect];

    fn universe() -> Vec<ResourcePermission> {
        let mut all = Vec::new();
        for namespace in NAMESPACE_CODES {
            for project in PROJECT_CODES {
                for resource in RESOURCES {
                    for action in ACTIONS {
                        all.push(ResourcePermission::new(namespace, project, resource, action));
                    }
                }
            }
        }
        all
    }

    /// Every permission set of up to two permissions drawn from the universe.
    fn permission_sets() -> Vec<SubjectPermissions> {
        let universe = universe();
        let mut sets = vec![perms(Vec::new())];
        for (i, first) in universe.iter().enumerate() {
            sets.push(perms(vec![first.clone()]));
            for second in &universe[i + 1..] {
                sets.push(perms(vec![first.clone(), second.clone()]));
            }
        }
        sets
    }

    #[test]
    fn global_filter_agrees_with_row_checks() {
        for perms in permission_sets() {
            for action in ACTIONS {
                let filter = filter_by_namespace_project(&perms, action);
                for namespace in ROW_NAMESPACES {
                    for project in ROW_PROJECTS {
                        assert_eq!(
                            filter.admits(namespace, project),
                            can_resource(&perms, namespace, project, ResourceType::Any, action),
                            "perms={perms:?} action={action} row=({namespace}, {project})"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn project_filter_agrees_with_row_checks() {
        for perms in permission_sets() {
            for action in ACTIONS {
                for scope in ROW_NAMESPACES {
                    let filter = filter_by_project(&perms, scope, action);
                    for namespace in ROW_NAMESPACES {
                        for project in ROW_PROJECTS {
                            let expected = namespace == scope
                                && can_resource(
                                    &perms,
                                    namespace,
                                    project,
                                    ResourceType::Any,
                                    action,
                                );
                            assert_eq!(
                                filter.admits(namespace, project),
                                expected,
                                "perms={perms:?} action={action} scope={scope} row=({namespace}, {project})"
                            );
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn namespace_filter_agrees_with_row_checks() {
        for perms in permission_sets() {
            for action in ACTIONS {
                let filter = filter_by_namespace(&perms, action);
                for namespace in ROW_NAMESPACES {
                    let expected = ROW_PROJECTS.iter().any(|project| {
                        can_resource(&perms, namespace, project, ResourceType::Any, action)
                    });
                    assert_eq!(
                        filter.admits(namespace, ""),
                        expected,
                        "perms={perms:?} action={action} namespace={namespace}"
                    );
                }
            }
        }
    }
}
