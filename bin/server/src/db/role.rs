//! Permission store over the `roles` and `user_roles` tables.

use async_trait::async_trait;
use rootcause::prelude::Report;
use sqlx::{FromRow, PgPool};
use waymark_authz::{
    AdminPermission, PermissionStore, ResourcePermission, Role, RoleType, SubjectPermissions,
};
use waymark_core::{RoleId, StoreError};

use super::store_error;

/// Row type for role queries. Permission lists are read as JSON text.
#[derive(FromRow)]
struct RoleRow {
    id: i64,
    code: String,
    role_type: String,
    resources: String,
    admin: String,
}

impl TryFrom<RoleRow> for Role {
    type Error = StoreError;

    fn try_from(row: RoleRow) -> Result<Self, Self::Error> {
        let role_type = RoleType::parse(&row.role_type).ok_or_else(|| {
            StoreError::corrupt(format!("role {} has unknown type {}", row.code, row.role_type))
        })?;
        let resources: Vec<ResourcePermission> = serde_json::from_str(&row.resources)
            .map_err(|e| StoreError::corrupt(format!("role {} resources: {e}", row.code)))?;
        let admin: Vec<AdminPermission> = serde_json::from_str(&row.admin)
            .map_err(|e| StoreError::corrupt(format!("role {} admin: {e}", row.code)))?;

        Ok(Role {
            id: RoleId::new(row.id),
            code: row.code,
            role_type,
            resources,
            admin,
        })
    }
}

/// Permission store backed by Postgres.
pub struct PgPermissionStore {
    pool: PgPool,
}

impl PgPermissionStore {
    /// Creates a new permission store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn flatten(rows: Vec<RoleRow>) -> Result<SubjectPermissions, Report<StoreError>> {
        let roles = rows
            .into_iter()
            .map(Role::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SubjectPermissions::from_roles(&roles))
    }
}

#[async_trait]
impl PermissionStore for PgPermissionStore {
    async fn permissions_by_username(
        &self,
        username: &str,
    ) -> Result<SubjectPermissions, Report<StoreError>> {
        let rows: Vec<RoleRow> = sqlx::query_as(
            r#"
            SELECT r.id, r.code, r.type AS role_type,
                   r.resources::text AS resources, r.admin::text AS admin
            FROM roles r
            JOIN user_roles ur ON ur.role_id = r.id
            JOIN users u ON u.id = ur.user_id
            WHERE u.username = $1
            "#,
        )
        .bind(username)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        Self::flatten(rows)
    }

    async fn permissions_by_role_code(
        &self,
        code: &str,
    ) -> Result<SubjectPermissions, Report<StoreError>> {
        let rows: Vec<RoleRow> = sqlx::query_as(
            r#"
            SELECT id, code, type AS role_type,
                   resources::text AS resources, admin::text AS admin
            FROM roles
            WHERE code = $1
            "#,
        )
        .bind(code)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        Self::flatten(rows)
    }
}
