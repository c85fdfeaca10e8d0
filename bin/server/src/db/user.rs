//! User directory over the `users` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rootcause::prelude::Report;
use sqlx::{FromRow, PgPool};
use waymark_core::{StoreError, UserId};
use waymark_identity::{NewUser, PasswordHasher, User, UserDirectory};

use super::store_error;

const USER_COLUMNS: &str = "id, username, password_hash, firstname, lastname, active, \
                            refresh_token_hash, created_at, updated_at";

/// Row type for user queries.
#[derive(FromRow)]
struct UserRow {
    id: i64,
    username: String,
    password_hash: Option<String>,
    firstname: String,
    lastname: String,
    active: bool,
    refresh_token_hash: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User::with_all_fields(
            UserId::new(row.id),
            row.username,
            row.password_hash,
            row.firstname,
            row.lastname,
            row.active,
            row.refresh_token_hash,
            row.created_at,
            row.updated_at,
        )
    }
}

/// User directory backed by Postgres.
pub struct PgUserDirectory {
    pool: PgPool,
    hasher: PasswordHasher,
}

impl PgUserDirectory {
    /// Creates a new user directory.
    pub fn new(pool: PgPool, hasher: PasswordHasher) -> Self {
        Self { pool, hasher }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, Report<StoreError>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(row.map(User::from))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, Report<StoreError>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(row.map(User::from))
    }

    async fn find_or_create(&self, template: NewUser) -> Result<User, Report<StoreError>> {
        let sql = format!(
            "INSERT INTO users (username, password_hash, firstname, lastname, active) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (username) DO NOTHING \
             RETURNING {USER_COLUMNS}"
        );
        let inserted: Option<UserRow> = sqlx::query_as(&sql)
            .bind(&template.username)
            .bind(&template.password_hash)
            .bind(&template.firstname)
            .bind(&template.lastname)
            .bind(template.active)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

        if let Some(row) = inserted {
            tracing::info!(user_id = row.id, username = %row.username, "user created");
            return Ok(row.into());
        }

        self.find_by_username(&template.username)
            .await?
            .ok_or_else(|| {
                StoreError::unavailable(format!(
                    "user {} vanished during find-or-create",
                    template.username
                ))
                .into()
            })
    }

    async fn update_password(&self, id: UserId, plaintext: &str) -> Result<(), Report<StoreError>> {
        let digest = self
            .hasher
            .hash_async(plaintext)
            .await
            .map_err(|e| StoreError::Encoding {
                reason: e.to_string(),
            })?;

        sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
            .bind(id.get())
            .bind(digest)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn update_refresh_token_hash(
        &self,
        id: UserId,
        hash: Option<&str>,
    ) -> Result<(), Report<StoreError>> {
        sqlx::query("UPDATE users SET refresh_token_hash = $2, updated_at = now() WHERE id = $1")
            .bind(id.get())
            .bind(hash.filter(|h| !h.is_empty()))
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(())
    }
}
