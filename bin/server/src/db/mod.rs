//! Postgres-backed stores for waymark.
//!
//! This module provides data access for:
//! - Users, including the outstanding refresh-token digest
//! - Roles and their bindings to users

pub mod role;
pub mod user;

pub use role::PgPermissionStore;
pub use user::PgUserDirectory;

use waymark_core::StoreError;

/// Maps a driver error onto the store taxonomy.
fn store_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => StoreError::corrupt(err),
        other => StoreError::unavailable(other),
    }
}
