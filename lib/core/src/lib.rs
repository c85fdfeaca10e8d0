//! Core types and utilities for the waymark redirect management service.
//!
//! This crate provides the foundational types shared by the identity and
//! authorization crates: error handling, strongly-typed ids, and the
//! namespace/project scope codes every permission is expressed in.

pub mod error;
pub mod id;
pub mod scope;

pub use error::{Result, StoreError};
pub use id::{ParseIdError, RoleId, UserId};
pub use scope::Scope;
