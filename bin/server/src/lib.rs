//! waymark HTTP server.
//!
//! Thin transport over the identity and authorization crates: configuration,
//! Postgres-backed stores and the authentication routes.

pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
