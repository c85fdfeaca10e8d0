//! HTTP router for the waymark server.

use axum::Router;
use axum::routing::{get, post};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::auth::{AppState, routes};

/// Builds the router over the shared state.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/auth/login", post(routes::login))
        .route("/auth/refresh", post(routes::refresh))
        .route("/auth/logout", post(routes::logout))
        .route("/auth/me", get(routes::me))
        .route("/auth/openid", get(routes::openid_info))
        .route("/auth/openid/login", get(routes::openid_login))
        .route("/auth/openid/callback", get(routes::openid_callback))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
