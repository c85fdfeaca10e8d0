use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use waymark_authz::PermissionStore;
use waymark_identity::{IdentityProvider, OidcClient, PasswordHasher, UserDirectory};
use waymark_server::{
    app,
    auth::AppState,
    config::ServerConfig,
    db::{PgPermissionStore, PgUserDirectory},
};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::load().expect("failed to load configuration");
    tracing::info!("Loaded configuration");

    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("failed to run migrations");

    let hasher = PasswordHasher::new();
    let users: Arc<dyn UserDirectory> =
        Arc::new(PgUserDirectory::new(db_pool.clone(), hasher.clone()));
    let permissions: Arc<dyn PermissionStore> = Arc::new(PgPermissionStore::new(db_pool));

    let provider: Option<Arc<dyn IdentityProvider>> = if config.openid.enabled() {
        tracing::info!("Discovering OpenID provider...");
        let client = OidcClient::discover(config.openid.clone())
            .await
            .expect("failed to discover OpenID provider");
        Some(Arc::new(client))
    } else {
        None
    };

    let state = AppState::new(&config, users, permissions, hasher, provider)
        .expect("invalid token configuration");
    let app = app::router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
