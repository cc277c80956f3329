mod auth;
mod extract;
mod handlers;
mod request_tracing;
mod routes;

pub use auth::{CurrentUser, SESSION_COOKIE};

use axum::extract::DefaultBodyLimit;
use axum::{middleware, routing::get, Router};
use sqlx::{Pool, Sqlite};

use crate::config::AppConfig;
use crate::storage::FileStore;

#[derive(Clone)]
pub struct AppState {
    pub db: Pool<Sqlite>,
    pub files: FileStore,
    pub session_ttl: chrono::Duration,
}

impl AppState {
    pub fn new(db: Pool<Sqlite>, config: &AppConfig) -> Self {
        Self {
            db,
            files: FileStore::new(config.media_root.clone(), config.storage_timeout),
            session_ttl: config.session_ttl,
        }
    }
}

pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(|| async { "Backend is running" }))
        .nest("/api", routes::api_routes())
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(middleware::from_fn(request_tracing::request_tracing_middleware))
        .with_state(state)
}

pub async fn run_server(pool: Pool<Sqlite>, config: &AppConfig) -> anyhow::Result<()> {
    let state = AppState::new(pool, config);
    let app = build_router(state, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, media_root = %config.media_root.display(), "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
