pub mod api;
pub mod config;
pub mod error;
pub mod storage;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::storage::{UploadStore, XlsxStore};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub store: XlsxStore,
    pub uploads: Arc<UploadStore>,
}

/// Build the application router
pub fn app(config: &Config) -> anyhow::Result<Router> {
    let uploads = Arc::new(UploadStore::new(&config.upload_dir)?);
    let state = AppState {
        store: XlsxStore,
        uploads,
    };

    let router = Router::new()
        .merge(api::router())
        .nest_service("/uploads", ServeDir::new(&config.upload_dir))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    Ok(router)
}

/// Run the server with the given configuration
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    // Uploads are served from this directory, so it must exist up front
    tokio::fs::create_dir_all(&config.upload_dir).await?;

    let app = app(&config)?;

    // Start the server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!(
        upload_dir = %config.upload_dir.display(),
        "Server listening on {}",
        addr
    );

    axum::serve(listener, app).await?;

    Ok(())
}
