use crate::config::settings::AppConfig;
use crate::infrastructure::db::open_video_store;
use crate::modules::jobs::service::JobService;
use crate::state::AppState;
use crate::workers::watcher::LibraryWatcher;
use anyhow::Context;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub fn create_app(state: AppState) -> Router {
    crate::routes::configure_routes()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(config: AppConfig) -> anyhow::Result<()> {
    info!("Starting job server...");
    info!("Library: {}", config.library_dir.display());
    info!("Data: {}", config.data_dir.display());

    let library = open_video_store(&config).await?;
    let state = AppState::new(config, library);

    if state.config.initial_scan {
        if let Err(e) = JobService::initial_scan_if_empty(&state).await {
            warn!("Initial scan check failed: {}", e);
        }
    }

    let _watcher = if state.config.watch_library {
        match LibraryWatcher::start(state.clone()) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                warn!("Library watcher disabled: {:#}", e);
                None
            }
        }
    } else {
        None
    };

    let addr = format!("0.0.0.0:{}", state.config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Server running on http://{}", addr);
    info!("Swagger UI at http://{}/swagger-ui", addr);

    axum::serve(listener, create_app(state))
        .await
        .context("Server error")?;
    Ok(())
}
