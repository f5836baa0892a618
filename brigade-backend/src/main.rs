use brigade_backend::config::BackendConfig;
use brigade_backend::live::LiveState;
use brigade_backend::scheduled::{ScheduledTaskConfig, ScheduledTaskManager, warm_up_cache};
use brigade_backend::service::{AppState, build_router};
use brigade_common::{logging, store};

use anyhow::{Context, Result};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = BackendConfig::load()?;

    // Initialize logging
    let _logging_guard = logging::init_logging(&config.log_dir, "brigade-backend", &config.log_level)?;

    tracing::info!("Brigade backend starting...");
    tracing::info!("Server will listen on {}", config.server_address());

    let store = store::connect(&config.store)?;
    let live = Arc::new(LiveState::new(config.session_queue_capacity));

    warm_up_cache(store.as_ref(), &live, config.warmup_window()).await;

    let mut task_manager = ScheduledTaskManager::new(ScheduledTaskConfig::from(&config), live.clone());
    task_manager.start_all();

    let app = build_router(AppState::new(live, store), config.enable_cors);
    let listener = tokio::net::TcpListener::bind(config.server_address())
        .await
        .with_context(|| format!("Failed to bind {}", config.server_address()))?;

    tracing::info!("HTTP server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutdown signal received.");
        })
        .await?;

    task_manager.shutdown().await;
    Ok(())
}
