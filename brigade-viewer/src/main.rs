use brigade_common::{logging, store};
use brigade_viewer::app::ViewerApp;
use brigade_viewer::config::ViewerConfig;
use brigade_viewer::live::LiveConnection;
use brigade_viewer::poll::PollFallback;
use brigade_viewer::render::TracingRenderer;

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = ViewerConfig::load()?;

    // Initialize logging
    let _logging_guard = logging::init_logging(&config.log_dir, "brigade-viewer", &config.log_level)?;

    tracing::info!("Brigade viewer starting...");

    let (events_tx, events_rx) = mpsc::channel(256);
    let mut tasks = Vec::new();

    let connection = Arc::new(LiveConnection::new(
        config.live_url.clone(),
        config.reconnect_interval(),
    ));
    tasks.push(connection.start(events_tx.clone()));

    match &config.store {
        Some(store_config) => {
            let store = store::connect(store_config)?;
            let poll = PollFallback::new(store, config.poll_interval(), config.poll_window());
            tasks.push(poll.start(events_tx.clone()));
        }
        None => tracing::warn!("No [store] configured; polling fallback disabled"),
    }
    drop(events_tx);

    let mut app = ViewerApp::new(TracingRenderer::new(), config.animation_steps);

    tokio::select! {
        _ = app.run(events_rx, config.frame_interval()) => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutdown signal received.");
        }
    }

    for task in tasks {
        task.abort();
    }
    tracing::info!("Viewer stopped with {} markers on the map", app.markers().len());
    Ok(())
}
