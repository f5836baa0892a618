use brigade_common::{SharedStore, now_millis, store::latest_per_unit};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::app::ViewerEvent;

/// Periodic read of the durable store, used alongside the live channel so
/// the map stays current while the channel is down.
pub struct PollFallback {
    store: SharedStore,
    interval: Duration,
    window: Duration,
}

impl PollFallback {
    pub fn new(store: SharedStore, interval: Duration, window: Duration) -> Self {
        Self {
            store,
            interval,
            window,
        }
    }

    /// Latest row per unit within the window.
    pub async fn poll_once(&self) -> anyhow::Result<Vec<brigade_common::PositionRecord>> {
        let window_ms = i64::try_from(self.window.as_millis()).unwrap_or(i64::MAX);
        let since = now_millis().saturating_sub(window_ms);
        let rows = self.store.recent_positions(since).await?;
        Ok(latest_per_unit(rows))
    }

    /// The first poll runs immediately.
    pub fn start(self, events: mpsc::Sender<ViewerEvent>) -> JoinHandle<()> {
        tracing::info!(
            "Polling store every {:?} (window: {:?})",
            self.interval,
            self.window
        );

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                ticker.tick().await;
                match self.poll_once().await {
                    Ok(records) => {
                        tracing::debug!("Poll returned {} units", records.len());
                        if events.send(ViewerEvent::Poll(records)).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => tracing::warn!("Store poll failed: {}", e),
                }
            }
        })
    }
}
