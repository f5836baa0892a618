//! Background tasks owned by the backend process:
//! - liveness probing of viewer sessions
//! - optional eviction of units that stopped reporting
//! - one-off cache warm-up from the durable store

use brigade_common::{PositionStore, now_millis, store::latest_per_unit};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::config::BackendConfig;
use crate::live::{LiveState, LivenessMonitor};

/// Configuration for scheduled tasks
#[derive(Debug, Clone)]
pub struct ScheduledTaskConfig {
    /// Liveness probe period
    pub probe_interval: Duration,

    /// Units silent for longer than this are dropped from the cache
    pub unit_ttl: Option<Duration>,

    /// How often the eviction sweep runs
    pub eviction_interval: Duration,
}

impl Default for ScheduledTaskConfig {
    fn default() -> Self {
        Self {
            probe_interval: Duration::from_secs(30),
            unit_ttl: None,
            eviction_interval: Duration::from_secs(60),
        }
    }
}

impl From<&BackendConfig> for ScheduledTaskConfig {
    fn from(config: &BackendConfig) -> Self {
        Self {
            probe_interval: config.probe_interval(),
            unit_ttl: config.unit_ttl(),
            eviction_interval: Duration::from_secs(config.eviction_interval_secs),
        }
    }
}

/// Scheduled task manager
pub struct ScheduledTaskManager {
    config: ScheduledTaskConfig,
    live: Arc<LiveState>,
    task_handles: Vec<JoinHandle<()>>,
}

impl ScheduledTaskManager {
    pub fn new(config: ScheduledTaskConfig, live: Arc<LiveState>) -> Self {
        Self {
            config,
            live,
            task_handles: Vec::new(),
        }
    }

    /// Start all scheduled tasks
    pub fn start_all(&mut self) {
        tracing::info!("Starting scheduled task manager...");

        let monitor = LivenessMonitor::new(self.live.clone(), self.config.probe_interval);
        self.task_handles.push(monitor.start());

        match self.config.unit_ttl {
            Some(ttl) => {
                let handle = self.start_eviction_task(ttl);
                self.task_handles.push(handle);
            }
            None => tracing::info!("Unit eviction disabled; cache keeps every unit seen"),
        }

        tracing::info!("Started {} scheduled tasks", self.task_handles.len());
    }

    fn start_eviction_task(&self, ttl: Duration) -> JoinHandle<()> {
        let live = self.live.clone();
        let period = self.config.eviction_interval;

        tracing::info!(
            "Scheduling unit eviction (ttl: {:?}, interval: {:?})",
            ttl,
            period
        );

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                Self::run_eviction(&live, ttl, now_millis()).await;
            }
        })
    }

    async fn run_eviction(live: &LiveState, ttl: Duration, now_ms: i64) -> usize {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let cutoff = now_ms.saturating_sub(ttl_ms);
        live.evict_stale(cutoff).await.len()
    }

    pub fn task_count(&self) -> usize {
        self.task_handles.len()
    }

    /// Gracefully shutdown all tasks
    pub async fn shutdown(self) {
        tracing::info!("Shutting down scheduled task manager...");

        for handle in self.task_handles {
            handle.abort();
        }

        tracing::info!("All scheduled tasks stopped");
    }
}

/// Seed the cache with the latest stored row of every unit reported within
/// `window`. Failure leaves the cache empty; the server still starts.
pub async fn warm_up_cache(store: &dyn PositionStore, live: &LiveState, window: Duration) -> usize {
    let window_ms = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);
    let since = now_millis().saturating_sub(window_ms);

    match store.recent_positions(since).await {
        Ok(rows) => {
            let row_count = rows.len();
            let units = live.seed(latest_per_unit(rows)).await;
            tracing::info!(
                "Position cache warmed up: {} units from {} stored rows",
                units,
                row_count
            );
            units
        }
        Err(e) => {
            tracing::warn!("Cache warm-up skipped, store not readable: {}", e);
            0
        }
    }
}
