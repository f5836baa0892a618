use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info};

use super::state::LiveState;

/// Periodic probe of every viewer session.
///
/// A session that has not answered the previous probe by the next tick is
/// dropped, so a dead connection is detected within one to two periods.
pub struct LivenessMonitor {
    state: Arc<LiveState>,
    period: Duration,
}

impl LivenessMonitor {
    pub fn new(state: Arc<LiveState>, period: Duration) -> Self {
        Self { state, period }
    }

    pub fn start(self) -> tokio::task::JoinHandle<()> {
        info!("Starting liveness monitor (period: {:?})", self.period);

        tokio::spawn(async move {
            let mut ticker = interval(self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately; sessions get a full period first
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let report = self.state.hub().probe_sweep().await;
                if report.evicted > 0 {
                    info!(
                        "Liveness sweep: {} probed, {} evicted",
                        report.probed, report.evicted
                    );
                } else {
                    debug!("Liveness sweep: {} probed", report.probed);
                }
            }
        })
    }
}
