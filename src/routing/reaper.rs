//! Idle sink reaping.
//!
//! # Responsibilities
//! - Periodically expire idle sinks on every router
//! - Exit promptly on the shutdown broadcast

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use crate::routing::router::SiftingRouter;

/// Timer task that calls [`SiftingRouter::reap`] on a fixed interval.
pub struct IdleReaper {
    routers: Vec<Arc<SiftingRouter>>,
    interval: Duration,
}

impl IdleReaper {
    pub fn new(routers: Vec<Arc<SiftingRouter>>, interval: Duration) -> Self {
        Self { routers, interval }
    }

    /// Reap interval derived from the shortest idle timeout: a quarter of
    /// it, clamped to 1s..=60s.
    pub fn interval_for(routers: &[Arc<SiftingRouter>]) -> Duration {
        let shortest = routers
            .iter()
            .map(|r| r.idle_timeout())
            .min()
            .unwrap_or(Duration::from_secs(60));
        (shortest / 4).clamp(Duration::from_secs(1), Duration::from_secs(60))
    }

    /// One pass over every router. Returns the number of sinks reaped.
    pub fn reap_once(&self) -> usize {
        self.routers.iter().map(|router| router.reap().len()).sum()
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_ms = self.interval.as_millis() as u64,
            routers = self.routers.len(),
            "Idle reaper starting"
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        // The first tick completes immediately; nothing can be idle yet.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let reaped = self.reap_once();
                    if reaped > 0 {
                        tracing::debug!(reaped, "Idle reaper pass complete");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Idle reaper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
