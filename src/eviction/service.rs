use std::time::Duration;

use chrono::TimeDelta;
use tokio::time;
use tracing::{debug, info};

use crate::device_registry::DeviceRegistry;

/// Periodically drops records that have been stale for longer than `horizon`.
///
/// Only spawned when an eviction horizon is configured; without it the
/// registry keeps every record for the life of the process.
pub struct EvictionService {
    registry: DeviceRegistry,
    horizon: TimeDelta,
    interval: Duration,
}

impl EvictionService {
    pub fn new(registry: DeviceRegistry, horizon: Duration, interval: Duration) -> Self {
        Self {
            registry,
            horizon: TimeDelta::from_std(horizon).unwrap_or(TimeDelta::MAX),
            interval,
        }
    }

    /// Runs the sweep loop indefinitely.
    /// Spawn this via `tokio::spawn`.
    pub async fn run(self) {
        info!(
            horizon_secs = self.horizon.num_seconds(),
            interval_secs = self.interval.as_secs(),
            "Eviction loop started"
        );
        let mut ticker = time::interval(self.interval);

        loop {
            ticker.tick().await;
            self.run_once().await;
        }
    }

    /// One sweep. Returns the number of records removed.
    pub async fn run_once(&self) -> usize {
        let removed = self.registry.evict_stale(self.horizon).await;
        if removed > 0 {
            info!(removed, "Evicted long-stale device records");
        } else {
            debug!("Eviction sweep found nothing to remove");
        }
        removed
    }
}
