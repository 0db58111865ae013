use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::RwLock;

use crate::{
    clock::{Clock, SystemClock},
    models::CircuitReading,
};

/// In-memory store of the latest `CircuitReading` per device token.
///
/// Wrapped in `Arc` so it can be cheaply cloned and shared across tasks;
/// clones see the same records. Every mutation, including the liveness
/// refresh done by reads, happens under the write half of one
/// `tokio::sync::RwLock`, so an upsert and a refresh of the same record
/// never interleave.
#[derive(Clone)]
pub struct DeviceRegistry {
    inner: Arc<RwLock<Records>>,
    clock: Arc<dyn Clock>,
}

/// Records in order of first submission, plus a token → position index.
#[derive(Default)]
struct Records {
    ordered: Vec<CircuitReading>,
    index: HashMap<String, usize>,
}

impl Records {
    fn reindex(&mut self) {
        self.index = self
            .ordered
            .iter()
            .enumerate()
            .map(|(pos, r)| (r.device_token.clone(), pos))
            .collect();
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    pub fn with_clock(clock: impl Clock) -> Self {
        Self {
            inner: Arc::default(),
            clock: Arc::new(clock),
        }
    }

    /// Current time according to the registry's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Insert `reading`, or replace the record already held for its token.
    ///
    /// The stored record is stamped fresh (`is_available = true`,
    /// `last_updated_at = now`). A replaced record keeps its original
    /// position in the listing order.
    pub async fn upsert(&self, mut reading: CircuitReading) {
        let mut guard = self.inner.write().await;
        let records = &mut *guard;
        reading.is_available = true;
        reading.last_updated_at = self.clock.now();

        match records.index.get(&reading.device_token).copied() {
            Some(pos) => records.ordered[pos] = reading,
            None => {
                let pos = records.ordered.len();
                records.index.insert(reading.device_token.clone(), pos);
                records.ordered.push(reading);
            }
        }
    }

    /// Recompute liveness for every record, persist the flags, and return all
    /// records in order of first submission.
    pub async fn list_with_liveness(&self) -> Vec<CircuitReading> {
        let mut records = self.inner.write().await;
        let now = self.clock.now();

        for reading in records.ordered.iter_mut() {
            reading.refresh_liveness(now);
        }
        records.ordered.clone()
    }

    /// Return the record for `device_token` with its liveness refreshed, if present.
    pub async fn get(&self, device_token: &str) -> Option<CircuitReading> {
        let mut records = self.inner.write().await;
        let now = self.clock.now();

        let pos = *records.index.get(device_token)?;
        let reading = &mut records.ordered[pos];
        reading.refresh_liveness(now);
        Some(reading.clone())
    }

    /// Number of records held, stale or not.
    pub async fn len(&self) -> usize {
        self.inner.read().await.ordered.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop every record whose age strictly exceeds `horizon`.
    ///
    /// Survivors keep their relative order. Returns the number removed.
    pub async fn evict_stale(&self, horizon: TimeDelta) -> usize {
        let mut records = self.inner.write().await;
        let now = self.clock.now();

        let before = records.ordered.len();
        records.ordered.retain(|r| r.age_at(now) <= horizon);
        let removed = before - records.ordered.len();

        if removed > 0 {
            records.reindex();
        }
        removed
    }
}
