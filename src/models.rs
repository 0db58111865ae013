use chrono::{DateTime, TimeDelta, Utc};

/// A reading older than this many milliseconds is reported as unavailable.
pub const STALENESS_THRESHOLD_MS: i64 = 60_000;

/// Latest known reading for one device token.
///
/// `voltage`, `current` and `cable_temperature` may be NaN when the device
/// submitted a value that does not parse as a number.
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitReading {
    pub circuit_name: String,
    /// Volts
    pub voltage: f64,
    /// Amperes
    pub current: f64,
    /// Degrees Celsius
    pub cable_temperature: f64,
    pub device_token: String,
    /// Derived from `last_updated_at`; refreshed by the registry on every read.
    pub is_available: bool,
    pub last_updated_at: DateTime<Utc>,
}

impl CircuitReading {
    /// Whether a reading last updated at `last_updated_at` is still fresh at `now`.
    ///
    /// The boundary is inclusive: exactly `STALENESS_THRESHOLD_MS` old is fresh.
    pub fn is_fresh_at(last_updated_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        (now - last_updated_at).num_milliseconds() <= STALENESS_THRESHOLD_MS
    }

    /// Recompute `is_available` against `now` and store the result.
    pub fn refresh_liveness(&mut self, now: DateTime<Utc>) -> bool {
        self.is_available = Self::is_fresh_at(self.last_updated_at, now);
        self.is_available
    }

    /// Age of the reading at `now`.
    pub fn age_at(&self, now: DateTime<Utc>) -> TimeDelta {
        now - self.last_updated_at
    }
}
