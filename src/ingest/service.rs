use tracing::{debug, warn};

use crate::{
    device_registry::DeviceRegistry,
    ingest::{IngestError, SharedSecret, ValidationError},
    models::CircuitReading,
};

/// A submission as it arrived, before validation and numeric coercion.
///
/// Every field is optional text, the same shape a decoded HTML form has.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Submission {
    pub circuit_name: Option<String>,
    pub voltage: Option<String>,
    pub current: Option<String>,
    pub cable_temperature: Option<String>,
    pub device_token: Option<String>,
}

/// Authenticates and validates inbound readings before they reach the
/// registry, and serves the read path.
#[derive(Clone)]
pub struct IngestService {
    registry: DeviceRegistry,
    secret: SharedSecret,
}

impl IngestService {
    pub fn new(registry: DeviceRegistry, secret: SharedSecret) -> Self {
        Self { registry, secret }
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Check the presented credential against the shared secret.
    pub fn authenticate(&self, credential: Option<&str>) -> Result<(), IngestError> {
        match credential {
            Some(c) if self.secret.verify(c) => Ok(()),
            _ => {
                warn!(kind = "authentication", "Rejected submission");
                Err(IngestError::Authentication)
            }
        }
    }

    /// Authenticate, validate and store one reading.
    ///
    /// Nothing is written to the registry unless every check passes.
    pub async fn submit(
        &self,
        credential: Option<&str>,
        submission: Submission,
    ) -> Result<(), IngestError> {
        self.authenticate(credential)?;

        let reading = self.validate(submission).inspect_err(|e| {
            warn!(kind = e.kind(), error = %e, "Rejected submission");
        })?;

        debug!(
            token = %reading.device_token,
            circuit = %reading.circuit_name,
            "Reading accepted"
        );
        self.registry.upsert(reading).await;
        Ok(())
    }

    /// Every stored reading with liveness recomputed, in first-submission order.
    pub async fn list(&self) -> Vec<CircuitReading> {
        self.registry.list_with_liveness().await
    }

    /// A single reading with liveness recomputed.
    pub async fn get(&self, device_token: &str) -> Option<CircuitReading> {
        self.registry.get(device_token).await
    }

    fn validate(&self, submission: Submission) -> Result<CircuitReading, IngestError> {
        let circuit_name = non_empty(submission.circuit_name)
            .ok_or(ValidationError::MissingCircuitName)?;
        let device_token = non_empty(submission.device_token)
            .ok_or(ValidationError::MissingDeviceToken)?;

        Ok(CircuitReading {
            circuit_name,
            voltage: coerce_number(submission.voltage.as_deref()),
            current: coerce_number(submission.current.as_deref()),
            cable_temperature: coerce_number(submission.cable_temperature.as_deref()),
            device_token,
            is_available: true,
            last_updated_at: self.registry.now(),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Convert a form value to a number the way a browser's `Number(..)` does:
/// absent or blank is `0`; decimal text, `Infinity`, and unsigned `0x`/`0o`/`0b`
/// literals are accepted; anything else is NaN. Malformed values are stored,
/// not rejected.
pub(crate) fn coerce_number(raw: Option<&str>) -> f64 {
    let text = match raw.map(str::trim) {
        None | Some("") => return 0.0,
        Some(text) => text,
    };

    if let Some(value) = parse_radix_literal(text) {
        return value;
    }

    let unsigned = text.strip_prefix(['+', '-']).unwrap_or(text);
    match unsigned {
        "Infinity" if text.starts_with('-') => f64::NEG_INFINITY,
        "Infinity" => f64::INFINITY,
        // Rust also accepts `inf`, `nan` and friends in any case; `Number` does not.
        _ if !unsigned.starts_with(|c: char| c.is_ascii_digit() || c == '.') => f64::NAN,
        _ => text.parse().unwrap_or(f64::NAN),
    }
}

/// `0x1A`, `0o17`, `0b101` (prefix in either case, no sign). `None` when
/// `text` has no radix prefix; NaN when the digits are invalid.
fn parse_radix_literal(text: &str) -> Option<f64> {
    let radix = match text.get(..2)?.to_ascii_lowercase().as_str() {
        "0x" => 16,
        "0o" => 8,
        "0b" => 2,
        _ => return None,
    };
    let digits = &text[2..];
    if digits.is_empty() {
        return Some(f64::NAN);
    }
    let value = digits
        .chars()
        .try_fold(0.0_f64, |acc, c| {
            c.to_digit(radix).map(|d| acc * f64::from(radix) + f64::from(d))
        })
        .unwrap_or(f64::NAN);
    Some(value)
}
