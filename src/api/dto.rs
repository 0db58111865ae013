use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{ingest::Submission, models::CircuitReading};

/// Form body of `POST /api/dados`.
///
/// Field names are the ones deployed devices already send. Values are kept
/// as text; numeric coercion happens in the ingest service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct ReadingForm {
    /// Circuit name (required)
    pub nomecircuito: Option<String>,
    /// Voltage, volts
    pub tensao: Option<String>,
    /// Current, amperes
    pub corrente: Option<String>,
    /// Cable temperature, degrees Celsius
    #[serde(rename = "tempCabo")]
    pub temp_cabo: Option<String>,
    /// Device token (required)
    pub token: Option<String>,
}

impl ReadingForm {
    /// Build from decoded `(name, value)` pairs. The first value of a
    /// repeated field wins; unknown fields are ignored.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut form = Self::default();
        for (name, value) in pairs {
            let slot = match name.as_str() {
                "nomecircuito" => &mut form.nomecircuito,
                "tensao" => &mut form.tensao,
                "corrente" => &mut form.corrente,
                "tempCabo" => &mut form.temp_cabo,
                "token" => &mut form.token,
                _ => continue,
            };
            slot.get_or_insert(value);
        }
        form
    }
}

impl From<ReadingForm> for Submission {
    fn from(f: ReadingForm) -> Self {
        Self {
            circuit_name: f.nomecircuito,
            voltage: f.tensao,
            current: f.corrente,
            cable_temperature: f.temp_cabo,
            device_token: f.token,
        }
    }
}

/// One entry of `GET /api/dados`.
///
/// Numeric fields are `null` when the device sent a value that is not a number.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CircuitReadingDto {
    pub nomecircuito: String,
    /// Volts
    pub tensao: Option<f64>,
    /// Amperes
    pub corrente: Option<f64>,
    /// Degrees Celsius
    #[serde(rename = "tempCabo")]
    pub temp_cabo: Option<f64>,
    pub token: String,
    /// Spelling matches what existing dashboard clients read.
    pub avaliable: bool,
    /// Last accepted submission, milliseconds since the Unix epoch.
    #[serde(rename = "ultimaAtualizacao")]
    pub ultima_atualizacao: i64,
}

impl From<CircuitReading> for CircuitReadingDto {
    fn from(r: CircuitReading) -> Self {
        Self {
            nomecircuito: r.circuit_name,
            tensao: finite(r.voltage),
            corrente: finite(r.current),
            temp_cabo: finite(r.cable_temperature),
            token: r.device_token,
            avaliable: r.is_available,
            ultima_atualizacao: r.last_updated_at.timestamp_millis(),
        }
    }
}

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}
