//! Fabricates circuit readings and posts them to the ingestion endpoint,
//! once per interval, forever. A load generator for local development.

use std::ops::RangeInclusive;

use anyhow::{Context, Result};
use rand::{rngs::StdRng, Rng, SeedableRng};
use reqwest::{header, Client};
use tokio::time;
use tracing::{error, info};

use crate::{api::dto::ReadingForm, config::SimulatorConfig};

const VOLTAGE_RANGE: RangeInclusive<u32> = 110..=130;
const CURRENT_RANGE: RangeInclusive<u32> = 1..=20;
const CABLE_TEMP_RANGE: RangeInclusive<u32> = 25..=85;

/// One fabricated reading, in whole units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulatedReading {
    pub voltage: u32,
    pub current: u32,
    pub cable_temperature: u32,
}

pub struct Simulator {
    http: Client,
    config: SimulatorConfig,
    rng: StdRng,
}

impl Simulator {
    pub fn new(config: SimulatorConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Deterministic value sequence, for tests.
    pub fn with_seed(config: SimulatorConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: SimulatorConfig, rng: StdRng) -> Self {
        Self {
            http: Client::new(),
            config,
            rng,
        }
    }

    pub fn next_reading(&mut self) -> SimulatedReading {
        SimulatedReading {
            voltage: self.rng.gen_range(VOLTAGE_RANGE),
            current: self.rng.gen_range(CURRENT_RANGE),
            cable_temperature: self.rng.gen_range(CABLE_TEMP_RANGE),
        }
    }

    fn form_for(&self, reading: SimulatedReading) -> ReadingForm {
        ReadingForm {
            nomecircuito: Some(self.config.circuit_name.clone()),
            tensao: Some(reading.voltage.to_string()),
            corrente: Some(reading.current.to_string()),
            temp_cabo: Some(reading.cable_temperature.to_string()),
            token: Some(self.config.device_token.clone()),
        }
    }

    /// Fabricate one reading and post it. Non-2xx responses are errors.
    pub async fn send_once(&mut self) -> Result<SimulatedReading> {
        let reading = self.next_reading();
        let form = self.form_for(reading);

        let resp = self
            .http
            .post(&self.config.target_url)
            .header(header::AUTHORIZATION, &self.config.api_token)
            .form(&form)
            .send()
            .await
            .with_context(|| format!("POST {} failed", self.config.target_url))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("ingestion endpoint returned {status}: {body}");
        }

        info!(
            token = %self.config.device_token,
            voltage = reading.voltage,
            current = reading.current,
            cable_temperature = reading.cable_temperature,
            "Reading sent"
        );
        Ok(reading)
    }

    /// Runs the send loop indefinitely. A failed send is logged and the
    /// loop carries on with the next tick.
    pub async fn run(mut self) {
        info!(
            target_url = %self.config.target_url,
            token = %self.config.device_token,
            interval_ms = self.config.interval.as_millis() as u64,
            "Simulator started"
        );
        let mut ticker = time::interval(self.config.interval);

        loop {
            ticker.tick().await;
            if let Err(e) = self.send_once().await {
                error!(error = %e, "Failed to send simulated reading");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::net::TcpListener;

    use super::*;
    use crate::{
        api::router,
        device_registry::DeviceRegistry,
        ingest::{IngestService, SharedSecret},
    };

    fn config(target_url: String, api_token: &str) -> SimulatorConfig {
        SimulatorConfig {
            api_token: api_token.to_owned(),
            target_url,
            device_token: "circuito_simulado_001".to_owned(),
            circuit_name: "Circuito Simulado".to_owned(),
            interval: Duration::from_millis(10),
        }
    }

    async fn spawn_server(secret: &str) -> (String, DeviceRegistry) {
        let registry = DeviceRegistry::new();
        let service = IngestService::new(registry.clone(), SharedSecret::new(secret));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(service)).await.unwrap();
        });
        (format!("http://{addr}/api/dados"), registry)
    }

    #[test]
    fn readings_stay_within_ranges() {
        let mut sim = Simulator::with_seed(config("http://unused".into(), "s"), 7);
        for _ in 0..500 {
            let r = sim.next_reading();
            assert!(VOLTAGE_RANGE.contains(&r.voltage));
            assert!(CURRENT_RANGE.contains(&r.current));
            assert!(CABLE_TEMP_RANGE.contains(&r.cable_temperature));
        }
    }

    #[test]
    fn same_seed_same_sequence() {
        let mut a = Simulator::with_seed(config("http://unused".into(), "s"), 42);
        let mut b = Simulator::with_seed(config("http://unused".into(), "s"), 42);
        for _ in 0..10 {
            assert_eq!(a.next_reading(), b.next_reading());
        }
    }

    #[tokio::test]
    async fn send_once_lands_in_registry() {
        let (url, registry) = spawn_server("sim-secret").await;
        let mut sim = Simulator::with_seed(config(url, "sim-secret"), 1);

        let sent = sim.send_once().await.unwrap();
        let sent_again = sim.send_once().await.unwrap();

        let all = registry.list_with_liveness().await;
        assert_eq!(all.len(), 1);
        let stored = &all[0];
        assert_eq!(stored.device_token, "circuito_simulado_001");
        assert_eq!(stored.circuit_name, "Circuito Simulado");
        assert_eq!(stored.voltage, f64::from(sent_again.voltage));
        assert!(stored.is_available);
        assert!(VOLTAGE_RANGE.contains(&sent.voltage));
    }

    #[tokio::test]
    async fn send_once_with_wrong_secret_errors() {
        let (url, registry) = spawn_server("sim-secret").await;
        let mut sim = Simulator::with_seed(config(url, "not-it"), 1);

        let err = sim.send_once().await.unwrap_err();
        assert!(err.to_string().contains("401"));
        assert!(registry.is_empty().await);
    }
}
