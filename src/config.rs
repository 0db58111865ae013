use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::models::STALENESS_THRESHOLD_MS;

// ---------------------------------------------------------------------------
// Server config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    /// Shared secret every device must present in `Authorization`.
    pub api_token: String,
    pub server_host: String,
    pub server_port: u16,
    /// Opt-in: drop records older than this. `None` keeps records forever.
    pub eviction_horizon: Option<Duration>,
    /// How often the eviction sweeper runs when enabled.
    pub eviction_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Build from any key → value lookup. `from_env` passes the process environment.
    pub fn from_source(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_token = required(&var, "TOKEN_API")?;
        if api_token.is_empty() {
            bail!("TOKEN_API must not be empty");
        }

        let eviction_horizon = match var("EVICTION_HORIZON_SECS") {
            Some(raw) if !raw.trim().is_empty() => {
                let secs: u64 = raw
                    .trim()
                    .parse()
                    .context("EVICTION_HORIZON_SECS must be a positive integer")?;
                if secs.saturating_mul(1000) <= STALENESS_THRESHOLD_MS as u64 {
                    bail!(
                        "EVICTION_HORIZON_SECS must exceed the {}s staleness threshold",
                        STALENESS_THRESHOLD_MS / 1000
                    );
                }
                Some(Duration::from_secs(secs))
            }
            _ => None,
        };

        let eviction_interval_secs: u64 = optional(&var, "EVICTION_INTERVAL_SECS", "60")
            .parse()
            .context("EVICTION_INTERVAL_SECS must be a positive integer")?;
        if eviction_interval_secs == 0 {
            bail!("EVICTION_INTERVAL_SECS must be a positive integer");
        }

        Ok(Self {
            api_token,
            server_host: optional(&var, "SERVER_HOST", "0.0.0.0"),
            server_port: optional(&var, "SERVER_PORT", "3000")
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
            eviction_horizon,
            eviction_interval: Duration::from_secs(eviction_interval_secs),
        })
    }
}

// ---------------------------------------------------------------------------
// Simulator config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub api_token: String,
    pub target_url: String,
    pub device_token: String,
    pub circuit_name: String,
    pub interval: Duration,
}

impl SimulatorConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_source(|key| std::env::var(key).ok())
    }

    pub fn from_source(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_token = required(&var, "TOKEN_API")?;
        if api_token.is_empty() {
            bail!("TOKEN_API must not be empty");
        }

        let interval_ms: u64 = optional(&var, "SIMULATOR_INTERVAL_MS", "1000")
            .parse()
            .context("SIMULATOR_INTERVAL_MS must be a positive integer")?;
        if interval_ms == 0 {
            bail!("SIMULATOR_INTERVAL_MS must be a positive integer");
        }

        Ok(Self {
            api_token,
            target_url: optional(&var, "SIMULATOR_TARGET_URL", "http://localhost:3000/api/dados"),
            device_token: optional(&var, "SIMULATOR_DEVICE_TOKEN", "circuito_simulado_001"),
            circuit_name: optional(&var, "SIMULATOR_CIRCUIT_NAME", "Circuito Simulado"),
            interval: Duration::from_millis(interval_ms),
        })
    }
}

fn required(var: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    var(key).with_context(|| format!("missing required env var: {key}"))
}

fn optional(var: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    var(key).unwrap_or_else(|| default.to_owned())
}
