//! Posts a fabricated circuit reading to the ingestion endpoint every
//! `SIMULATOR_INTERVAL_MS` until interrupted with Ctrl+C.

use anyhow::Result;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use circuit_telemetry::{config::SimulatorConfig, simulator::Simulator};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = SimulatorConfig::from_env()?;
    let simulator = Simulator::new(config);

    tokio::select! {
        _ = simulator.run() => {},
        res = signal::ctrl_c() => {
            res?;
            info!("Simulation interrupted");
        }
    }

    Ok(())
}
