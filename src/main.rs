use anyhow::Result;
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use circuit_telemetry::{
    api,
    config::Config,
    device_registry::DeviceRegistry,
    eviction::EvictionService,
    ingest::{IngestService, SharedSecret},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env; env vars may also be set externally
    let _ = dotenvy::dotenv();

    // Initialise tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    // Load config
    let config = Config::from_env()?;

    // Latest reading per device token, shared by the HTTP handlers and the sweeper
    let registry = DeviceRegistry::new();

    // Opt-in eviction of records that have been stale for a long time
    match config.eviction_horizon {
        Some(horizon) => {
            let eviction = EvictionService::new(registry.clone(), horizon, config.eviction_interval);
            tokio::spawn(eviction.run());
        }
        None => info!("Eviction disabled; records are kept for the life of the process"),
    }

    let service = IngestService::new(registry, SharedSecret::new(config.api_token.clone()));

    // Start HTTP server
    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "HTTP server listening");

    axum::serve(listener, api::router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
