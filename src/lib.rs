pub mod api;
pub mod clock;
pub mod config;
pub mod device_registry;
pub mod eviction;
pub mod ingest;
pub mod models;
pub mod simulator;
