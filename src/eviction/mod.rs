pub mod service;

pub use service::EvictionService;
