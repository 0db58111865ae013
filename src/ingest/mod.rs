pub mod error;
pub mod secret;
pub mod service;

pub use error::{IngestError, ValidationError};
pub use secret::SharedSecret;
pub use service::{IngestService, Submission};
