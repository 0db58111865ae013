use thiserror::Error;

/// Which required field a submission was missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("circuit name is required")]
    MissingCircuitName,
    #[error("device token is required")]
    MissingDeviceToken,
}

/// Why a submission was rejected. Every variant is terminal for the request.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Credential absent or not equal to the shared secret.
    #[error("invalid or missing credential")]
    Authentication,

    #[error("incomplete submission: {0}")]
    Validation(#[from] ValidationError),

    /// Anything else, e.g. a body that could not be decoded.
    #[error("failed to process submission")]
    Unexpected(#[source] anyhow::Error),
}

impl IngestError {
    pub fn unexpected(e: impl Into<anyhow::Error>) -> Self {
        Self::Unexpected(e.into())
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Authentication => "authentication",
            Self::Validation(_) => "validation",
            Self::Unexpected(_) => "unexpected",
        }
    }
}
