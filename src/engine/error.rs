//! Text backend error types.

use thiserror::Error;

/// Errors that can occur while loading or calling a text backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Backend not loaded: {0}")]
    NotLoaded(String),

    #[error("Invalid backend config: {0}")]
    InvalidConfig(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Generation cancelled")]
    Cancelled,
}

impl BackendError {
    /// Returns true if retrying the same call could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        Self::Request(err.to_string())
    }
}
