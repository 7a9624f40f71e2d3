//! Crate-wide error type.
//!
//! Every variant maps onto a process exit code so the binary can stay a thin
//! wrapper: `main` prints the message and exits with `exit_code()`.
//!
//! Note what is *not* here: an HTML error page or an empty body from the
//! provider is classified by the transport as an empty result and never
//! surfaces as an error (see `data::transport::Payload`).

use thiserror::Error;

use crate::query::EncodeError;

/// Errors raised by the screening pipeline.
#[derive(Debug, Error)]
pub enum ScreenerError {
    /// Missing auth token or otherwise unusable configuration. Always fatal.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A filter value could not be encoded (strict mode only).
    #[error("Invalid filter: {0}")]
    Encode(#[from] EncodeError),

    /// Network-level failure after all retry attempts were spent.
    #[error("Request to {url} failed after {attempts} attempt(s): {message}")]
    Transport {
        url: String,
        attempts: u32,
        message: String,
    },

    /// The provider answered with a status that is not worth retrying.
    #[error("Provider returned HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl ScreenerError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Process exit code for the `screener` binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            ScreenerError::Config(_) => 2,
            ScreenerError::Encode(_) => 3,
            ScreenerError::Transport { .. } | ScreenerError::Status { .. } => 4,
            ScreenerError::Io(_) | ScreenerError::Json(_) | ScreenerError::Csv(_) => 5,
        }
    }
}

pub type Result<T> = std::result::Result<T, ScreenerError>;
