//! Error types for the CLI client.

use thiserror::Error;

/// Errors that can occur when talking to the control plane.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The control plane answered with an error status.
    #[error("server returned {status}: {message}")]
    Api { status: u16, message: String },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}
