//! Outbound task channel port.
//!
//! The dispatcher hands [`TaskMessage`]s to a channel; delivery to workers is
//! at-least-once and unordered.

mod memory;
mod webhook;

pub use memory::{InMemoryChannel, MessageStream};
pub use webhook::WebhookChannel;

use std::fmt;

use async_trait::async_trait;
use briefrun_core::TaskMessage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque id the channel assigned to a published message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageHandle(String);

impl MessageHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Publish contract.
#[async_trait]
pub trait TaskChannel: Send + Sync {
    /// Hand one message to `topic`.
    async fn publish(&self, topic: &str, message: &TaskMessage) -> Result<MessageHandle, PublishError>;
}

/// Errors returned by channel implementations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    /// Channel could not be reached.
    #[error("transport error: {0}")]
    Transport(String),

    /// Channel answered but refused the message.
    #[error("rejected by channel: {0}")]
    Rejected(String),

    /// No answer within the caller's deadline.
    #[error("publish timed out after {0} ms")]
    Timeout(u64),

    /// Message could not be encoded.
    #[error("encoding error: {0}")]
    Encoding(String),
}
