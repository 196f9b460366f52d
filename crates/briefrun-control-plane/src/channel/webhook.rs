//! Push delivery of task messages over HTTP.

use async_trait::async_trait;
use briefrun_core::TaskMessage;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tracing::debug;

use super::{MessageHandle, PublishError, TaskChannel};

/// Header carrying the topic name on each push.
pub const TOPIC_HEADER: &str = "x-briefrun-topic";

#[derive(Debug, Deserialize)]
struct PushAck {
    message_id: Option<String>,
}

/// Channel that POSTs each message as JSON to a push endpoint.
///
/// The endpoint may answer with `{"message_id": "..."}`; otherwise a local id
/// is generated for the handle.
pub struct WebhookChannel {
    client: reqwest::Client,
    endpoint: String,
}

impl WebhookChannel {
    /// Create a channel pushing to `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    /// Endpoint messages are pushed to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TaskChannel for WebhookChannel {
    async fn publish(&self, topic: &str, message: &TaskMessage) -> Result<MessageHandle, PublishError> {
        debug!(endpoint = %self.endpoint, topic, task_id = %message.task_id, "Pushing task message");

        let body = message
            .to_bytes()
            .map_err(|e| PublishError::Encoding(e.to_string()))?;

        let response = self
            .client
            .post(&self.endpoint)
            .header(TOPIC_HEADER, topic)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PublishError::Rejected(format!("HTTP {status}")));
        }

        // An empty or non-JSON body still counts as accepted.
        let ack = response
            .json::<PushAck>()
            .await
            .ok()
            .and_then(|ack| ack.message_id);

        Ok(MessageHandle::new(
            ack.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use briefrun_core::{Priority, RunId, TaskSpec, TaskType};
    use chrono::Utc;

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        // Port 9 (discard) on localhost is not expected to accept HTTP.
        let channel = WebhookChannel::new("http://127.0.0.1:9/push");
        let task = TaskSpec::new(TaskType::General, "x", "general_agent", Priority::Normal);
        let message = TaskMessage::new(&RunId::new("r"), 0, task, Utc::now());

        let err = channel.publish("tasks", &message).await.unwrap_err();
        assert!(matches!(err, PublishError::Transport(_)));
        assert_eq!(channel.endpoint(), "http://127.0.0.1:9/push");
    }
}
