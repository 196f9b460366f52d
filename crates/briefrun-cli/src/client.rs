//! HTTP client for the control plane REST API.

use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use briefrun_core::{Priority, RunView, UsageSnapshot};

use crate::error::ClientError;

/// Header naming the submitting user.
const USER_HEADER: &str = "x-bz-user";

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Control plane client.
pub struct Client {
    inner: reqwest::Client,
    base_url: String,
}

impl Client {
    /// Create a new client.
    pub fn new(base_url: &str) -> Self {
        Self {
            inner: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Check if the control plane is healthy.
    pub async fn health(&self) -> Result<bool, ClientError> {
        let url = self.url("/health");
        debug!(url = %url, "Checking health");

        let response = self.inner.get(&url).send().await?;
        Ok(response.status().is_success())
    }

    /// Submit a briefing.
    pub async fn submit(&self, text: &str, priority: Priority, user: Option<&str>) -> Result<Value, ClientError> {
        let mut request = self
            .inner
            .post(self.url("/v1/briefings"))
            .json(&serde_json::json!({ "briefing": text, "priority": priority }));
        if let Some(user) = user {
            request = request.header(USER_HEADER, user);
        }
        send_json(request).await
    }

    /// Current status of a run.
    pub async fn run(&self, run_id: &str) -> Result<RunView, ClientError> {
        send_json(self.inner.get(self.url(&format!("/v1/runs/{run_id}")))).await
    }

    /// Raw results of a run.
    pub async fn results(&self, run_id: &str) -> Result<Value, ClientError> {
        send_json(self.inner.get(self.url(&format!("/v1/runs/{run_id}/results")))).await
    }

    /// Report a task result on behalf of a worker.
    pub async fn report(&self, task_id: &str, payload: &Value) -> Result<Value, ClientError> {
        let request = self
            .inner
            .post(self.url(&format!("/v1/tasks/{task_id}/result")))
            .json(payload);
        send_json(request).await
    }

    /// Quota usage.
    pub async fn stats(&self) -> Result<UsageSnapshot, ClientError> {
        send_json(self.inner.get(self.url("/v1/stats"))).await
    }
}

async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ClientError> {
    let response = request.send().await?;
    let response = check(response).await?;
    response
        .json()
        .await
        .map_err(|e| ClientError::Serialization(e.to_string()))
}

async fn check(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Api {
        status: status.as_u16(),
        message: error_message(&body),
    })
}

/// Pull the `error` field out of an error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_from_body() {
        assert_eq!(
            error_message(r#"{"error":"daily limit exceeded (500)","timestamp":"t"}"#),
            "daily limit exceeded (500)"
        );
        assert_eq!(error_message("Bad Gateway"), "Bad Gateway");
    }

    #[test]
    fn test_base_url_trimmed() {
        let client = Client::new("http://localhost:8080/");
        assert_eq!(client.url("/health"), "http://localhost:8080/health");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_http_error() {
        let client = Client::new("http://127.0.0.1:9");
        assert!(matches!(client.health().await, Err(ClientError::Http(_))));
    }
}
