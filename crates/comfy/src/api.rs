//! REST client for the engine's HTTP endpoints.
//!
//! Wraps workflow submission, cancellation, interruption, and history
//! retrieval using [`reqwest`]. A rejected graph (HTTP 400) is turned
//! into [`JobError::Validation`] carrying the engine's per-node error
//! detail so callers see exactly which nodes were refused.

use serde::Deserialize;

use helios_core::error::JobError;
use helios_core::workflow::Workflow;

/// HTTP client for a single engine instance.
pub struct EngineApi {
    client: reqwest::Client,
    api_url: String,
}

/// Response returned by the engine's `/prompt` endpoint after
/// successfully queuing a workflow.
#[derive(Debug, Deserialize)]
pub struct QueueResponse {
    /// Server-assigned identifier for the queued prompt.
    pub prompt_id: String,
    /// Position in the execution queue.
    pub number: i32,
}

/// Body shape of an HTTP 400 graph-validation rejection.
#[derive(Debug, Deserialize)]
struct ValidationBody {
    #[serde(default)]
    error: serde_json::Value,
    #[serde(default)]
    node_errors: serde_json::Value,
}

impl EngineApi {
    /// Create a new API client.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://host:8188`.
    pub fn new(api_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
        }
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: String) -> Self {
        Self { client, api_url }
    }

    /// Base HTTP API URL.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Queue a workflow for execution.
    ///
    /// Sends `POST /prompt` with the workflow JSON and the caller's
    /// client id. An HTTP 400 means the engine rejected the graph; its
    /// `error` and `node_errors` fields are surfaced as
    /// [`JobError::Validation`]. Other failures map to
    /// [`JobError::Connection`].
    pub async fn queue_workflow(
        &self,
        workflow: &Workflow,
        client_id: &str,
    ) -> Result<QueueResponse, JobError> {
        let body = serde_json::json!({
            "prompt": workflow.as_json(),
            "client_id": client_id,
        });

        let response = self
            .client
            .post(format!("{}/prompt", self.api_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| JobError::Connection(format!("Failed to queue workflow: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::BAD_REQUEST {
            let text = response.text().await.unwrap_or_default();
            let parsed: ValidationBody = serde_json::from_str(&text).unwrap_or(ValidationBody {
                error: serde_json::Value::String(text.clone()),
                node_errors: serde_json::Value::Null,
            });
            return Err(JobError::Validation {
                message: validation_message(&parsed.error),
                node_errors: parsed.node_errors,
            });
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(JobError::Connection(format!(
                "Engine returned {status} while queueing prompt: {body}"
            )));
        }

        response
            .json::<QueueResponse>()
            .await
            .map_err(|e| JobError::Connection(format!("Malformed queue response: {e}")))
    }

    /// Cancel a queued execution.
    ///
    /// Sends `POST /queue` asking the engine to delete the specified
    /// prompt from its queue.
    pub async fn cancel_execution(&self, prompt_id: &str) -> Result<(), JobError> {
        let body = serde_json::json!({
            "delete": [prompt_id],
        });

        let response = self
            .client
            .post(format!("{}/queue", self.api_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| JobError::Connection(format!("Failed to cancel execution: {e}")))?;

        Self::check_status(response).await
    }

    /// Interrupt whatever is executing right now.
    ///
    /// Sends `POST /interrupt`. This does not target a specific prompt.
    pub async fn interrupt(&self) -> Result<(), JobError> {
        let response = self
            .client
            .post(format!("{}/interrupt", self.api_url))
            .send()
            .await
            .map_err(|e| JobError::Connection(format!("Failed to interrupt: {e}")))?;

        Self::check_status(response).await
    }

    /// Retrieve execution history for a specific prompt.
    ///
    /// Sends `GET /history/{prompt_id}`. The returned JSON contains
    /// output file paths, node results, and timing data.
    pub async fn get_history(&self, prompt_id: &str) -> Result<serde_json::Value, JobError> {
        let response = self
            .client
            .get(format!("{}/history/{}", self.api_url, prompt_id))
            .send()
            .await
            .map_err(|e| JobError::Connection(format!("Failed to fetch history: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(JobError::Connection(format!(
                "Engine returned {status} for history: {body}"
            )));
        }
        response
            .json()
            .await
            .map_err(|e| JobError::Connection(format!("Malformed history response: {e}")))
    }

    // ---- private helpers ----

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), JobError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(JobError::Connection(format!(
                "Engine returned {status}: {body}"
            )));
        }
        Ok(())
    }
}

/// Flatten the engine's `error` field (string or `{message, details}`
/// object) into one human-readable line.
fn validation_message(error: &serde_json::Value) -> String {
    match error {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Object(obj) => {
            let message = obj
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("Workflow rejected");
            match obj.get("details").and_then(|v| v.as_str()) {
                Some(details) if !details.is_empty() => format!("{message}: {details}"),
                _ => message.to_string(),
            }
        }
        serde_json::Value::Null => "Workflow rejected".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_from_string() {
        assert_eq!(
            validation_message(&serde_json::json!("bad graph")),
            "bad graph"
        );
    }

    #[test]
    fn validation_message_from_object() {
        let v = serde_json::json!({"message": "invalid prompt", "details": "node 5"});
        assert_eq!(validation_message(&v), "invalid prompt: node 5");
    }

    #[test]
    fn validation_message_fallback() {
        assert_eq!(
            validation_message(&serde_json::Value::Null),
            "Workflow rejected"
        );
        let v = serde_json::json!({"details": ""});
        assert_eq!(validation_message(&v), "Workflow rejected");
    }

    #[test]
    fn queue_response_parses() {
        let resp: QueueResponse =
            serde_json::from_str(r#"{"prompt_id":"abc","number":4}"#).unwrap();
        assert_eq!(resp.prompt_id, "abc");
        assert_eq!(resp.number, 4);
    }
}
