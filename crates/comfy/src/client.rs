//! WebSocket client for connecting to an engine instance.
//!
//! [`EngineHandle`] is the explicit "engine is up" reference passed
//! around instead of a process-wide flag: whoever starts or discovers
//! the engine constructs one, and everything downstream (REST client,
//! WebSocket connect) derives from it. [`EngineClient::connect`]
//! establishes a live [`EngineConnection`] for a single job.

use std::time::Duration;

use tokio_tungstenite::{connect_async, MaybeTlsStream};

use helios_core::error::JobError;

/// Reference to a started, reachable engine instance.
///
/// Holds the WebSocket and HTTP base URLs. Cloneable so it can be
/// handed to each job without shared mutable state.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    ws_url: String,
    api_url: String,
}

impl EngineHandle {
    /// * `ws_url`  - WebSocket base URL, e.g. `ws://host:8188`.
    /// * `api_url` - HTTP base URL, e.g. `http://host:8188`.
    pub fn new(ws_url: String, api_url: String) -> Self {
        Self { ws_url, api_url }
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Poll the engine's HTTP root until it answers or `timeout`
    /// elapses. Used at startup before the first submission.
    pub async fn wait_ready(
        &self,
        client: &reqwest::Client,
        timeout: Duration,
    ) -> Result<(), JobError> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match client.get(&self.api_url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    tracing::info!(attempt, url = %self.api_url, "Engine is ready");
                    return Ok(());
                }
                Ok(resp) => {
                    tracing::debug!(attempt, status = %resp.status(), "Engine not ready yet");
                }
                Err(e) => {
                    tracing::debug!(attempt, error = %e, "Engine not reachable yet");
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(JobError::Connection(format!(
                    "Engine at {} not ready after {timeout:?}",
                    self.api_url
                )));
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }
}

/// WebSocket connector for one engine instance.
pub struct EngineClient {
    handle: EngineHandle,
}

/// A live WebSocket connection to the engine, exclusively owned by one
/// job for its duration.
pub struct EngineConnection {
    /// Client ID sent during the handshake; the engine addresses
    /// events for this job back to it.
    pub client_id: String,
    /// The raw WebSocket stream for reading frames.
    pub ws_stream: tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
}

impl EngineClient {
    pub fn new(handle: EngineHandle) -> Self {
        Self { handle }
    }

    /// Connect to the engine's WebSocket endpoint.
    ///
    /// The job's process id is used as the `clientId` query parameter
    /// so the engine routes this job's events to this connection.
    pub async fn connect(&self, client_id: &str) -> Result<EngineConnection, JobError> {
        let url = format!("{}/ws?clientId={}", self.handle.ws_url(), client_id);

        let (ws_stream, _response) = connect_async(&url).await.map_err(|e| {
            JobError::Connection(format!(
                "Failed to connect to engine at {}: {e}",
                self.handle.ws_url()
            ))
        })?;

        tracing::info!(
            client_id = %client_id,
            "Connected to engine at {}",
            self.handle.ws_url(),
        );

        Ok(EngineConnection {
            client_id: client_id.to_string(),
            ws_stream,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_exposes_urls() {
        let handle = EngineHandle::new("ws://h:8188".into(), "http://h:8188".into());
        assert_eq!(handle.ws_url(), "ws://h:8188");
        assert_eq!(handle.api_url(), "http://h:8188");
    }

    #[tokio::test]
    async fn wait_ready_times_out_when_unreachable() {
        let handle = EngineHandle::new(
            "ws://127.0.0.1:1".into(),
            "http://127.0.0.1:1".into(),
        );
        let client = reqwest::Client::new();
        let result = handle
            .wait_ready(&client, Duration::from_millis(100))
            .await;
        assert!(matches!(result, Err(JobError::Connection(_))));
    }
}
