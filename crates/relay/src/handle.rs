//! Relay connection lifecycle and the cloneable sender.
//!
//! [`RelayHandle::connect`] opens the upstream WebSocket and spawns a
//! writer task that owns the connection; [`RelaySender`] is the cheap
//! handle given to lifecycle hooks. When no upstream is configured, or
//! the connection fails, the handle is disabled and every send is a
//! no-op.

use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use futures::SinkExt;
use helios_core::job_events::JobPhase;

use crate::envelope::RelayEnvelope;

/// Grace period for the writer task to flush and close on shutdown.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Cloneable sender for lifecycle envelopes.
///
/// Disabled senders (no upstream configured, or connection failed)
/// silently drop everything.
#[derive(Clone, Default)]
pub struct RelaySender {
    tx: Option<mpsc::UnboundedSender<RelayEnvelope>>,
}

impl RelaySender {
    /// Queue one lifecycle envelope for delivery. Never blocks, never
    /// fails: delivery problems are the writer task's to log.
    pub fn send(&self, phase: JobPhase, data: serde_json::Value) {
        let Some(tx) = &self.tx else {
            return;
        };
        if tx.send(RelayEnvelope::new(phase, data)).is_err() {
            tracing::debug!(phase = phase.as_str(), "Relay writer gone; dropping event");
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }
}

/// Owner of the upstream connection. Created once per job by the
/// caller of the monitor and closed by the caller on all exit paths.
pub struct RelayHandle {
    sender: RelaySender,
    task: Option<tokio::task::JoinHandle<()>>,
    connect_time_ms: Option<u64>,
}

impl RelayHandle {
    /// A handle with no upstream; all sends are no-ops.
    pub fn disabled() -> Self {
        Self {
            sender: RelaySender::default(),
            task: None,
            connect_time_ms: None,
        }
    }

    /// Connect to the upstream listener.
    ///
    /// Failure is not an error: the job must run to completion whether
    /// or not anyone is listening, so a failed connection logs a
    /// warning and yields a disabled handle.
    pub async fn connect(url: &str) -> Self {
        let connect_started = Instant::now();
        let (ws, _response) = match connect_async(url).await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(
                    url = %url,
                    error = %e,
                    "Relay connection failed; continuing without a relay",
                );
                return Self::disabled();
            }
        };
        let connect_time_ms = connect_started.elapsed().as_millis() as u64;
        tracing::info!(url = %url, connect_time_ms, "Relay connected");

        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(write_loop(ws, rx));

        Self {
            sender: RelaySender { tx: Some(tx) },
            task: Some(task),
            connect_time_ms: Some(connect_time_ms),
        }
    }

    /// Sender to hand to lifecycle hooks.
    pub fn sender(&self) -> RelaySender {
        self.sender.clone()
    }

    pub fn is_enabled(&self) -> bool {
        self.sender.is_enabled()
    }

    /// Time taken to establish the upstream connection, when one exists.
    pub fn connect_time_ms(&self) -> Option<u64> {
        self.connect_time_ms
    }

    /// Flush and close the upstream connection.
    ///
    /// Dropping the internal sender ends the writer loop, which sends a
    /// Close frame; the task is then awaited with a bounded timeout.
    pub async fn close(mut self) {
        self.sender = RelaySender::default();
        if let Some(task) = self.task.take() {
            if tokio::time::timeout(CLOSE_TIMEOUT, task).await.is_err() {
                tracing::warn!("Relay writer did not shut down in time");
            }
        }
    }
}

/// Writer task: serialize envelopes and push them upstream until the
/// channel closes or the socket dies.
async fn write_loop(
    mut ws: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    mut rx: mpsc::UnboundedReceiver<RelayEnvelope>,
) {
    while let Some(envelope) = rx.recv().await {
        let text = envelope.to_json();
        if let Err(e) = ws.send(Message::Text(text)).await {
            tracing::warn!(
                phase = envelope.phase.as_str(),
                error = %e,
                "Relay send failed; dropping remaining events",
            );
            return;
        }
    }
    if let Err(e) = ws.close(None).await {
        tracing::debug!(error = %e, "Relay close handshake failed");
    }
}
