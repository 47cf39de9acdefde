//! Per-job execution monitor: submit, stream, resolve.
//!
//! One monitor owns one job from submission to its single terminal
//! outcome. A spawned reader task drains raw WebSocket frames off the
//! caller's context and forwards parsed messages over a channel; the
//! monitor loop classifies them, updates the progress estimator, and
//! drives the callback dispatcher strictly in arrival order. A single
//! deadline and a cancellation token govern the whole run; whichever
//! fires first wins, the reader is cancelled between event reads, and
//! the inbound stream is dropped to close the connection.

use std::time::{Duration, Instant};

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;

use helios_core::error::JobError;
use helios_core::types::{ProcessId, PromptId};
use helios_core::workflow::Workflow;

use crate::api::EngineApi;
use crate::callbacks::{CallbackDispatcher, DoneInfo, ExecutionCallbacks, ProgressInfo, StartInfo};
use crate::classifier::{classify, Classification};
use crate::messages::{parse_binary_frame, parse_message, BinaryFrame, EngineMessage};
use crate::progress::{JobProgress, StatusLog};

/// Lifecycle of one monitored job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Created; workflow not yet accepted by the engine.
    Submitting,
    /// Queued and draining the event stream.
    Streaming,
    /// Terminal. No further callbacks will fire.
    Resolved(Resolution),
}

/// The single terminal outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Success,
    Failure,
    Timeout,
    Cancelled,
}

/// Terminal success payload.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub prompt_id: PromptId,
    /// Time spent in the engine's queue call, in milliseconds.
    pub queue_duration_ms: u64,
    /// Submit-to-first-event delay, if execution started.
    pub execution_delay_ms: Option<u64>,
    /// Stream-open-to-resolution time in milliseconds.
    pub execution_time_ms: u64,
    /// Last emitted percentage (100.0 on success).
    pub final_percentage: f64,
}

/// Frames forwarded from the reader task to the monitor loop.
enum InboundFrame {
    Event(EngineMessage),
    Preview(BinaryFrame),
}

/// Monitors a single job end to end.
///
/// `run` consumes the monitor, so a job instance can only ever resolve
/// once.
pub struct ExecutionMonitor {
    process_id: ProcessId,
    progress: JobProgress,
    dispatcher: CallbackDispatcher,
    state: MonitorState,
    prompt_id: Option<PromptId>,
    queue_duration_ms: u64,
    submitted_at: Option<Instant>,
    preview_tx: Option<mpsc::UnboundedSender<BinaryFrame>>,
}

impl ExecutionMonitor {
    pub fn new(process_id: ProcessId, workflow: &Workflow, callbacks: ExecutionCallbacks) -> Self {
        Self {
            process_id,
            progress: JobProgress::new(workflow),
            dispatcher: CallbackDispatcher::new(callbacks),
            state: MonitorState::Submitting,
            prompt_id: None,
            queue_duration_ms: 0,
            submitted_at: None,
            preview_tx: None,
        }
    }

    /// Route binary preview frames to `tx` instead of dropping them.
    pub fn with_preview_sink(mut self, tx: mpsc::UnboundedSender<BinaryFrame>) -> Self {
        self.preview_tx = Some(tx);
        self
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn prompt_id(&self) -> Option<&str> {
        self.prompt_id.as_deref()
    }

    /// Queue the workflow with the engine.
    ///
    /// On rejection the monitor stays in `Submitting`, the error hook
    /// fires, and the structured validation detail is returned. On
    /// success the engine-assigned prompt id is recorded for the
    /// classifier's identity filter.
    pub async fn submit(
        &mut self,
        api: &EngineApi,
        workflow: &Workflow,
    ) -> Result<PromptId, JobError> {
        if self.state != MonitorState::Submitting {
            return Err(JobError::Internal(format!(
                "submit called in state {:?}",
                self.state
            )));
        }

        let queue_started = Instant::now();
        match api.queue_workflow(workflow, &self.process_id).await {
            Ok(response) => {
                self.queue_duration_ms = queue_started.elapsed().as_millis() as u64;
                self.submitted_at = Some(Instant::now());
                self.prompt_id = Some(response.prompt_id.clone());
                tracing::info!(
                    process_id = %self.process_id,
                    prompt_id = %response.prompt_id,
                    queue_position = response.number,
                    queue_duration_ms = self.queue_duration_ms,
                    "Workflow queued",
                );
                Ok(response.prompt_id)
            }
            Err(err) => {
                tracing::error!(
                    process_id = %self.process_id,
                    reason = err.reason_code(),
                    error = %err,
                    "Failed to queue workflow",
                );
                self.state = MonitorState::Resolved(Resolution::Failure);
                self.dispatcher.error(&err);
                Err(err)
            }
        }
    }

    /// Drain the event stream until a terminal condition.
    ///
    /// Resolves exactly once: the engine's end-of-graph sentinel
    /// (success), an `execution_error` (failure), the deadline
    /// (timeout), or the cancellation token (cancelled). On every exit
    /// path the reader task is stopped and the stream dropped, which
    /// closes the inbound connection.
    pub async fn run<S>(
        mut self,
        events: S,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> Result<ExecutionReport, JobError>
    where
        S: Stream<Item = Result<Message, tungstenite::Error>> + Send + Unpin + 'static,
    {
        let prompt_id = match self.prompt_id.clone() {
            Some(id) => id,
            None => {
                return Err(JobError::Internal(
                    "run called before a successful submit".into(),
                ))
            }
        };
        self.state = MonitorState::Streaming;

        let reader_cancel = cancel.child_token();
        let mut frames = spawn_reader(events, reader_cancel.clone());

        let run_started = Instant::now();
        let mut execution_delay_ms: Option<u64> = None;
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        let outcome: Result<(), JobError> = loop {
            let frame = tokio::select! {
                _ = cancel.cancelled() => break Err(JobError::Cancelled),
                _ = &mut deadline => break Err(JobError::Timeout(timeout)),
                frame = frames.recv() => frame,
            };

            let msg = match frame {
                None => {
                    break Err(JobError::Connection(
                        "Event stream closed before a terminal event".into(),
                    ))
                }
                Some(InboundFrame::Preview(preview)) => {
                    match &self.preview_tx {
                        Some(tx) => {
                            let _ = tx.send(preview);
                        }
                        None => {
                            tracing::trace!(
                                prompt_id = %prompt_id,
                                "Dropping preview frame (no sink configured)",
                            );
                        }
                    }
                    continue;
                }
                Some(InboundFrame::Event(msg)) => msg,
            };

            match classify(msg, &prompt_id) {
                Classification::Ignored => {}
                Classification::Update(log) => {
                    self.progress.record(log);
                }
                Classification::NodeStarted(log) => {
                    self.progress.record(log);
                    self.note_started(&mut execution_delay_ms);
                    self.report_progress();
                }
                Classification::Finished => {
                    self.progress.record(StatusLog::default());
                    self.note_started(&mut execution_delay_ms);
                    self.report_progress();
                    break Ok(());
                }
                Classification::Failed(data) => {
                    break Err(JobError::Engine {
                        node_id: data.node_id,
                        exception_type: data.exception_type,
                        message: data.exception_message,
                    });
                }
            }
        };

        // Stop the reader on every path; dropping the stream closes the
        // inbound connection and unblocks any pending receive.
        reader_cancel.cancel();

        let execution_time_ms = run_started.elapsed().as_millis() as u64;
        match outcome {
            Ok(()) => {
                self.state = MonitorState::Resolved(Resolution::Success);
                self.dispatcher.done(&DoneInfo {
                    process_id: self.process_id.clone(),
                    prompt_id: prompt_id.clone(),
                });
                tracing::info!(
                    process_id = %self.process_id,
                    prompt_id = %prompt_id,
                    execution_time_ms,
                    "Job completed",
                );
                Ok(ExecutionReport {
                    prompt_id,
                    queue_duration_ms: self.queue_duration_ms,
                    execution_delay_ms,
                    execution_time_ms,
                    final_percentage: self.progress.last_percentage(),
                })
            }
            Err(err) => {
                self.state = MonitorState::Resolved(match err {
                    JobError::Timeout(_) => Resolution::Timeout,
                    JobError::Cancelled => Resolution::Cancelled,
                    _ => Resolution::Failure,
                });
                // Partial progress is kept for diagnostics only.
                tracing::warn!(
                    process_id = %self.process_id,
                    prompt_id = %prompt_id,
                    reason = err.reason_code(),
                    percentage = self.progress.last_percentage(),
                    visited = self.progress.visited_count(),
                    total = self.progress.total_count(),
                    "Job did not complete: {err}",
                );
                self.dispatcher.error(&err);
                Err(err)
            }
        }
    }

    /// Fire the start hook on the first `executing` event and record
    /// the queue-submit-to-first-event latency.
    fn note_started(&mut self, execution_delay_ms: &mut Option<u64>) {
        if execution_delay_ms.is_none() {
            let delay = self
                .submitted_at
                .map(|t| t.elapsed().as_millis() as u64)
                .unwrap_or(0);
            *execution_delay_ms = Some(delay);
            tracing::info!(
                process_id = %self.process_id,
                execution_delay_ms = delay,
                "Execution started",
            );
            self.dispatcher.start(&StartInfo {
                process_id: self.process_id.clone(),
                execution_delay_ms: delay,
            });
        }
    }

    fn report_progress(&mut self) {
        let percentage = self.progress.percentage();
        let current_node = self.progress.current_node().map(str::to_owned);
        self.dispatcher.progress(&ProgressInfo {
            process_id: self.process_id.clone(),
            percentage,
            current_node,
        });
    }
}

/// Spawn the reader task: raw frames in, parsed frames out.
///
/// The blocking receive happens here, off the monitor's context.
/// Cancellation is checked between reads, never mid-parse. Exiting the
/// task drops the stream, closing the connection.
fn spawn_reader<S>(mut events: S, cancel: CancellationToken) -> mpsc::UnboundedReceiver<InboundFrame>
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Send + Unpin + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                _ = cancel.cancelled() => break,
                frame = events.next() => frame,
            };

            match frame {
                None => break,
                Some(Ok(Message::Text(text))) => match parse_message(&text) {
                    Ok(msg) => {
                        if tx.send(InboundFrame::Event(msg)).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "Skipping unrecognized engine message");
                    }
                },
                Some(Ok(Message::Binary(bytes))) => match parse_binary_frame(&bytes) {
                    Some(preview) => {
                        if tx.send(InboundFrame::Preview(preview)).is_err() {
                            break;
                        }
                    }
                    None => {
                        tracing::warn!(len = bytes.len(), "Binary frame shorter than its header");
                    }
                },
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                    // Handled automatically by tungstenite.
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(?frame, "Engine WebSocket closed");
                    break;
                }
                Some(Ok(Message::Frame(_))) => {}
                Some(Err(e)) => {
                    tracing::error!(error = %e, "WebSocket receive error");
                    break;
                }
            }
        }
    });

    rx
}
