//! End-to-end orchestration of one job.
//!
//! [`run_job`] owns the request scope: it opens the optional relay
//! (never fatal), wires lifecycle hooks that log and forward envelopes
//! upstream, submits the workflow, drains the event stream through the
//! execution monitor, fetches outputs from history on success, and
//! closes the relay on every exit path.

use std::time::{Duration, Instant};

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use helios_comfy::api::EngineApi;
use helios_comfy::callbacks::ExecutionCallbacks;
use helios_comfy::client::{EngineClient, EngineHandle};
use helios_comfy::monitor::ExecutionMonitor;
use helios_core::error::JobError;
use helios_core::job_events::JobPhase;
use helios_core::types::{now_ms, ProcessId, PromptId};
use helios_core::workflow::Workflow;
use helios_relay::{RelayHandle, RelaySender};

/// One job submission.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub workflow: Workflow,
    /// Caller-supplied id, unique per submission; doubles as the engine
    /// `clientId`.
    pub process_id: ProcessId,
    /// Identity of the requesting user/tenant, echoed on the relay wire.
    pub client_id: String,
    /// Upstream listener to notify, if any.
    pub relay_url: Option<String>,
}

/// Timing breakdown returned with every successful job.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PerformanceMetrics {
    /// Upstream relay connection time, when a relay was configured and
    /// reachable.
    pub relay_connect_ms: Option<u64>,
    /// Time spent queueing the prompt with the engine.
    pub queue_duration_ms: u64,
    /// Queue-accept to first `executing` event.
    pub execution_delay_ms: Option<u64>,
    /// Stream-open to terminal event.
    pub execution_time_ms: u64,
}

/// Terminal success payload returned to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct JobResponse {
    pub client_id: String,
    pub process_id: ProcessId,
    pub prompt_id: PromptId,
    /// Final completion percentage (100.0 unless the engine lied).
    pub percentage: f64,
    /// Engine history entry for the prompt (output files, node results);
    /// `None` when the history fetch failed after an otherwise
    /// successful run.
    pub outputs: Option<serde_json::Value>,
    pub metrics: PerformanceMetrics,
}

/// Execute one workflow to its single terminal outcome.
pub async fn run_job(
    engine: &EngineHandle,
    request: JobRequest,
    timeout: Duration,
    cancel: CancellationToken,
) -> Result<JobResponse, JobError> {
    let job_started = Instant::now();
    tracing::info!(
        process_id = %request.process_id,
        client_id = %request.client_id,
        nodes = request.workflow.node_count(),
        "Starting job",
    );

    let relay = match &request.relay_url {
        Some(url) => RelayHandle::connect(url).await,
        None => RelayHandle::disabled(),
    };
    let relay_connect_ms = relay.connect_time_ms();

    let api = EngineApi::new(engine.api_url().to_string());
    let callbacks = lifecycle_hooks(&request, relay.sender());

    let result = execute(engine, &api, &request, callbacks, timeout, cancel).await;

    // The relay belongs to this request scope; close it whatever happened.
    relay.close().await;

    match result {
        Ok(mut response) => {
            response.metrics.relay_connect_ms = relay_connect_ms;
            tracing::info!(
                process_id = %response.process_id,
                prompt_id = %response.prompt_id,
                total_ms = job_started.elapsed().as_millis() as u64,
                "Job finished",
            );
            Ok(response)
        }
        Err(err) => {
            tracing::error!(
                process_id = %request.process_id,
                reason = err.reason_code(),
                "Job failed: {err}",
            );
            Err(err)
        }
    }
}

/// Submit, stream, and resolve. Separated from [`run_job`] so the relay
/// teardown wraps every exit path exactly once.
async fn execute(
    engine: &EngineHandle,
    api: &EngineApi,
    request: &JobRequest,
    callbacks: ExecutionCallbacks,
    timeout: Duration,
    cancel: CancellationToken,
) -> Result<JobResponse, JobError> {
    let mut monitor =
        ExecutionMonitor::new(request.process_id.clone(), &request.workflow, callbacks);
    let prompt_id = monitor.submit(api, &request.workflow).await?;

    let connection = EngineClient::new(engine.clone())
        .connect(&request.process_id)
        .await?;

    match monitor.run(connection.ws_stream, timeout, cancel).await {
        Ok(report) => {
            let outputs = match api.get_history(&report.prompt_id).await {
                Ok(history) => Some(history),
                Err(e) => {
                    tracing::warn!(
                        prompt_id = %report.prompt_id,
                        error = %e,
                        "Completed, but history fetch failed",
                    );
                    None
                }
            };
            Ok(JobResponse {
                client_id: request.client_id.clone(),
                process_id: request.process_id.clone(),
                prompt_id: report.prompt_id,
                percentage: report.final_percentage,
                outputs,
                metrics: PerformanceMetrics {
                    relay_connect_ms: None,
                    queue_duration_ms: report.queue_duration_ms,
                    execution_delay_ms: report.execution_delay_ms,
                    execution_time_ms: report.execution_time_ms,
                },
            })
        }
        Err(JobError::Cancelled) => {
            // Best effort: pull the prompt from the queue and stop
            // whatever is on the GPU right now.
            if let Err(e) = api.cancel_execution(&prompt_id).await {
                tracing::warn!(prompt_id = %prompt_id, error = %e, "Queue delete failed");
            }
            if let Err(e) = api.interrupt().await {
                tracing::warn!(error = %e, "Interrupt failed");
            }
            Err(JobError::Cancelled)
        }
        Err(err) => Err(err),
    }
}

/// Hooks that log each milestone and forward it upstream.
///
/// The sender is cheap to clone and absorbs every delivery failure, so
/// hook bodies stay infallible.
fn lifecycle_hooks(request: &JobRequest, sender: RelaySender) -> ExecutionCallbacks {
    let process_id = request.process_id.clone();
    let client_id = request.client_id.clone();

    let started = (sender.clone(), process_id.clone(), client_id.clone());
    let progressed = (sender.clone(), process_id.clone(), client_id.clone());
    let completed = (sender.clone(), process_id.clone(), client_id.clone());
    let failed = (sender, process_id, client_id);

    ExecutionCallbacks::default()
        .on_start(move |info| {
            let (sender, process_id, client_id) = &started;
            tracing::info!(
                process_id = %process_id,
                execution_delay_ms = info.execution_delay_ms,
                "Execution started",
            );
            let mut data = base_data(process_id, client_id);
            data["execution_delay_ms"] = info.execution_delay_ms.into();
            sender.send(JobPhase::JobStarted, data);
        })
        .on_progress(move |info| {
            let (sender, process_id, client_id) = &progressed;
            tracing::info!(
                process_id = %process_id,
                percentage = info.percentage,
                current_node = info.current_node.as_deref(),
                "Job progress",
            );
            let mut data = base_data(process_id, client_id);
            data["percentage"] = serde_json::json!(info.percentage);
            sender.send(JobPhase::JobProgress, data);
        })
        .on_done(move |info| {
            let (sender, process_id, client_id) = &completed;
            tracing::info!(
                process_id = %process_id,
                prompt_id = %info.prompt_id,
                "Job completed; sending completion event",
            );
            sender.send(JobPhase::JobCompleted, base_data(process_id, client_id));
        })
        .on_error(move |err| {
            let (sender, process_id, client_id) = &failed;
            let mut data = base_data(process_id, client_id);
            data["error_message"] = err.to_string().into();
            data["reason"] = err.reason_code().into();
            sender.send(JobPhase::JobFailed, data);
        })
}

/// Common relay payload fields: who this is about and when.
fn base_data(process_id: &str, client_id: &str) -> serde_json::Value {
    serde_json::json!({
        "timestamp": now_ms(),
        "process_id": process_id,
        "client_id": client_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_data_carries_identity_and_timestamp() {
        let data = base_data("p1", "tenant-a");
        assert_eq!(data["process_id"], "p1");
        assert_eq!(data["client_id"], "tenant-a");
        assert!(data["timestamp"].as_i64().unwrap() > 0);
    }

    #[test]
    fn job_response_serializes_for_the_caller() {
        let response = JobResponse {
            client_id: "tenant-a".into(),
            process_id: "p1".into(),
            prompt_id: "abc".into(),
            percentage: 100.0,
            outputs: None,
            metrics: PerformanceMetrics {
                relay_connect_ms: Some(12),
                queue_duration_ms: 30,
                execution_delay_ms: Some(450),
                execution_time_ms: 9000,
            },
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["prompt_id"], "abc");
        assert_eq!(json["metrics"]["execution_time_ms"], 9000);
    }
}
