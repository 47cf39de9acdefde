use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use helios_comfy::client::EngineHandle;
use helios_core::workflow::Workflow;
use helios_worker::config::WorkerConfig;
use helios_worker::job::{run_job, JobRequest};

/// How long to wait for the engine to answer HTTP before giving up.
const READY_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "helios_worker=info,helios_comfy=info,helios_relay=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env()?;

    let mut args = std::env::args().skip(1);
    let workflow_path = args
        .next()
        .context("Usage: helios-worker <workflow.json> [process-id]")?;
    let process_id = args
        .next()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let raw = std::fs::read_to_string(&workflow_path)
        .with_context(|| format!("Failed to read workflow file {workflow_path}"))?;
    let workflow: Workflow =
        serde_json::from_str(&raw).context("Workflow file is not a JSON object of nodes")?;

    let engine = EngineHandle::new(config.ws_url.clone(), config.api_url.clone());
    engine
        .wait_ready(&reqwest::Client::new(), READY_TIMEOUT)
        .await
        .context("Engine did not become ready")?;

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Ctrl-C received; cancelling job");
            ctrl_c_cancel.cancel();
        }
    });

    let request = JobRequest {
        workflow,
        process_id,
        client_id: config.client_id.clone(),
        relay_url: config.relay_url.clone(),
    };

    let response = run_job(&engine, request, config.job_timeout, cancel).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
