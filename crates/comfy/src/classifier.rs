//! Filters raw engine messages against the active job.
//!
//! One WebSocket may carry events for several prompts (and broadcast
//! queue status with no prompt at all). The classifier is the single
//! place that decides whether a message belongs to this job and what it
//! means for the job's lifecycle, including the engine's end-of-graph
//! sentinel (`executing` with no node).

use crate::messages::{EngineMessage, ErrorData};
use crate::progress::StatusLog;

/// The meaning of one engine message for a specific job.
#[derive(Debug, Clone)]
pub enum Classification {
    /// `executing` named a concrete node: feed the estimator and report
    /// progress.
    NodeStarted(StatusLog),
    /// Any other relevant status event: feed the estimator only.
    Update(StatusLog),
    /// `executing` with no node: the engine has nothing left to run.
    Finished,
    /// The engine reported a hard failure for this job.
    Failed(ErrorData),
    /// Different prompt, missing identifier, or an irrelevant kind.
    Ignored,
}

/// Classify a parsed engine message against the job's prompt id.
///
/// The prompt-id filter is never skipped: an `execution_error` for a
/// different job is someone else's failure, not ours. The kind filter
/// is waived for `execution_error` (it is always a hard-failure signal
/// for the matching job).
pub fn classify(msg: EngineMessage, prompt_id: &str) -> Classification {
    match msg {
        EngineMessage::ExecutionError(data) => {
            if data.prompt_id == prompt_id {
                Classification::Failed(data)
            } else {
                Classification::Ignored
            }
        }
        EngineMessage::Executing(data) => {
            if data.prompt_id != prompt_id {
                return Classification::Ignored;
            }
            match data.node {
                Some(node) => Classification::NodeStarted(StatusLog::for_node(node)),
                None => Classification::Finished,
            }
        }
        EngineMessage::ExecutionStart(data) => {
            if data.prompt_id == prompt_id {
                Classification::Update(StatusLog::default())
            } else {
                Classification::Ignored
            }
        }
        EngineMessage::ExecutionCached(data) => {
            if data.prompt_id == prompt_id {
                Classification::Update(StatusLog::cached(data.nodes))
            } else {
                Classification::Ignored
            }
        }
        EngineMessage::Progress(data) => {
            // Older engines broadcast progress without a prompt id; those
            // cannot be attributed safely and are dropped.
            if data.prompt_id.as_deref() == Some(prompt_id) {
                Classification::Update(StatusLog::with_steps(data.node, data.value, data.max))
            } else {
                Classification::Ignored
            }
        }
        EngineMessage::Completed(data) => {
            if data.prompt_id == prompt_id {
                Classification::Update(StatusLog::default())
            } else {
                Classification::Ignored
            }
        }
        // Queue status broadcasts carry no prompt id; node outputs are
        // collected from history after completion, not from the stream.
        EngineMessage::Status(_) | EngineMessage::Executed(_) => Classification::Ignored,
    }
}
