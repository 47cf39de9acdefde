//! Caller-facing job error taxonomy.
//!
//! Only job-fatal errors appear here. Relay delivery problems are
//! logged and absorbed inside `helios-relay` and never reach a job
//! result.

use std::time::Duration;

/// Terminal failure reasons for a single job.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// The engine rejected the workflow graph before execution began.
    /// `node_errors` carries the engine's per-node detail verbatim.
    #[error("Workflow validation failed: {message}")]
    Validation {
        message: String,
        node_errors: serde_json::Value,
    },

    /// The engine reported a runtime failure mid-graph.
    #[error("Engine execution error ({exception_type}): {message}")]
    Engine {
        node_id: Option<String>,
        exception_type: String,
        message: String,
    },

    /// The run deadline elapsed before a terminal event arrived.
    #[error("Execution timed out after {0:?}")]
    Timeout(Duration),

    /// The caller requested cancellation. Deliberate, not an engine fault.
    #[error("Execution cancelled by caller")]
    Cancelled,

    /// Transport failure: HTTP request failed, or the inbound event
    /// stream closed before a terminal event.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Monitor misuse or invariant violation (e.g. `run` before `submit`).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl JobError {
    /// Stable machine-readable reason code for caller-side retry policy.
    pub fn reason_code(&self) -> &'static str {
        match self {
            JobError::Validation { .. } => "validation_error",
            JobError::Engine { .. } => "execution_error",
            JobError::Timeout(_) => "timeout",
            JobError::Cancelled => "cancelled",
            JobError::Connection(_) => "connection_error",
            JobError::Internal(_) => "internal_error",
        }
    }

    /// Whether the failure came from the engine rejecting or aborting
    /// the workflow, as opposed to transport or caller action.
    pub fn is_engine_fault(&self) -> bool {
        matches!(self, JobError::Validation { .. } | JobError::Engine { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_codes_are_stable() {
        let e = JobError::Validation {
            message: "bad graph".into(),
            node_errors: serde_json::json!({"5": "missing input"}),
        };
        assert_eq!(e.reason_code(), "validation_error");
        assert_eq!(JobError::Cancelled.reason_code(), "cancelled");
        assert_eq!(
            JobError::Timeout(Duration::from_secs(60)).reason_code(),
            "timeout"
        );
    }

    #[test]
    fn engine_faults() {
        let e = JobError::Engine {
            node_id: Some("9".into()),
            exception_type: "RuntimeError".into(),
            message: "out of memory".into(),
        };
        assert!(e.is_engine_fault());
        assert!(!JobError::Cancelled.is_engine_fault());
        assert!(!JobError::Connection("refused".into()).is_engine_fault());
    }

    #[test]
    fn display_includes_detail() {
        let e = JobError::Engine {
            node_id: None,
            exception_type: "ValueError".into(),
            message: "bad latent size".into(),
        };
        let s = e.to_string();
        assert!(s.contains("ValueError"));
        assert!(s.contains("bad latent size"));
    }
}
