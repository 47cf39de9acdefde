//! Lifecycle phases broadcast to upstream listeners over the relay.
//!
//! The relay envelope is `{"type": "<phase>", "data": {...}}`; the
//! phase set is fixed and matches what upstream callers dispatch on.

use serde::Serialize;

/// A job lifecycle milestone, as serialized on the relay wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    /// The engine picked up the job and began executing nodes.
    JobStarted,
    /// Completion percentage advanced.
    JobProgress,
    /// The job finished successfully.
    JobCompleted,
    /// The job failed, timed out, or was cancelled.
    JobFailed,
}

impl JobPhase {
    /// Wire name of the phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobPhase::JobStarted => "job_started",
            JobPhase::JobProgress => "job_progress",
            JobPhase::JobCompleted => "job_completed",
            JobPhase::JobFailed => "job_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_matches_wire_names() {
        for phase in [
            JobPhase::JobStarted,
            JobPhase::JobProgress,
            JobPhase::JobCompleted,
            JobPhase::JobFailed,
        ] {
            let json = serde_json::to_string(&phase).unwrap();
            assert_eq!(json, format!("\"{}\"", phase.as_str()));
        }
    }
}
