//! Wire envelope for relayed lifecycle events.

use serde::Serialize;

use helios_core::job_events::JobPhase;

/// The fixed message shape sent upstream: `{"type": "<phase>", "data": {...}}`.
#[derive(Debug, Clone, Serialize)]
pub struct RelayEnvelope {
    #[serde(rename = "type")]
    pub phase: JobPhase,
    pub data: serde_json::Value,
}

impl RelayEnvelope {
    pub fn new(phase: JobPhase, data: serde_json::Value) -> Self {
        Self { phase, data }
    }

    pub fn to_json(&self) -> String {
        // Serialization of a Value + unit enum cannot fail.
        serde_json::to_string(self).expect("envelope serialization")
    }
}
