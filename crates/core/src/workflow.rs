//! Workflow graph as submitted to the engine.
//!
//! A workflow is an opaque JSON object mapping node id to node
//! definition. The worker never inspects node internals; only the key
//! set matters for progress estimation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An immutable node-graph job definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Workflow(serde_json::Map<String, Value>);

impl Workflow {
    pub fn new(nodes: serde_json::Map<String, Value>) -> Self {
        Self(nodes)
    }

    /// The total node set for the job: every declared node id.
    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn node_count(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Raw JSON object, as posted to the engine's `/prompt` endpoint.
    pub fn as_json(&self) -> &serde_json::Map<String, Value> {
        &self.0
    }
}

impl From<serde_json::Map<String, Value>> for Workflow {
    fn from(nodes: serde_json::Map<String, Value>) -> Self {
        Self(nodes)
    }
}
