//! ComfyUI WebSocket message types and parsers.
//!
//! ComfyUI sends JSON text frames over WebSocket with the shape
//! `{"type": "<kind>", "data": {...}}`. This module deserializes them
//! into a strongly-typed [`EngineMessage`] enum. The same socket may
//! also carry binary frames (node preview images) with a fixed 8-byte
//! header; [`parse_binary_frame`] splits those off so they never reach
//! the event classifier.

use serde::Deserialize;

/// All known ComfyUI WebSocket message types.
///
/// Deserialized via the internally-tagged `"type"` field with
/// associated `"data"` content.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum EngineMessage {
    /// Server status broadcast (queue depth, etc.). Not addressed to a
    /// specific prompt.
    #[serde(rename = "status")]
    Status(StatusData),

    /// A prompt has started executing.
    #[serde(rename = "execution_start")]
    ExecutionStart(ExecutionStartData),

    /// Some nodes were skipped because their outputs are cached.
    #[serde(rename = "execution_cached")]
    ExecutionCached(ExecutionCachedData),

    /// A specific node is currently executing, or execution finished
    /// when `node` is `None`.
    #[serde(rename = "executing")]
    Executing(ExecutingData),

    /// Step-level progress within a long-running node (e.g. KSampler).
    #[serde(rename = "progress")]
    Progress(ProgressData),

    /// A node has finished and produced output.
    #[serde(rename = "executed")]
    Executed(ExecutedData),

    /// The engine marked the whole prompt completed.
    #[serde(rename = "completed")]
    Completed(CompletedData),

    /// Execution failed with an error.
    #[serde(rename = "execution_error")]
    ExecutionError(ErrorData),
}

/// Queue status information.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusData {
    pub status: QueueStatus,
}

/// Current queue state.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueStatus {
    pub exec_info: ExecInfo,
}

/// Execution queue statistics.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecInfo {
    pub queue_remaining: i32,
}

/// Payload for `execution_start` messages.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionStartData {
    pub prompt_id: String,
}

/// Payload for `execution_cached` messages.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionCachedData {
    pub prompt_id: String,
    /// Node IDs whose outputs were served from cache.
    #[serde(default)]
    pub nodes: Vec<String>,
}

/// Payload for `executing` messages.
///
/// When `node` is `None`, execution of the prompt has completed. This
/// is the engine's own end-of-graph sentinel.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutingData {
    pub node: Option<String>,
    pub prompt_id: String,
}

/// Payload for `progress` messages (step-level progress within a node).
#[derive(Debug, Clone, Deserialize)]
pub struct ProgressData {
    /// Current step number.
    pub value: i64,
    /// Total number of steps.
    pub max: i64,
    /// Present on newer engine versions; older ones broadcast without it.
    #[serde(default)]
    pub prompt_id: Option<String>,
    /// The node the steps belong to, if reported.
    #[serde(default)]
    pub node: Option<String>,
}

/// Payload for `executed` messages (node output).
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutedData {
    /// The node that produced this output.
    pub node: String,
    /// Raw output value (images, filenames, etc.).
    pub output: serde_json::Value,
    pub prompt_id: String,
}

/// Payload for `completed` messages.
#[derive(Debug, Clone, Deserialize)]
pub struct CompletedData {
    pub prompt_id: String,
}

/// Payload for `execution_error` messages.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorData {
    pub prompt_id: String,
    #[serde(default)]
    pub node_id: Option<String>,
    pub exception_message: String,
    pub exception_type: String,
}

/// Parse a ComfyUI WebSocket text frame into a typed enum.
///
/// Returns `Err` for malformed JSON or unknown `type` values.
/// Callers should log unknown types and continue.
pub fn parse_message(text: &str) -> Result<EngineMessage, serde_json::Error> {
    serde_json::from_str(text)
}

// ---------------------------------------------------------------------------
// Binary frames
// ---------------------------------------------------------------------------

/// Binary frame event kind for preview images.
pub const BINARY_EVENT_PREVIEW_IMAGE: u32 = 1;

/// Preview image format: JPEG.
pub const PREVIEW_FORMAT_JPEG: u32 = 1;
/// Preview image format: PNG.
pub const PREVIEW_FORMAT_PNG: u32 = 2;

/// A binary frame from the engine socket: 4-byte big-endian event kind,
/// 4-byte big-endian format, then the raw payload bytes.
#[derive(Debug, Clone)]
pub struct BinaryFrame {
    pub event: u32,
    pub format: u32,
    pub payload: Vec<u8>,
}

/// Split a binary WebSocket frame into header and payload.
///
/// Returns `None` when the frame is shorter than the 8-byte header.
pub fn parse_binary_frame(bytes: &[u8]) -> Option<BinaryFrame> {
    if bytes.len() < 8 {
        return None;
    }
    let event = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let format = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    Some(BinaryFrame {
        event,
        format,
        payload: bytes[8..].to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_status_message() {
        let json = r#"{"type":"status","data":{"status":{"exec_info":{"queue_remaining":3}}}}"#;
        let msg = parse_message(json).unwrap();
        match msg {
            EngineMessage::Status(data) => {
                assert_eq!(data.status.exec_info.queue_remaining, 3);
            }
            other => panic!("Expected Status, got {other:?}"),
        }
    }

    #[test]
    fn parse_execution_start_message() {
        let json = r#"{"type":"execution_start","data":{"prompt_id":"abc-123"}}"#;
        let msg = parse_message(json).unwrap();
        match msg {
            EngineMessage::ExecutionStart(data) => {
                assert_eq!(data.prompt_id, "abc-123");
            }
            other => panic!("Expected ExecutionStart, got {other:?}"),
        }
    }

    #[test]
    fn parse_execution_cached_message() {
        let json =
            r#"{"type":"execution_cached","data":{"prompt_id":"abc","nodes":["1","2","3"]}}"#;
        let msg = parse_message(json).unwrap();
        match msg {
            EngineMessage::ExecutionCached(data) => {
                assert_eq!(data.prompt_id, "abc");
                assert_eq!(data.nodes, vec!["1", "2", "3"]);
            }
            other => panic!("Expected ExecutionCached, got {other:?}"),
        }
    }

    #[test]
    fn parse_execution_cached_without_nodes() {
        let json = r#"{"type":"execution_cached","data":{"prompt_id":"abc"}}"#;
        let msg = parse_message(json).unwrap();
        match msg {
            EngineMessage::ExecutionCached(data) => {
                assert!(data.nodes.is_empty());
            }
            other => panic!("Expected ExecutionCached, got {other:?}"),
        }
    }

    #[test]
    fn parse_executing_with_node() {
        let json = r#"{"type":"executing","data":{"node":"42","prompt_id":"xyz"}}"#;
        let msg = parse_message(json).unwrap();
        match msg {
            EngineMessage::Executing(data) => {
                assert_eq!(data.node.as_deref(), Some("42"));
                assert_eq!(data.prompt_id, "xyz");
            }
            other => panic!("Expected Executing, got {other:?}"),
        }
    }

    #[test]
    fn parse_executing_finished_sentinel() {
        let json = r#"{"type":"executing","data":{"node":null,"prompt_id":"xyz"}}"#;
        let msg = parse_message(json).unwrap();
        match msg {
            EngineMessage::Executing(data) => {
                assert!(data.node.is_none());
            }
            other => panic!("Expected Executing, got {other:?}"),
        }
    }

    #[test]
    fn parse_progress_message() {
        let json = r#"{"type":"progress","data":{"value":5,"max":20}}"#;
        let msg = parse_message(json).unwrap();
        match msg {
            EngineMessage::Progress(data) => {
                assert_eq!(data.value, 5);
                assert_eq!(data.max, 20);
                assert!(data.prompt_id.is_none());
            }
            other => panic!("Expected Progress, got {other:?}"),
        }
    }

    #[test]
    fn parse_progress_message_with_prompt_id() {
        let json = r#"{"type":"progress","data":{"value":5,"max":20,"prompt_id":"abc","node":"3"}}"#;
        let msg = parse_message(json).unwrap();
        match msg {
            EngineMessage::Progress(data) => {
                assert_eq!(data.prompt_id.as_deref(), Some("abc"));
                assert_eq!(data.node.as_deref(), Some("3"));
            }
            other => panic!("Expected Progress, got {other:?}"),
        }
    }

    #[test]
    fn parse_executed_message() {
        let json = r#"{"type":"executed","data":{"node":"9","output":{"images":[{"filename":"out.png"}]},"prompt_id":"abc"}}"#;
        let msg = parse_message(json).unwrap();
        match msg {
            EngineMessage::Executed(data) => {
                assert_eq!(data.node, "9");
                assert_eq!(data.prompt_id, "abc");
                assert!(data.output.is_object());
            }
            other => panic!("Expected Executed, got {other:?}"),
        }
    }

    #[test]
    fn parse_execution_error_message() {
        let json = r#"{"type":"execution_error","data":{"prompt_id":"abc","node_id":"5","exception_message":"out of memory","exception_type":"RuntimeError"}}"#;
        let msg = parse_message(json).unwrap();
        match msg {
            EngineMessage::ExecutionError(data) => {
                assert_eq!(data.prompt_id, "abc");
                assert_eq!(data.node_id.as_deref(), Some("5"));
                assert_eq!(data.exception_message, "out of memory");
                assert_eq!(data.exception_type, "RuntimeError");
            }
            other => panic!("Expected ExecutionError, got {other:?}"),
        }
    }

    #[test]
    fn parse_execution_error_without_node() {
        let json = r#"{"type":"execution_error","data":{"prompt_id":"abc","exception_message":"boom","exception_type":"Exception"}}"#;
        let msg = parse_message(json).unwrap();
        match msg {
            EngineMessage::ExecutionError(data) => assert!(data.node_id.is_none()),
            other => panic!("Expected ExecutionError, got {other:?}"),
        }
    }

    #[test]
    fn parse_unknown_type_returns_error() {
        let json = r#"{"type":"unknown_thing","data":{}}"#;
        assert!(parse_message(json).is_err());
    }

    #[test]
    fn parse_invalid_json_returns_error() {
        assert!(parse_message("not json at all").is_err());
    }

    #[test]
    fn binary_frame_header_split() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&BINARY_EVENT_PREVIEW_IMAGE.to_be_bytes());
        bytes.extend_from_slice(&PREVIEW_FORMAT_PNG.to_be_bytes());
        bytes.extend_from_slice(b"fake png bytes");

        let frame = parse_binary_frame(&bytes).unwrap();
        assert_eq!(frame.event, BINARY_EVENT_PREVIEW_IMAGE);
        assert_eq!(frame.format, PREVIEW_FORMAT_PNG);
        assert_eq!(frame.payload, b"fake png bytes");
    }

    #[test]
    fn binary_frame_too_short() {
        assert!(parse_binary_frame(&[0, 0, 0, 1]).is_none());
        assert!(parse_binary_frame(&[]).is_none());
    }

    #[test]
    fn binary_frame_empty_payload() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1u32.to_be_bytes());
        bytes.extend_from_slice(&PREVIEW_FORMAT_JPEG.to_be_bytes());
        let frame = parse_binary_frame(&bytes).unwrap();
        assert!(frame.payload.is_empty());
    }
}
