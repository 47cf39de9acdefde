/// Caller-supplied job identifier, unique per submission. Also used as
/// the engine `clientId` so events route back to the submitting client.
pub type ProcessId = String;

/// Engine-assigned identifier for a queued workflow.
pub type PromptId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Milliseconds since the Unix epoch, as carried on the relay wire.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
