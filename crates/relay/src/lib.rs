//! Outbound lifecycle relay.
//!
//! Forwards job lifecycle milestones to an upstream listener over an
//! independent WebSocket connection, using a fixed `{type, data}`
//! envelope. The relay is strictly best-effort: connection and send
//! failures are logged and absorbed, never surfaced as job failures.
//! A job's correctness must never depend on an external listener being
//! reachable.

pub mod envelope;
pub mod handle;

pub use envelope::RelayEnvelope;
pub use handle::{RelayHandle, RelaySender};
