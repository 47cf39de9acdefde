//! Shared types for the Helios generation worker.
//!
//! Holds the job identifier aliases, the workflow newtype, the
//! caller-facing error taxonomy, and the lifecycle phase enumeration
//! used on the relay wire.

pub mod error;
pub mod job_events;
pub mod types;
pub mod workflow;
