//! Worker orchestration: wires the relay, lifecycle hooks, and the
//! execution monitor together for one job at a time.

pub mod config;
pub mod job;
