//! ComfyUI execution monitoring library.
//!
//! Provides typed message parsing, WebSocket and REST clients, the
//! per-job event classifier and progress estimator, the lifecycle
//! callback dispatcher, and the execution monitor that turns the
//! engine's loosely-ordered event stream into a monotonic percentage
//! and a single terminal result.

pub mod api;
pub mod callbacks;
pub mod classifier;
pub mod client;
pub mod messages;
pub mod monitor;
pub mod progress;
