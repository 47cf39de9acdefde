//! Lifecycle hooks and the at-most-once dispatcher.
//!
//! Listener code must never be able to break the monitor: every hook
//! invocation is wrapped in `catch_unwind`, and the dispatcher enforces
//! that `on_start` fires at most once and that exactly one terminal
//! hook (`on_done` or `on_error`) fires per job.

use std::panic::{catch_unwind, AssertUnwindSafe};

use helios_core::error::JobError;
use helios_core::types::{ProcessId, PromptId};

/// Fired once when the engine begins executing the job.
#[derive(Debug, Clone)]
pub struct StartInfo {
    pub process_id: ProcessId,
    /// Submit-to-first-event delay in milliseconds.
    pub execution_delay_ms: u64,
}

/// Fired on every `executing` event with the new percentage.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    pub process_id: ProcessId,
    /// Completion percentage in [0, 100], monotonically non-decreasing.
    pub percentage: f64,
    pub current_node: Option<String>,
}

/// Fired once on successful completion.
#[derive(Debug, Clone)]
pub struct DoneInfo {
    pub process_id: ProcessId,
    pub prompt_id: PromptId,
}

type Hook<T> = Box<dyn FnMut(&T) + Send>;

/// Listener hooks for one job. All fields are optional.
#[derive(Default)]
pub struct ExecutionCallbacks {
    pub on_start: Option<Hook<StartInfo>>,
    pub on_progress: Option<Hook<ProgressInfo>>,
    pub on_done: Option<Hook<DoneInfo>>,
    pub on_error: Option<Hook<JobError>>,
}

impl ExecutionCallbacks {
    pub fn on_start(mut self, hook: impl FnMut(&StartInfo) + Send + 'static) -> Self {
        self.on_start = Some(Box::new(hook));
        self
    }

    pub fn on_progress(mut self, hook: impl FnMut(&ProgressInfo) + Send + 'static) -> Self {
        self.on_progress = Some(Box::new(hook));
        self
    }

    pub fn on_done(mut self, hook: impl FnMut(&DoneInfo) + Send + 'static) -> Self {
        self.on_done = Some(Box::new(hook));
        self
    }

    pub fn on_error(mut self, hook: impl FnMut(&JobError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(hook));
        self
    }
}

/// Invokes listener hooks with at-most-once guarantees.
///
/// `start` fires at most once; `done` and `error` share a single
/// terminal slot; `progress` fires any number of times before the
/// terminal and never after.
pub struct CallbackDispatcher {
    callbacks: ExecutionCallbacks,
    started: bool,
    resolved: bool,
}

impl CallbackDispatcher {
    pub fn new(callbacks: ExecutionCallbacks) -> Self {
        Self {
            callbacks,
            started: false,
            resolved: false,
        }
    }

    /// Whether a terminal hook has already fired.
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    pub fn start(&mut self, info: &StartInfo) {
        if self.started || self.resolved {
            return;
        }
        self.started = true;
        if let Some(hook) = self.callbacks.on_start.as_mut() {
            invoke(hook, info, "on_start");
        }
    }

    pub fn progress(&mut self, info: &ProgressInfo) {
        if self.resolved {
            return;
        }
        if let Some(hook) = self.callbacks.on_progress.as_mut() {
            invoke(hook, info, "on_progress");
        }
    }

    pub fn done(&mut self, info: &DoneInfo) {
        if self.resolved {
            return;
        }
        self.resolved = true;
        if let Some(hook) = self.callbacks.on_done.as_mut() {
            invoke(hook, info, "on_done");
        }
    }

    pub fn error(&mut self, err: &JobError) {
        if self.resolved {
            return;
        }
        self.resolved = true;
        if let Some(hook) = self.callbacks.on_error.as_mut() {
            invoke(hook, err, "on_error");
        }
    }
}

/// Run one hook, swallowing a panic so listener bugs cannot take the
/// monitor down with them.
fn invoke<T>(hook: &mut Hook<T>, payload: &T, name: &str) {
    if catch_unwind(AssertUnwindSafe(|| hook(payload))).is_err() {
        tracing::error!(hook = name, "Listener callback panicked; ignoring");
    }
}
