//! Error types for the scheduler crate.

use std::any::Any;
use thiserror::Error;

/// Errors reported by the scheduler's public surface.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The scheduler has been disposed; it cannot be started again.
    #[error("scheduler has been disposed")]
    AlreadyDisposed,

    /// The worker thread could not be spawned.
    #[error("failed to spawn scheduler worker thread: {0}")]
    WorkerSpawn(#[from] std::io::Error),
}

/// A specialized `Result` type for scheduler operations.
pub type SchedulerResult<T = ()> = std::result::Result<T, SchedulerError>;

/// A failed task execution.
///
/// The task layer decides whether it wants to run again *before* the error
/// propagates, so a failing periodic task is not silently dropped from the
/// schedule unless it opts out.
#[derive(Debug, Error)]
#[error("task execution failed: {source}")]
pub struct TaskFailure {
    /// Whether the task should stay scheduled despite the failure.
    pub needs_repeat: bool,

    /// The underlying error raised by the task.
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

impl TaskFailure {
    /// Wrap an error together with the task's repeat decision.
    pub fn new(
        needs_repeat: bool,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            needs_repeat,
            source: source.into(),
        }
    }
}

/// A caught panic, rendered as an error so it can travel through the event
/// stream and the exception sink.
#[derive(Debug, Clone, Error)]
#[error("panic: {0}")]
pub struct PanicError(String);

impl PanicError {
    /// Extract a printable message from a panic payload.
    pub(crate) fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&str>() {
            (*text).to_string()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "opaque panic payload".to_string()
        };
        Self(message)
    }
}
