//! The user-facing task contract.

use crate::error::TaskFailure;
use std::time::Duration;
use uuid::Uuid;

/// Opaque unique task identifier, used to cancel a pending task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Generate a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for TaskId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A unit of work re-awoken at a fixed microsecond interval.
///
/// The scheduler treats the identifier and interval as stable for the
/// lifetime of the task; both are read once when the task is added.
///
/// `execute` returns `Ok(true)` to stay scheduled for another interval and
/// `Ok(false)` to be removed after this run. On failure, the task decides its
/// own fate through [`TaskFailure::needs_repeat`] before the error is
/// reported.
pub trait Task: Send {
    /// Stable unique identifier.
    fn id(&self) -> TaskId;

    /// Re-awake interval in microseconds, measured on the scheduler's clock.
    fn interval_micros(&self) -> i64;

    /// Run one beat of the task. `Ok(true)` means "run me again".
    ///
    /// # Errors
    ///
    /// Returns [`TaskFailure`] when the work itself fails; the scheduler
    /// reports it and keeps or removes the task per `needs_repeat`.
    fn execute(&mut self) -> Result<bool, TaskFailure>;
}

/// Closure-backed [`Task`].
///
/// The closure returns `Ok(true)` to repeat. When it returns an error, the
/// `repeat_on_error` flag chosen at construction decides whether the task
/// stays scheduled.
///
/// # Example
///
/// ```
/// use microloop_scheduler::{FnTask, Task};
///
/// let mut remaining = 10;
/// let task = FnTask::new(250, false, move || {
///     remaining -= 1;
///     Ok(remaining > 0)
/// });
/// assert_eq!(task.interval_micros(), 250);
/// # let _ = task;
/// ```
pub struct FnTask<F> {
    id: TaskId,
    interval_micros: i64,
    repeat_on_error: bool,
    action: F,
}

impl<F> FnTask<F>
where
    F: FnMut() -> Result<bool, Box<dyn std::error::Error + Send + Sync>> + Send,
{
    /// Create a task with a generated id and a microsecond interval.
    pub fn new(interval_micros: i64, repeat_on_error: bool, action: F) -> Self {
        Self::with_id(TaskId::new(), interval_micros, repeat_on_error, action)
    }

    /// Create a task with a generated id and a `Duration` interval.
    ///
    /// Intervals are truncated to whole microseconds.
    pub fn from_interval(interval: Duration, repeat_on_error: bool, action: F) -> Self {
        let micros = i64::try_from(interval.as_micros()).unwrap_or(i64::MAX);
        Self::new(micros, repeat_on_error, action)
    }

    /// Create a task with a caller-chosen id.
    pub fn with_id(id: TaskId, interval_micros: i64, repeat_on_error: bool, action: F) -> Self {
        Self {
            id,
            interval_micros,
            repeat_on_error,
            action,
        }
    }

    /// The identifier this task was created with.
    pub fn task_id(&self) -> TaskId {
        self.id
    }
}

impl<F> Task for FnTask<F>
where
    F: FnMut() -> Result<bool, Box<dyn std::error::Error + Send + Sync>> + Send,
{
    fn id(&self) -> TaskId {
        self.id
    }

    fn interval_micros(&self) -> i64 {
        self.interval_micros
    }

    fn execute(&mut self) -> Result<bool, TaskFailure> {
        match (self.action)() {
            Ok(needs_repeat) => Ok(needs_repeat),
            Err(source) => Err(TaskFailure::new(self.repeat_on_error, source)),
        }
    }
}
