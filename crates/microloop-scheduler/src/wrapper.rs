//! Schedulable wrapper around a user task.

use crate::error::{PanicError, TaskFailure};
use crate::task::{Task, TaskId};
use parking_lot::Mutex;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicI64, Ordering};

/// A task plus its wake-time bookkeeping.
///
/// The wrapper carries an accumulated offset in microseconds; the absolute
/// wake time is `interval + offset`. The offset starts at the clock reading
/// when the task was added to a running scheduler (first wake relative to
/// "now"), or at zero when added before start (first wake relative to the
/// eventual start).
///
/// On every repeat the offset advances by exactly one interval, anchoring the
/// schedule to its origin rather than to execution completion times. This is
/// fixed-rate scheduling: a slow beat leaves the next wake time already in
/// the past, and the scheduler catches up with back-to-back executions
/// instead of skipping beats. With non-negative intervals the wake time is
/// therefore non-decreasing across repeats.
pub(crate) struct ScheduledTask {
    id: TaskId,
    interval_micros: i64,
    offset_micros: AtomicI64,
    task: Mutex<Box<dyn Task>>,
}

impl ScheduledTask {
    /// Wrap a task with the given initial offset.
    pub(crate) fn new(task: Box<dyn Task>, initial_offset_micros: i64) -> Self {
        let id = task.id();
        let interval_micros = task.interval_micros();
        Self {
            id,
            interval_micros,
            offset_micros: AtomicI64::new(initial_offset_micros),
            task: Mutex::new(task),
        }
    }

    pub(crate) fn id(&self) -> TaskId {
        self.id
    }

    /// Absolute wake timestamp on the scheduler's clock.
    pub(crate) fn wake_at_micros(&self) -> i64 {
        self.interval_micros
            .saturating_add(self.offset_micros.load(Ordering::Acquire))
    }

    /// Run the task once and re-arm it when it wants another beat.
    ///
    /// The offset advances whenever the task reports `needs_repeat`, on the
    /// success path and on the failure path alike. A panic escaping the task
    /// body is contained here and converted into a non-repeating failure.
    pub(crate) fn execute(&self) -> Result<bool, TaskFailure> {
        let mut task = self.task.lock();

        let result = match catch_unwind(AssertUnwindSafe(|| task.execute())) {
            Ok(result) => result,
            Err(payload) => Err(TaskFailure::new(false, PanicError::from_payload(payload))),
        };

        let needs_repeat = match &result {
            Ok(needs_repeat) => *needs_repeat,
            Err(failure) => failure.needs_repeat,
        };

        if needs_repeat {
            self.offset_micros
                .fetch_add(self.interval_micros, Ordering::AcqRel);
        }

        result
    }
}

#[cfg(test)]
#[allow(clippy::assertions_on_result_states)]
mod tests {
    use super::*;
    use crate::task::FnTask;

    fn wrap<F>(interval_micros: i64, offset: i64, repeat_on_error: bool, action: F) -> ScheduledTask
    where
        F: FnMut() -> Result<bool, Box<dyn std::error::Error + Send + Sync>> + Send + 'static,
    {
        let task = FnTask::new(interval_micros, repeat_on_error, action);
        ScheduledTask::new(Box::new(task), offset)
    }

    #[test]
    fn test_wake_time_is_interval_plus_offset() {
        let entry = wrap(1_000, 250, false, || Ok(true));
        assert_eq!(entry.wake_at_micros(), 1_250);
    }

    #[test]
    fn test_repeat_advances_by_one_interval() {
        let entry = wrap(1_000, 0, false, || Ok(true));

        assert_eq!(entry.execute().ok(), Some(true));
        assert_eq!(entry.wake_at_micros(), 2_000);
        assert_eq!(entry.execute().ok(), Some(true));
        assert_eq!(entry.wake_at_micros(), 3_000);
    }

    #[test]
    fn test_completion_does_not_advance() {
        let entry = wrap(1_000, 0, false, || Ok(false));

        assert_eq!(entry.execute().ok(), Some(false));
        assert_eq!(entry.wake_at_micros(), 1_000);
    }

    #[test]
    fn test_failed_execution_still_rearms_when_repeating() {
        let entry = wrap(1_000, 0, true, || Err("flaky".into()));

        let result = entry.execute();
        assert!(result.is_err());
        assert_eq!(entry.wake_at_micros(), 2_000);
    }

    #[test]
    fn test_failed_execution_without_repeat_stays_put() {
        let entry = wrap(1_000, 0, false, || Err("fatal".into()));

        let result = entry.execute();
        assert!(result.is_err());
        assert_eq!(entry.wake_at_micros(), 1_000);
    }

    #[test]
    fn test_panicking_task_becomes_non_repeating_failure() {
        let entry = wrap(1_000, 0, true, || panic!("task blew up"));

        match entry.execute() {
            Err(failure) => {
                assert!(!failure.needs_repeat);
                assert!(failure.to_string().contains("panic"));
            }
            Ok(_) => unreachable!("panicking task must fail"),
        }
        assert_eq!(entry.wake_at_micros(), 1_000);
    }

    #[test]
    fn test_wake_time_monotonic_across_repeats() {
        let entry = wrap(700, 0, false, || Ok(true));

        let mut previous = entry.wake_at_micros();
        for _ in 0..50 {
            assert_eq!(entry.execute().ok(), Some(true));
            let current = entry.wake_at_micros();
            assert!(current >= previous);
            previous = current;
        }
    }
}
