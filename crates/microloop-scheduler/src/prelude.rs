//! Prelude module for common scheduler types.
//!
//! This module provides a convenient way to import the most commonly used
//! types from the scheduler crate.

pub use crate::error::{SchedulerError, SchedulerResult, TaskFailure};
pub use crate::events::{ExceptionSink, SchedulerEvent};
pub use crate::scheduler::{Scheduler, SchedulerBuilder};
pub use crate::task::{FnTask, Task, TaskId};
pub use microloop_waitgroup::{WaitStrategy, WaitVerdict};
