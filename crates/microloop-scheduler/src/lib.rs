//! Microsecond-precision periodic task scheduler with pluggable wait
//! strategies.
//!
//! One dedicated worker thread drives a wake-time-ordered task store,
//! sleeping between beats through a [`WaitStrategy`] chosen at build time:
//!
//! - **Spin**: busy-polls with a yielding backoff for single-digit
//!   microsecond precision, burning a full core while waiting
//! - **Condvar**: blocks on a condition variable with millisecond-class
//!   precision and negligible idle cost (the default)
//! - **Channel**: blocks on a channel multi-wait, same precision class as
//!   `Condvar`, useful when composing with other channel-based plumbing
//!
//! Scheduling is fixed-rate: a task with interval `I` wakes at `I`, `2I`,
//! `3I`... from the start epoch regardless of how long each execution takes.
//! A beat that runs long is followed by back-to-back catch-up executions
//! rather than skipped beats, so a consistently slow task can starve its
//! neighbours; pick intervals with headroom.
//!
//! Lifecycle notifications flow through [`SchedulerEvent`] handlers
//! registered with [`Scheduler::subscribe`]; task failures with no
//! subscriber fall back to an [`ExceptionSink`] so they are never dropped
//! silently.
//!
//! # Example
//!
//! ```
//! use microloop_scheduler::{FnTask, Scheduler, WaitStrategy};
//! use std::sync::mpsc;
//! use std::time::Duration;
//!
//! let scheduler = Scheduler::builder()
//!     .wait_strategy(WaitStrategy::Condvar)
//!     .build();
//!
//! let (done, finished) = mpsc::channel();
//! scheduler.add_task(FnTask::new(1_000, false, move || {
//!     let _ = done.send(());
//!     Ok(false)
//! }));
//!
//! scheduler.start()?;
//! finished.recv_timeout(Duration::from_secs(5))?;
//! scheduler.dispose();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Cancellation caveat
//!
//! Cancelling a task that is mid-execution does not interrupt it. If that
//! beat then asks to repeat, the task is re-inserted and keeps running: the
//! cancellation is lost. Callers that need a hard stop should make the task
//! itself return `Ok(false)`.

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(static_mut_refs)]
#![deny(unused_must_use)]

mod container;
pub mod error;
pub mod events;
pub mod scheduler;
pub mod task;
mod wrapper;

pub mod prelude;

pub use error::{PanicError, SchedulerError, SchedulerResult, TaskFailure};
pub use events::{
    EventError, ExceptionSink, SchedulerEvent, TracingExceptionSink, WriterExceptionSink,
};
pub use scheduler::{Scheduler, SchedulerBuilder};
pub use task::{FnTask, Task, TaskId};

pub use microloop_clock::MicroClock;
pub use microloop_waitgroup::{WaitGroup, WaitSignal, WaitStrategy, WaitVerdict};
