//! Lifecycle event stream and the exception logging sink.

use crate::error::PanicError;
use crate::task::TaskId;
use parking_lot::{Mutex, RwLock};
use std::io::Write;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

/// Shared error payload carried by exception events.
pub type EventError = Arc<dyn std::error::Error + Send + Sync>;

/// A lifecycle notification from the scheduler.
///
/// Events are dispatched synchronously on the worker thread; handlers that
/// block stall the schedule, so they must return promptly.
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    /// The worker thread is up and the loop has begun.
    Started,
    /// Disposal has been requested; the loop is winding down.
    Stopping,
    /// The worker loop has exited.
    Stopped,
    /// The loop woke up with nothing scheduled and is parked indefinitely.
    NoTask,
    /// A task is about to execute.
    TaskBeginExecution(TaskId),
    /// A task finished executing, successfully or not.
    TaskEndExecution(TaskId),
    /// A task reported a failure.
    TaskRaisedException(EventError),
    /// The worker loop itself failed; the scheduler is no longer running.
    CriticalException(EventError),
}

impl SchedulerEvent {
    /// The error payload, when this event carries one.
    fn exception(&self) -> Option<&EventError> {
        match self {
            Self::TaskRaisedException(error) | Self::CriticalException(error) => Some(error),
            _ => None,
        }
    }
}

/// How a single event dispatch went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DispatchOutcome {
    /// Nobody is subscribed; exception events were routed to the sink.
    NoSubscribers,
    /// Every handler ran without panicking.
    Delivered,
    /// At least one handler panicked; the panic was logged to the sink.
    HandlerFailed,
}

/// Destination for errors that would otherwise vanish.
///
/// Invoked for task and loop failures with no event subscriber, and for
/// panics raised by event handlers themselves.
pub trait ExceptionSink: Send + Sync {
    /// Record one error.
    fn log_exception(&self, error: &(dyn std::error::Error + 'static));
}

/// Sink that forwards errors to the `tracing` infrastructure.
#[derive(Debug, Default)]
pub struct TracingExceptionSink;

impl ExceptionSink for TracingExceptionSink {
    fn log_exception(&self, error: &(dyn std::error::Error + 'static)) {
        tracing::error!(error = %error, "scheduler exception");
    }
}

/// Sink that writes one line per error to an arbitrary writer.
///
/// Useful in tests and for plain-file logging without a `tracing`
/// subscriber. Write failures are swallowed; a logging sink has nowhere
/// left to report to.
pub struct WriterExceptionSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterExceptionSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl<W: Write + Send> ExceptionSink for WriterExceptionSink<W> {
    fn log_exception(&self, error: &(dyn std::error::Error + 'static)) {
        let mut writer = self.writer.lock();
        let _ = writeln!(writer, "scheduler exception: {error}");
        let mut cause = error.source();
        while let Some(source) = cause {
            let _ = writeln!(writer, "  caused by: {source}");
            cause = source.source();
        }
    }
}

type Handler = Arc<dyn Fn(&SchedulerEvent) + Send + Sync>;

/// Observer list with a catch-log boundary around every handler call.
///
/// A panicking handler never takes the worker thread down and is never
/// re-entered with its own failure; the panic goes to the sink and dispatch
/// continues with the remaining handlers.
pub(crate) struct EventDispatcher {
    handlers: RwLock<Vec<Handler>>,
    sink: Arc<dyn ExceptionSink>,
}

impl EventDispatcher {
    pub(crate) fn new(sink: Arc<dyn ExceptionSink>) -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
            sink,
        }
    }

    pub(crate) fn subscribe(&self, handler: Handler) {
        self.handlers.write().push(handler);
    }

    pub(crate) fn sink(&self) -> &dyn ExceptionSink {
        self.sink.as_ref()
    }

    /// Dispatch one event to every subscriber.
    ///
    /// Exception events with no subscribers fall through to the sink so a
    /// failure is never dropped on the floor.
    pub(crate) fn dispatch(&self, event: &SchedulerEvent) -> DispatchOutcome {
        let handlers = self.handlers.read().clone();

        if handlers.is_empty() {
            if let Some(error) = event.exception() {
                self.sink.log_exception(error.as_ref());
            }
            return DispatchOutcome::NoSubscribers;
        }

        let mut outcome = DispatchOutcome::Delivered;
        for handler in &handlers {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| handler(event))) {
                let panic = PanicError::from_payload(payload);
                self.sink.log_exception(&panic);
                outcome = DispatchOutcome::HandlerFailed;
            }
        }
        outcome
    }
}
