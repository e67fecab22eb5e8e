//! The scheduler: one worker thread driving a wake-time-ordered task store
//! through a pluggable wait strategy.

use crate::container::TaskContainer;
use crate::error::{PanicError, SchedulerError, SchedulerResult};
use crate::events::{EventDispatcher, ExceptionSink, SchedulerEvent, TracingExceptionSink};
use crate::task::{Task, TaskId};
use crate::wrapper::ScheduledTask;
use microloop_clock::MicroClock;
use microloop_waitgroup::{WaitGroup, WaitSignal, WaitStrategy, WaitVerdict};
use parking_lot::Mutex;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Once};
use std::thread::JoinHandle;

// Lifecycle states. `STARTING` covers the window between the clock-epoch
// restart and the worker being fully up; tasks added in that window anchor
// at offset zero, never against the stale pre-restart epoch.
const CREATED: u8 = 0;
const STARTING: u8 = 1;
const RUNNING: u8 = 2;
const DISPOSED: u8 = 3;

/// One-time worker thread configuration, run on the worker before the loop.
type WorkerSetup =
    Box<dyn FnOnce() -> Result<(), Box<dyn std::error::Error + Send + Sync>> + Send>;

/// State shared between the public handle and the worker thread.
struct SchedulerCore {
    clock: Arc<MicroClock>,
    container: TaskContainer,
    wait_group: Arc<dyn WaitGroup>,
    dispatcher: EventDispatcher,
    state: AtomicU8,
    worker_setup: Mutex<Option<WorkerSetup>>,
}

/// Configures and builds a [`Scheduler`].
///
/// Defaults: condition-variable waits and an exception sink that logs
/// through `tracing`.
pub struct SchedulerBuilder {
    wait_strategy: WaitStrategy,
    sink: Arc<dyn ExceptionSink>,
    handlers: Vec<Arc<dyn Fn(&SchedulerEvent) + Send + Sync>>,
    worker_setup: Option<WorkerSetup>,
}

impl Default for SchedulerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulerBuilder {
    pub fn new() -> Self {
        Self {
            wait_strategy: WaitStrategy::default(),
            sink: Arc::new(TracingExceptionSink),
            handlers: Vec::new(),
            worker_setup: None,
        }
    }

    /// Choose how the worker waits between wake times.
    #[must_use]
    pub fn wait_strategy(mut self, strategy: WaitStrategy) -> Self {
        self.wait_strategy = strategy;
        self
    }

    /// Replace the fallback destination for otherwise-unobserved errors.
    #[must_use]
    pub fn exception_sink(mut self, sink: impl ExceptionSink + 'static) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    /// Register a lifecycle event handler up front.
    ///
    /// Handlers run on the worker thread and must return promptly.
    #[must_use]
    pub fn on_event(mut self, handler: impl Fn(&SchedulerEvent) + Send + Sync + 'static) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// Run a one-time setup on the worker thread before the loop starts.
    ///
    /// The hook is the place to configure the worker for wake precision:
    /// elevate its scheduling priority, pin affinity, or apply a real-time
    /// policy. A setup error is logged through `tracing` and the worker
    /// continues with default thread settings.
    #[must_use]
    pub fn worker_setup<F>(mut self, setup: F) -> Self
    where
        F: FnOnce() -> Result<(), Box<dyn std::error::Error + Send + Sync>> + Send + 'static,
    {
        self.worker_setup = Some(Box::new(setup));
        self
    }

    pub fn build(self) -> Scheduler {
        let clock = Arc::new(MicroClock::new());
        let wait_group = self.wait_strategy.build(Arc::clone(&clock));
        let dispatcher = EventDispatcher::new(self.sink);
        for handler in self.handlers {
            dispatcher.subscribe(handler);
        }

        Scheduler {
            core: Arc::new(SchedulerCore {
                clock,
                container: TaskContainer::new(),
                wait_group,
                dispatcher,
                state: AtomicU8::new(CREATED),
                worker_setup: Mutex::new(self.worker_setup),
            }),
            worker: Mutex::new(None),
            dispose_once: Once::new(),
        }
    }
}

/// Periodic task scheduler with microsecond-resolution wake times.
///
/// One dedicated worker thread executes every task body and every lifecycle
/// event, serialized. `add_task`, `cancel_task` and `dispose` may be called
/// from any thread.
///
/// The schedule is fixed-rate: each repeating task's wake times advance by
/// exactly one interval per beat, anchored to the start epoch. A beat that
/// runs long leaves the next wake time in the past and the worker catches up
/// back-to-back instead of skipping.
///
/// # Example
///
/// ```no_run
/// use microloop_scheduler::{FnTask, Scheduler, WaitStrategy};
///
/// let scheduler = Scheduler::builder()
///     .wait_strategy(WaitStrategy::Condvar)
///     .build();
///
/// let mut beats = 0;
/// scheduler.add_task(FnTask::new(850, false, move || {
///     beats += 1;
///     Ok(beats < 1_000)
/// }));
/// scheduler.start()?;
/// # Ok::<(), microloop_scheduler::SchedulerError>(())
/// ```
pub struct Scheduler {
    core: Arc<SchedulerCore>,
    worker: Mutex<Option<JoinHandle<()>>>,
    dispose_once: Once,
}

impl Scheduler {
    /// A scheduler with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    #[must_use]
    pub fn builder() -> SchedulerBuilder {
        SchedulerBuilder::new()
    }

    /// Start the worker thread.
    ///
    /// The first call restarts the clock epoch and launches the worker;
    /// repeated calls while running are no-ops.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::AlreadyDisposed`] after [`Scheduler::dispose`], and
    /// [`SchedulerError::WorkerSpawn`] if the OS refuses the thread, in which
    /// case the scheduler stays startable.
    pub fn start(&self) -> SchedulerResult {
        match self.core.state.compare_exchange(
            CREATED,
            STARTING,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {}
            Err(DISPOSED) => return Err(SchedulerError::AlreadyDisposed),
            Err(_) => return Ok(()),
        }

        self.core.clock.restart();

        let core = Arc::clone(&self.core);
        let spawned = std::thread::Builder::new()
            .name("microloop-scheduler".to_string())
            .spawn(move || run_worker(&core));

        let handle = match spawned {
            Ok(handle) => handle,
            Err(error) => {
                // A concurrent dispose may already own the state; only roll
                // back a scheduler that is still starting.
                let _ = self.core.state.compare_exchange(
                    STARTING,
                    CREATED,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                );
                return Err(SchedulerError::WorkerSpawn(error));
            }
        };

        *self.worker.lock() = Some(handle);

        if self
            .core
            .state
            .compare_exchange(STARTING, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            // Disposed while starting. The stop signal is sticky, so the
            // fresh worker exits on its first wait; reap it here because
            // dispose may have already looked for it and found nothing.
            if let Some(handle) = self.worker.lock().take() {
                if handle.join().is_err() {
                    tracing::warn!("scheduler worker panicked during startup teardown");
                }
            }
            return Err(SchedulerError::AlreadyDisposed);
        }

        tracing::debug!("scheduler started");
        Ok(())
    }

    /// Schedule a task, returning its identifier for later cancellation.
    ///
    /// On a running scheduler the first wake is one interval from now; before
    /// [`Scheduler::start`] it is one interval from the eventual start.
    /// Silently ignored after disposal.
    pub fn add_task(&self, task: impl Task + 'static) -> TaskId {
        let id = task.id();
        let state = self.core.state.load(Ordering::Acquire);
        if state == DISPOSED {
            return id;
        }

        // Read the clock only in `RUNNING`: its store is ordered after the
        // epoch restart in `start`, so the reading can never come from the
        // stale pre-start epoch. In `CREATED` and the `STARTING` window the
        // offset is relative to the (imminent) start instead.
        let offset = if state == RUNNING {
            self.core.clock.elapsed_micros()
        } else {
            0
        };

        tracing::trace!(task_id = %id, interval_micros = task.interval_micros(), "task added");
        self.core
            .container
            .add(Arc::new(ScheduledTask::new(Box::new(task), offset)));
        self.core.wait_group.raise(WaitSignal::Restart);
        id
    }

    /// Remove a pending task. A no-op for unknown ids and after disposal.
    ///
    /// A task currently executing finishes its in-flight beat; see the crate
    /// docs for how cancellation races with re-arming.
    pub fn cancel_task(&self, id: TaskId) {
        if self.core.state.load(Ordering::Acquire) == DISPOSED {
            return;
        }
        tracing::trace!(task_id = %id, "task cancelled");
        self.core.container.remove_by_id(id);
        self.core.wait_group.raise(WaitSignal::Restart);
    }

    /// Number of tasks currently scheduled.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.core.container.count()
    }

    /// Subscribe to lifecycle events.
    ///
    /// Handlers run on the worker thread and must return promptly; a handler
    /// that panics is logged to the exception sink and skipped for that
    /// dispatch only.
    pub fn subscribe(&self, handler: impl Fn(&SchedulerEvent) + Send + Sync + 'static) {
        self.core.dispatcher.subscribe(Arc::new(handler));
    }

    /// Stop the worker and release the scheduler.
    ///
    /// Blocks until the worker thread has exited, bounded by the
    /// currently-executing task body. Safe to call without ever having
    /// started, and exactly-once under concurrent callers: every caller
    /// returns only after the stop sequence has fully run.
    pub fn dispose(&self) {
        self.dispose_once.call_once(|| {
            self.core.state.store(DISPOSED, Ordering::Release);
            self.core.dispatcher.dispatch(&SchedulerEvent::Stopping);
            self.core.wait_group.raise(WaitSignal::Stop);

            let worker = self.worker.lock().take();
            if let Some(handle) = worker {
                if let Err(payload) = handle.join() {
                    // The worker contains its own panics; reaching here means
                    // something escaped even the outer boundary.
                    let panic = PanicError::from_payload(payload);
                    self.core.dispatcher.sink().log_exception(&panic);
                }
            }

            self.core.dispatcher.dispatch(&SchedulerEvent::Stopped);
            tracing::debug!("scheduler disposed");
        });
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Worker entry point: the loop plus the fatal-error boundary around it.
///
/// A panic escaping the loop is reported once as `CriticalException` and the
/// thread exits. The scheduler stops making progress but still needs an
/// explicit `dispose` to be released.
fn run_worker(core: &SchedulerCore) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| {
        apply_worker_setup(core);
        run_loop(core);
    })) {
        let panic = PanicError::from_payload(payload);
        tracing::error!(error = %panic, "scheduler loop failed");
        core.dispatcher
            .dispatch(&SchedulerEvent::CriticalException(Arc::new(panic)));
    }
}

/// Thread configuration is best-effort: a failed setup leaves the worker on
/// default settings rather than refusing to schedule.
fn apply_worker_setup(core: &SchedulerCore) {
    if let Some(setup) = core.worker_setup.lock().take() {
        if let Err(error) = setup() {
            tracing::warn!(error = %error, "worker thread setup failed");
        }
    }
}

fn run_loop(core: &SchedulerCore) {
    core.dispatcher.dispatch(&SchedulerEvent::Started);

    loop {
        let verdict = match core.container.closest() {
            None => {
                core.dispatcher.dispatch(&SchedulerEvent::NoTask);
                core.wait_group.wait_any(-1)
            }
            Some(entry) => {
                // A wake time already in the past collapses to an immediate
                // poll of the signals.
                let deadline = entry.wake_at_micros().max(core.clock.elapsed_micros());
                core.wait_group.wait_any(deadline)
            }
        };

        match verdict {
            WaitVerdict::Stop => break,
            WaitVerdict::Restart => {}
            WaitVerdict::TimedOut => {
                // Re-read under the deadline that just fired: the due task
                // may have been cancelled while we were waiting, and an
                // empty container here is a legal no-op. The due check covers
                // the other side of that race, where the cancelled task's
                // replacement at the head is not ready yet.
                if let Some(entry) = core.container.closest() {
                    if entry.wake_at_micros() <= core.clock.elapsed_micros() {
                        execute_due(core, &entry);
                    }
                }
            }
        }
    }
}

fn execute_due(core: &SchedulerCore, entry: &Arc<ScheduledTask>) {
    core.dispatcher
        .dispatch(&SchedulerEvent::TaskBeginExecution(entry.id()));

    let needs_repeat = match entry.execute() {
        Ok(needs_repeat) => needs_repeat,
        Err(failure) => {
            let needs_repeat = failure.needs_repeat;
            core.dispatcher
                .dispatch(&SchedulerEvent::TaskRaisedException(Arc::new(failure)));
            needs_repeat
        }
    };

    // The wrapper already advanced its offset when repeating; this re-keys
    // it under the new wake time.
    if needs_repeat {
        core.container.reschedule(entry);
    } else {
        core.container.remove(entry);
    }

    core.dispatcher
        .dispatch(&SchedulerEvent::TaskEndExecution(entry.id()));
}
