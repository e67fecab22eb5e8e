//! Busy-spin wait strategy.

use crate::{WaitGroup, WaitSignal, WaitVerdict};
use crossbeam::utils::Backoff;
use microloop_clock::MicroClock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Wait group that busy-polls two atomic flags against the clock.
///
/// No OS blocking primitive is involved, so wake-up precision is unaffected
/// by the OS scheduler quantum: the deadline is compared against the clock on
/// every iteration. The cost is one fully utilized core for the entire wait.
/// [`Backoff::snooze`] yields the timeslice between checks once spinning has
/// gone on for a while, which keeps single-core machines livable without
/// giving up much precision.
pub struct SpinWaitGroup {
    clock: Arc<MicroClock>,
    stop_raised: AtomicBool,
    restart_raised: AtomicBool,
}

impl SpinWaitGroup {
    /// Create a spin wait group over the given clock.
    pub fn new(clock: Arc<MicroClock>) -> Self {
        Self {
            clock,
            stop_raised: AtomicBool::new(false),
            restart_raised: AtomicBool::new(false),
        }
    }
}

impl WaitGroup for SpinWaitGroup {
    fn wait_any(&self, wake_at_micros: i64) -> WaitVerdict {
        let backoff = Backoff::new();

        loop {
            // Stop is manual-reset: observed, never consumed.
            if self.stop_raised.load(Ordering::Acquire) {
                return WaitVerdict::Stop;
            }

            // Restart is auto-reset: the swap consumes it.
            if self.restart_raised.swap(false, Ordering::AcqRel) {
                return WaitVerdict::Restart;
            }

            if wake_at_micros == 0 {
                return WaitVerdict::TimedOut;
            }

            if wake_at_micros > 0 && self.clock.elapsed_micros() >= wake_at_micros {
                return WaitVerdict::TimedOut;
            }

            backoff.snooze();
        }
    }

    fn raise(&self, signal: WaitSignal) {
        match signal {
            WaitSignal::Restart => self.restart_raised.store(true, Ordering::Release),
            WaitSignal::Stop => self.stop_raised.store(true, Ordering::Release),
        }
    }
}
