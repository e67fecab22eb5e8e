//! Condition-variable wait strategy.

use crate::{WaitGroup, WaitSignal, WaitVerdict, millis_until};
use microloop_clock::MicroClock;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
struct Flags {
    stop: bool,
    restart: bool,
}

/// Wait group built on a mutex-guarded flag pair and a condition variable.
///
/// Relative wait durations are computed in whole milliseconds, with
/// sub-millisecond remainders rounded up so the wait blocks at least as long
/// as requested. Precision is therefore bounded by the OS thread-wake
/// granularity, commonly around one millisecond.
pub struct CondvarWaitGroup {
    clock: Arc<MicroClock>,
    flags: Mutex<Flags>,
    signal: Condvar,
}

impl CondvarWaitGroup {
    /// Create a condvar wait group over the given clock.
    pub fn new(clock: Arc<MicroClock>) -> Self {
        Self {
            clock,
            flags: Mutex::new(Flags::default()),
            signal: Condvar::new(),
        }
    }
}

impl WaitGroup for CondvarWaitGroup {
    fn wait_any(&self, wake_at_micros: i64) -> WaitVerdict {
        let mut flags = self.flags.lock();

        loop {
            if flags.stop {
                return WaitVerdict::Stop;
            }
            if flags.restart {
                flags.restart = false;
                return WaitVerdict::Restart;
            }

            if wake_at_micros == 0 {
                return WaitVerdict::TimedOut;
            }

            if wake_at_micros < 0 {
                // No deadline: sleep until a raise notifies us.
                self.signal.wait(&mut flags);
                continue;
            }

            let Some(millis) = millis_until(&self.clock, wake_at_micros) else {
                return WaitVerdict::TimedOut;
            };

            // A wake here may be a signal, a timeout, or spurious; the loop
            // re-evaluates the flags and the remaining time either way.
            let _ = self
                .signal
                .wait_for(&mut flags, Duration::from_millis(millis));
        }
    }

    fn raise(&self, signal: WaitSignal) {
        let mut flags = self.flags.lock();
        match signal {
            WaitSignal::Restart => flags.restart = true,
            WaitSignal::Stop => flags.stop = true,
        }
        drop(flags);
        // Broadcast so concurrent waiters all observe a sticky stop.
        self.signal.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group() -> CondvarWaitGroup {
        CondvarWaitGroup::new(Arc::new(MicroClock::new()))
    }

    #[test]
    fn test_poll_without_signals_times_out() {
        let group = group();
        assert_eq!(group.wait_any(0), WaitVerdict::TimedOut);
    }

    #[test]
    fn test_poll_observes_pending_restart() {
        let group = group();
        group.raise(WaitSignal::Restart);
        assert_eq!(group.wait_any(0), WaitVerdict::Restart);
        assert_eq!(group.wait_any(0), WaitVerdict::TimedOut);
    }

    #[test]
    fn test_stop_is_sticky() {
        let group = group();
        group.raise(WaitSignal::Stop);
        assert_eq!(group.wait_any(-1), WaitVerdict::Stop);
        assert_eq!(group.wait_any(0), WaitVerdict::Stop);
    }

    #[test]
    fn test_blocks_at_least_requested_duration() {
        let group = group();
        let start = group.clock.elapsed_micros();
        let wake_at = start + 5_500;
        assert_eq!(group.wait_any(wake_at), WaitVerdict::TimedOut);
        assert!(group.clock.elapsed_micros() >= wake_at);
    }

    #[test]
    fn test_past_deadline_times_out_immediately() {
        let group = group();
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(group.wait_any(1), WaitVerdict::TimedOut);
    }
}
