//! Channel-select wait strategy.

use crate::{WaitGroup, WaitSignal, WaitVerdict, millis_until};
use crossbeam::channel::{Receiver, Select, Sender, bounded};
use microloop_clock::MicroClock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Wait group built on a pair of waitable channel handles.
///
/// The stop side is a sticky flag backed by a bounded(1) channel; the restart
/// side is a bare bounded(1) channel whose single slot gives it auto-reset
/// semantics: a raise with no waiter pending parks one message that the next
/// `wait_any` consumes, and repeated raises do not accumulate. Both receivers
/// are combined in a single `Select` multi-wait with a millisecond timeout,
/// so precision matches the condvar strategy. Useful when the wait must
/// interoperate with other channel-based machinery.
pub struct ChannelWaitGroup {
    clock: Arc<MicroClock>,
    stop_raised: AtomicBool,
    stop_tx: Sender<()>,
    stop_rx: Receiver<()>,
    restart_tx: Sender<()>,
    restart_rx: Receiver<()>,
}

impl ChannelWaitGroup {
    /// Create a channel wait group over the given clock.
    pub fn new(clock: Arc<MicroClock>) -> Self {
        let (stop_tx, stop_rx) = bounded(1);
        let (restart_tx, restart_rx) = bounded(1);
        Self {
            clock,
            stop_raised: AtomicBool::new(false),
            stop_tx,
            stop_rx,
            restart_tx,
            restart_rx,
        }
    }

    fn stop_is_raised(&self) -> bool {
        self.stop_raised.load(Ordering::Acquire)
    }
}

impl WaitGroup for ChannelWaitGroup {
    fn wait_any(&self, wake_at_micros: i64) -> WaitVerdict {
        loop {
            // The flag is the authoritative stop state; the channel message
            // exists only to wake blocked selects and is never consumed.
            if self.stop_is_raised() {
                return WaitVerdict::Stop;
            }

            if wake_at_micros == 0 {
                if self.restart_rx.try_recv().is_ok() {
                    return WaitVerdict::Restart;
                }
                return WaitVerdict::TimedOut;
            }

            let timeout = if wake_at_micros < 0 {
                None
            } else {
                match millis_until(&self.clock, wake_at_micros) {
                    Some(millis) => Some(Duration::from_millis(millis)),
                    None => return WaitVerdict::TimedOut,
                }
            };

            let mut select = Select::new();
            let stop_index = select.recv(&self.stop_rx);
            let restart_index = select.recv(&self.restart_rx);

            let ready = match timeout {
                Some(timeout) => select.ready_timeout(timeout),
                None => Ok(select.ready()),
            };

            match ready {
                // Timed out; the loop re-checks the remaining time and
                // returns TimedOut once the deadline has truly passed.
                Err(_) => continue,
                Ok(index) if index == stop_index => {
                    // Deliberately not consumed: the parked message keeps the
                    // channel ready so every other blocked waiter wakes too,
                    // emulating a manual-reset handle.
                    return WaitVerdict::Stop;
                }
                Ok(index) if index == restart_index => {
                    // Stop takes priority when both became ready together.
                    if self.stop_is_raised() {
                        return WaitVerdict::Stop;
                    }
                    if self.restart_rx.try_recv().is_ok() {
                        return WaitVerdict::Restart;
                    }
                    // Lost a ready-race; go around again.
                }
                Ok(_) => {}
            }
        }
    }

    fn raise(&self, signal: WaitSignal) {
        match signal {
            WaitSignal::Restart => {
                // A full slot means a raise is already pending; signals do
                // not accumulate.
                let _ = self.restart_tx.try_send(());
            }
            WaitSignal::Stop => {
                self.stop_raised.store(true, Ordering::Release);
                let _ = self.stop_tx.try_send(());
            }
        }
    }
}
