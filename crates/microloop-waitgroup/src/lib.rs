//! Tri-state wait primitive for the microloop scheduler worker.
//!
//! A [`WaitGroup`] lets exactly one worker thread block until one of three
//! things happens: a sticky **Stop** signal, a one-shot **Restart** signal,
//! or the arrival of an absolute deadline on the shared
//! [`MicroClock`](microloop_clock::MicroClock). Three interchangeable
//! implementations trade CPU burn for wake-up precision:
//!
//! - [`SpinWaitGroup`]: busy-polls atomics against the clock. Single-digit
//!   microsecond precision, fully occupies one core while waiting. Opt-in.
//! - [`CondvarWaitGroup`]: mutex-guarded flags woken through a condition
//!   variable. Precision bounded by OS thread-wake granularity (~1 ms).
//! - [`ChannelWaitGroup`]: two bounded(1) channels combined in one
//!   `crossbeam` select with a millisecond timeout. Same precision class as
//!   the condvar strategy, built on channel handles instead of a condvar.
//!
//! # Deadline encoding
//!
//! `wait_any` takes an absolute wake timestamp in microseconds on the shared
//! clock: negative means "no timeout, block until a signal", zero means "poll
//! the signals without blocking", positive is the absolute deadline. A
//! deadline already in the past times out immediately.

use microloop_clock::MicroClock;
use std::sync::Arc;

mod channel;
mod condvar;
mod spin;

pub use channel::ChannelWaitGroup;
pub use condvar::CondvarWaitGroup;
pub use spin::SpinWaitGroup;

/// Why `wait_any` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitVerdict {
    /// The sticky stop signal is raised. Every subsequent call returns
    /// `Stop` as well.
    Stop,
    /// A restart signal was consumed. The signal is auto-reset: exactly one
    /// waiter observes each raise.
    Restart,
    /// The deadline passed without a signal. A normal outcome, never an
    /// error.
    TimedOut,
}

/// Signals that can be raised on a wait group.
///
/// A timeout cannot be raised; it is only ever a [`WaitVerdict`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitSignal {
    /// Auto-reset: consumed by exactly one `wait_any`, retained while no
    /// waiter is pending.
    Restart,
    /// Manual-reset and sticky: once raised it is never cleared.
    Stop,
}

/// Tri-state wait primitive.
///
/// Raising `Stop` or `Restart` while a wait is in progress unblocks that wait
/// before any timeout fires. When both signals are available, `Stop` wins.
pub trait WaitGroup: Send + Sync {
    /// Block until a signal or the absolute deadline `wake_at_micros`.
    ///
    /// See the crate docs for the deadline encoding.
    fn wait_any(&self, wake_at_micros: i64) -> WaitVerdict;

    /// Raise a signal, waking a pending waiter if there is one.
    fn raise(&self, signal: WaitSignal);
}

/// Wait strategy selector, the factory side of the [`WaitGroup`] abstraction.
///
/// `Condvar` is the default: the spin strategy buys its precision with a
/// fully utilized core and must be chosen deliberately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitStrategy {
    /// Busy-spin against the clock. Highest precision, one core burned.
    Spin,
    /// Condition-variable blocking wait, millisecond granularity.
    #[default]
    Condvar,
    /// Channel-select blocking wait, millisecond granularity.
    Channel,
}

impl WaitStrategy {
    /// Build a wait group of this strategy over the given clock.
    pub fn build(self, clock: Arc<MicroClock>) -> Arc<dyn WaitGroup> {
        match self {
            WaitStrategy::Spin => Arc::new(SpinWaitGroup::new(clock)),
            WaitStrategy::Condvar => Arc::new(CondvarWaitGroup::new(clock)),
            WaitStrategy::Channel => Arc::new(ChannelWaitGroup::new(clock)),
        }
    }
}

/// Remaining whole milliseconds until `wake_at_micros`, rounded up.
///
/// Returns `None` when the deadline has already passed. Rounding up keeps the
/// blocking strategies waiting at least the requested duration, never less.
pub(crate) fn millis_until(clock: &MicroClock, wake_at_micros: i64) -> Option<u64> {
    let remaining = wake_at_micros.saturating_sub(clock.elapsed_micros());
    if remaining <= 0 {
        return None;
    }
    u64::try_from(remaining).ok().map(|r| r.div_ceil(1_000))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_millis_until_rounds_up() {
        let clock = MicroClock::new();
        let wake_at = clock.elapsed_micros() + 1_500;
        let millis = millis_until(&clock, wake_at);
        assert_eq!(millis, Some(2));
    }

    #[test]
    fn test_millis_until_past_deadline() {
        let clock = MicroClock::new();
        assert_eq!(millis_until(&clock, 0), None);
        assert_eq!(millis_until(&clock, -1), None);
    }

    #[test]
    fn test_default_strategy_is_blocking() {
        assert_eq!(WaitStrategy::default(), WaitStrategy::Condvar);
    }
}
