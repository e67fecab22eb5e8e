//! Restartable monotonic microsecond clock.
//!
//! This crate provides [`MicroClock`], the shared time source for the
//! microloop scheduler. All scheduling arithmetic is expressed as absolute
//! microsecond timestamps read from one clock, so the clock must be:
//!
//! - **Monotonic**: readings never decrease between restarts
//! - **Restartable**: the epoch can be reset so that subsequent readings
//!   start from zero
//! - **Shareable**: readable from any thread concurrently
//!
//! # Example
//!
//! ```
//! use microloop_clock::MicroClock;
//!
//! let clock = MicroClock::new();
//! let before = clock.elapsed_micros();
//! let after = clock.elapsed_micros();
//! assert!(after >= before);
//! ```

use parking_lot::RwLock;
use std::time::Instant;

/// Monotonic microsecond counter with a restartable epoch.
///
/// Readings are microseconds elapsed since construction or the most recent
/// [`restart`](MicroClock::restart). The value is returned as `i64` because
/// the scheduler's wake-time arithmetic is signed (negative deadlines encode
/// "wait without timeout" at the wait-group boundary).
///
/// Reads take a shared lock that is uncontended except across a `restart`,
/// which the scheduler only performs before its worker thread exists.
#[derive(Debug)]
pub struct MicroClock {
    epoch: RwLock<Instant>,
}

impl MicroClock {
    /// Create a clock whose epoch is "now".
    pub fn new() -> Self {
        Self {
            epoch: RwLock::new(Instant::now()),
        }
    }

    /// Reset the epoch so that subsequent readings restart from zero.
    pub fn restart(&self) {
        let mut epoch = self.epoch.write();
        *epoch = Instant::now();
    }

    /// Microseconds elapsed since the epoch.
    ///
    /// Saturates at `i64::MAX`, which at microsecond resolution is roughly
    /// 292 thousand years of uptime.
    pub fn elapsed_micros(&self) -> i64 {
        let epoch = *self.epoch.read();
        i64::try_from(epoch.elapsed().as_micros()).unwrap_or(i64::MAX)
    }
}

impl Default for MicroClock {
    fn default() -> Self {
        Self::new()
    }
}
