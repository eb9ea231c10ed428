//! Monotonic time source.
//!
//! The provisioning loop takes `now` as a parameter everywhere, but a join
//! attempt has to wait in place. [`Clock`] lets that wait run against a fake
//! clock in tests.

use std::time::{Duration, Instant};

/// Monotonic clock with a blocking sleep.
pub trait Clock {
    /// Current monotonic time.
    fn now(&self) -> Instant;

    /// Block the calling thread for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Clock backed by [`Instant::now`] and [`std::thread::sleep`].
///
/// On ESP-IDF, `std::thread::sleep` maps to a FreeRTOS delay, so the idle
/// task and the BLE host keep running while a join is polled.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
