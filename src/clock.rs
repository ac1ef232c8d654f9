//! Monotonic time source behind a trait
//!
//! Every timing decision in the crate (telemetry ticks, retry delays, the
//! link-probe wait) goes through [`Clock`]. Production code uses
//! [`SystemClock`]; tests substitute a manual clock whose sleeps advance
//! virtual time instantly.

use std::thread;
use std::time::{Duration, Instant};

/// Monotonic millisecond counter plus a blocking sleep.
pub trait Clock {
    /// Milliseconds elapsed since an arbitrary fixed origin.
    fn now_millis(&self) -> u64;

    /// Block the calling thread for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Wall-process clock over `Instant`, origin at construction time.
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now_millis();
        let b = clock.now_millis();
        assert!(b >= a);
    }

    #[test]
    fn system_clock_sleep_advances_time() {
        let clock = SystemClock::new();
        let before = clock.now_millis();
        clock.sleep(Duration::from_millis(15));
        let after = clock.now_millis();
        assert!(after >= before + 10, "slept {before} -> {after}");
    }
}
