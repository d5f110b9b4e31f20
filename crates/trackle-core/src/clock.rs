//! Time sources.
//!
//! The limiter needs a monotonic instant and the token service needs unix
//! seconds. Both read from a [`Clock`] so tests can drive time by hand.

use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub trait Clock: Send + Sync {
    /// Monotonic now. Used for rate windows.
    fn now(&self) -> Instant;

    /// Wall-clock seconds since the unix epoch. Used for token expiry.
    fn unix_seconds(&self) -> u64;
}

/// The real clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn unix_seconds(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// A clock that only moves when [`ManualClock::advance`] is called.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    base_unix: u64,
    offset: Mutex<Duration>,
}

impl ManualClock {
    /// Starts at the current real time.
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            base_unix: SystemClock.unix_seconds(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset += by;
    }

    fn offset(&self) -> Duration {
        *self.offset.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + self.offset()
    }

    fn unix_seconds(&self) -> u64 {
        self.base_unix + self.offset().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_stands_still() {
        let clock = ManualClock::new();
        let a = clock.now();
        let b = clock.now();
        assert_eq!(a, b);
    }

    #[test]
    fn manual_clock_advances_both_readings() {
        let clock = ManualClock::new();
        let start = clock.now();
        let start_unix = clock.unix_seconds();

        clock.advance(Duration::from_secs(90));

        assert_eq!(clock.now() - start, Duration::from_secs(90));
        assert_eq!(clock.unix_seconds() - start_unix, 90);
    }

    #[test]
    fn system_clock_is_after_epoch() {
        assert!(SystemClock.unix_seconds() > 1_600_000_000);
    }
}
