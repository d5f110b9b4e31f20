//! Per-client request admission using a sliding-window log.
//!
//! Every admitted request leaves its timestamp in the client's window. A new
//! request is admitted only while fewer than `limit` timestamps remain inside
//! the trailing `window`. Rejected attempts are not recorded.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::error::{CoreError, CoreResult};

/// How many requests a single client may make within a trailing window.
///
/// In TOML the window is `window_secs`, which may be fractional (`0.5`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatePolicy {
    pub limit: u32,
    #[serde(rename = "window_secs", with = "window_seconds")]
    pub window: Duration,
}

impl RatePolicy {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window }
    }

    /// 1000 requests per minute, applied to every route.
    pub fn default_policy() -> Self {
        Self::new(1000, Duration::from_secs(60))
    }

    /// 10 requests per minute, applied to registration and login.
    pub fn strict() -> Self {
        Self::new(10, Duration::from_secs(60))
    }

    /// Rejects a zero limit or a zero-length window.
    pub fn validate(&self) -> CoreResult<()> {
        if self.limit == 0 {
            return Err(CoreError::Validation(
                "rate limit must allow at least one request".to_string(),
            ));
        }
        if self.window.is_zero() {
            return Err(CoreError::Validation(
                "rate limit window must be longer than zero".to_string(),
            ));
        }
        Ok(())
    }
}

mod window_seconds {
    use std::fmt;
    use std::time::Duration;

    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(window: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        if window.subsec_nanos() == 0 {
            serializer.serialize_u64(window.as_secs())
        } else {
            serializer.serialize_f64(window.as_secs_f64())
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        deserializer.deserialize_any(SecondsVisitor)
    }

    struct SecondsVisitor;

    impl Visitor<'_> for SecondsVisitor {
        type Value = Duration;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a non-negative number of seconds")
        }

        fn visit_u64<E: de::Error>(self, secs: u64) -> Result<Duration, E> {
            Ok(Duration::from_secs(secs))
        }

        fn visit_i64<E: de::Error>(self, secs: i64) -> Result<Duration, E> {
            u64::try_from(secs)
                .map(Duration::from_secs)
                .map_err(|_| E::custom("window_secs must not be negative"))
        }

        fn visit_f64<E: de::Error>(self, secs: f64) -> Result<Duration, E> {
            Duration::try_from_secs_f64(secs).map_err(|e| E::custom(format!("window_secs: {e}")))
        }
    }
}

/// Sliding-window-log limiter keyed by client.
///
/// The per-key deque lives behind a `DashMap` entry guard, so the
/// prune-decide-append sequence for one key is a single critical section
/// while unrelated keys on other shards proceed in parallel.
pub struct SlidingWindowLimiter {
    policy: RatePolicy,
    windows: DashMap<String, VecDeque<Instant>>,
    clock: Arc<dyn Clock>,
}

impl SlidingWindowLimiter {
    pub fn new(policy: RatePolicy) -> CoreResult<Self> {
        Self::with_clock(policy, Arc::new(SystemClock))
    }

    pub fn with_clock(policy: RatePolicy, clock: Arc<dyn Clock>) -> CoreResult<Self> {
        policy.validate()?;
        Ok(Self {
            policy,
            windows: DashMap::new(),
            clock,
        })
    }

    pub fn policy(&self) -> RatePolicy {
        self.policy
    }

    /// Returns `true` and records the request if `client_key` is under its
    /// limit, otherwise returns `false` and records nothing.
    pub fn admit(&self, client_key: &str) -> bool {
        let now = self.clock.now();
        let cutoff = now.checked_sub(self.policy.window);

        let mut entry = self.windows.entry(client_key.to_owned()).or_default();
        let timestamps = entry.value_mut();

        if let Some(cutoff) = cutoff {
            prune(timestamps, cutoff);
        }

        if timestamps.len() >= self.policy.limit as usize {
            tracing::debug!(
                "Rate limit hit: key={client_key}, limit={}, window={:?}",
                self.policy.limit,
                self.policy.window
            );
            return false;
        }

        timestamps.push_back(now);
        true
    }

    /// Drops keys whose windows have fully expired.
    pub fn purge_idle(&self) {
        let Some(cutoff) = self.clock.now().checked_sub(self.policy.window) else {
            return;
        };
        self.windows.retain(|_, timestamps| {
            prune(timestamps, cutoff);
            !timestamps.is_empty()
        });
    }

    /// Number of client keys currently holding any state.
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

/// Removes timestamps strictly older than `cutoff`. The deque is ordered
/// oldest-first so pruning stops at the first survivor.
fn prune(timestamps: &mut VecDeque<Instant>, cutoff: Instant) {
    while let Some(&front) = timestamps.front() {
        if front < cutoff {
            timestamps.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn limiter(limit: u32, window_secs: u64) -> (SlidingWindowLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        // Start well past the window so `now - window` never underflows.
        clock.advance(Duration::from_secs(3600));
        let limiter = SlidingWindowLimiter::with_clock(
            RatePolicy::new(limit, Duration::from_secs(window_secs)),
            clock.clone(),
        )
        .unwrap();
        (limiter, clock)
    }

    #[test]
    fn strict_example_ten_then_reject_then_recover() {
        let (limiter, clock) = limiter(10, 60);

        for _ in 0..10 {
            assert!(limiter.admit("10.0.0.1"));
        }
        assert!(!limiter.admit("10.0.0.1"));

        clock.advance(Duration::from_secs(61));
        assert!(limiter.admit("10.0.0.1"));
    }

    #[test]
    fn unknown_key_is_admitted() {
        let (limiter, _) = limiter(1, 60);
        assert!(limiter.admit("fresh"));
    }

    #[test]
    fn keys_are_independent() {
        let (limiter, _) = limiter(2, 60);
        assert!(limiter.admit("a"));
        assert!(limiter.admit("a"));
        assert!(!limiter.admit("a"));
        assert!(limiter.admit("b"));
    }

    #[test]
    fn rejected_attempts_are_not_recorded() {
        let (limiter, clock) = limiter(2, 60);
        assert!(limiter.admit("k"));
        clock.advance(Duration::from_secs(30));
        assert!(limiter.admit("k"));

        // Hammering while full must not extend the window.
        for _ in 0..5 {
            assert!(!limiter.admit("k"));
        }

        // First timestamp leaves the window, one slot opens.
        clock.advance(Duration::from_secs(31));
        assert!(limiter.admit("k"));
        assert!(!limiter.admit("k"));
    }

    #[test]
    fn timestamp_exactly_at_cutoff_still_counts() {
        let (limiter, clock) = limiter(1, 60);
        assert!(limiter.admit("k"));
        clock.advance(Duration::from_secs(60));
        assert!(!limiter.admit("k"));
        clock.advance(Duration::from_secs(1));
        assert!(limiter.admit("k"));
    }

    #[test]
    fn young_process_does_not_prune() {
        // Fresh clock: `now - window` may precede the process start.
        let clock = Arc::new(ManualClock::new());
        let limiter = SlidingWindowLimiter::with_clock(
            RatePolicy::new(1, Duration::from_secs(u32::MAX as u64)),
            clock,
        )
        .unwrap();
        assert!(limiter.admit("k"));
        assert!(!limiter.admit("k"));
    }

    #[test]
    fn never_exceeds_limit_in_any_trailing_window() {
        let (limiter, clock) = limiter(5, 10);
        let mut admitted: Vec<u64> = Vec::new();

        for second in 0..60u64 {
            for _ in 0..3 {
                if limiter.admit("k") {
                    admitted.push(second);
                }
            }
            clock.advance(Duration::from_secs(1));
        }

        for &start in &admitted {
            let in_window = admitted
                .iter()
                .filter(|&&t| t >= start && t <= start + 10)
                .count();
            assert!(in_window <= 5, "window starting at {start} admitted {in_window}");
        }
    }

    #[test]
    fn concurrent_admits_respect_limit() {
        let (limiter, _) = limiter(50, 60);
        let admitted = std::sync::atomic::AtomicUsize::new(0);

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..20 {
                        if limiter.admit("shared") {
                            admitted.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                        }
                    }
                });
            }
        });

        assert_eq!(admitted.into_inner(), 50);
    }

    #[test]
    fn purge_idle_drops_expired_keys() {
        let (limiter, clock) = limiter(3, 60);
        limiter.admit("old");
        clock.advance(Duration::from_secs(45));
        limiter.admit("recent");
        assert_eq!(limiter.tracked_keys(), 2);

        clock.advance(Duration::from_secs(20));
        limiter.purge_idle();
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[test]
    fn invalid_policies_are_rejected() {
        assert!(SlidingWindowLimiter::new(RatePolicy::new(0, Duration::from_secs(60))).is_err());
        assert!(SlidingWindowLimiter::new(RatePolicy::new(5, Duration::ZERO)).is_err());
    }

    #[test]
    fn sub_second_window_is_valid() {
        assert!(SlidingWindowLimiter::new(RatePolicy::new(5, Duration::from_millis(500))).is_ok());
    }

    #[test]
    fn fractional_window_is_not_truncated() {
        let clock = Arc::new(ManualClock::new());
        clock.advance(Duration::from_secs(3600));
        let limiter = SlidingWindowLimiter::with_clock(
            RatePolicy::new(1, Duration::from_millis(1900)),
            clock.clone(),
        )
        .unwrap();

        assert!(limiter.admit("k"));
        clock.advance(Duration::from_millis(1500));
        assert!(!limiter.admit("k"));
        clock.advance(Duration::from_millis(401));
        assert!(limiter.admit("k"));
    }

    #[test]
    fn builtin_policies() {
        assert_eq!(RatePolicy::default_policy().limit, 1000);
        assert_eq!(RatePolicy::default_policy().window, Duration::from_secs(60));
        assert_eq!(RatePolicy::strict().limit, 10);
        assert_eq!(RatePolicy::strict().window, Duration::from_secs(60));
    }
}
