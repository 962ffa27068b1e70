//! Bucketed sliding-window admission counter for outbound API calls.
//!
//! The window is evaluated on a whole-second clock. Each second that saw at
//! least one call owns one bucket; buckets that fall out of the trailing
//! window are evicted and their hits subtracted from the running total.
//! The limiter never blocks: it only reports whether the caller should back off.

use std::collections::VecDeque;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Source of coarse wall-clock time and blocking sleeps.
pub trait Clock {
    /// Current time in whole seconds.
    fn now_secs(&self) -> i64;
    fn sleep(&self, duration: Duration);
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_secs(&self) -> i64 {
        (**self).now_secs()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

/// Process wall clock backed by `SystemTime` and `std::thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|duration| duration.as_secs() as i64)
            .unwrap_or(0)
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RateBucket {
    timestamp: i64,
    hits: u32,
}

/// Single-writer sliding window. Not safe for concurrent callers; `bump`
/// takes `&mut self` so sharing requires an explicit owner.
pub struct RateLimiter<C: Clock = SystemClock> {
    // Most recent bucket at the front.
    buckets: VecDeque<RateBucket>,
    total: u32,
    max_requests: u32,
    window_secs: i64,
    clock: C,
}

impl<C: Clock> RateLimiter<C> {
    pub fn new(max_requests: u32, window: Duration, clock: C) -> Self {
        Self {
            buckets: VecDeque::new(),
            total: 0,
            max_requests,
            window_secs: window.as_secs().max(1) as i64,
            clock,
        }
    }

    /// Records one request attempt and returns `true` when the caller should throttle.
    pub fn bump(&mut self) -> bool {
        let now = self.clock.now_secs();
        self.total = self.total.saturating_add(1);

        // A clock that stepped backwards still lands in the newest bucket.
        match self.buckets.front_mut() {
            Some(bucket) if now <= bucket.timestamp => bucket.hits += 1,
            _ => self.buckets.push_front(RateBucket {
                timestamp: now,
                hits: 1,
            }),
        }

        self.evict_expired(now);
        self.total >= self.max_requests
    }

    /// Number of hits still inside the trailing window as of the last update.
    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs as u64)
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    // A bucket stamped `now - W` is already outside the window, so sleeping a
    // full window after a throttle always drains the counter.
    fn evict_expired(&mut self, now: i64) {
        let cutoff = now - self.window_secs;
        while let Some(oldest) = self.buckets.back() {
            if oldest.timestamp > cutoff {
                break;
            }
            self.total = self.total.saturating_sub(oldest.hits);
            self.buckets.pop_back();
        }
    }
}

/// Manually driven clock; sleeping advances time instead of blocking.
#[cfg(test)]
pub(crate) struct ManualClock {
    now: std::cell::Cell<i64>,
    sleeps: std::cell::RefCell<Vec<Duration>>,
}

#[cfg(test)]
impl ManualClock {
    pub(crate) fn starting_at(now: i64) -> Self {
        Self {
            now: std::cell::Cell::new(now),
            sleeps: std::cell::RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn advance(&self, secs: i64) {
        self.now.set(self.now.get() + secs);
    }

    pub(crate) fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now_secs(&self) -> i64 {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
        self.advance(duration.as_secs() as i64);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{ManualClock, RateLimiter};

    #[test]
    fn test_first_bump_on_empty_window_is_admitted() {
        let clock = ManualClock::starting_at(1_000);
        let mut limiter = RateLimiter::new(3, Duration::from_secs(10), &clock);
        assert!(!limiter.bump());
        assert_eq!(limiter.total(), 1);
    }

    #[test]
    fn test_throttles_once_request_budget_is_spent_within_window() {
        let clock = ManualClock::starting_at(1_000);
        let mut limiter = RateLimiter::new(4, Duration::from_secs(10), &clock);
        for _ in 0..3 {
            assert!(!limiter.bump());
            clock.advance(1);
        }
        assert!(limiter.bump());
        clock.advance(1);
        assert!(limiter.bump());
    }

    #[test]
    fn test_waiting_a_full_window_resets_pressure() {
        let clock = ManualClock::starting_at(1_000);
        let mut limiter = RateLimiter::new(3, Duration::from_secs(10), &clock);
        for _ in 0..4 {
            limiter.bump();
        }
        assert!(limiter.bump());

        clock.advance(10);
        assert!(!limiter.bump());
        assert_eq!(limiter.total(), 1);
    }

    #[test]
    fn test_same_second_hits_share_one_bucket() {
        let clock = ManualClock::starting_at(500);
        let mut limiter = RateLimiter::new(100, Duration::from_secs(10), &clock);
        for _ in 0..5 {
            limiter.bump();
        }
        assert_eq!(limiter.buckets.len(), 1);
        assert_eq!(limiter.buckets[0].hits, 5);
    }

    #[test]
    fn test_total_matches_calls_in_trailing_window() {
        let clock = ManualClock::starting_at(0);
        let mut limiter = RateLimiter::new(1_000, Duration::from_secs(5), &clock);
        let mut call_times = Vec::new();
        for step in [0, 0, 1, 3, 3, 3, 6, 8, 9, 9, 14] {
            clock.advance(step - clock.now.get());
            limiter.bump();
            call_times.push(step);
            let now = clock.now.get();
            let expected = call_times.iter().filter(|time| **time > now - 5).count();
            assert_eq!(limiter.total() as usize, expected, "at t={now}");
        }
    }

    #[test]
    fn test_buckets_stay_ordered_most_recent_first() {
        let clock = ManualClock::starting_at(0);
        let mut limiter = RateLimiter::new(1_000, Duration::from_secs(30), &clock);
        for _ in 0..6 {
            limiter.bump();
            clock.advance(2);
        }
        let stamps: Vec<i64> = limiter.buckets.iter().map(|bucket| bucket.timestamp).collect();
        assert_eq!(stamps, vec![10, 8, 6, 4, 2, 0]);
        let sum: u32 = limiter.buckets.iter().map(|bucket| bucket.hits).sum();
        assert_eq!(sum, limiter.total());
    }

    #[test]
    fn test_clock_stepping_back_joins_newest_bucket() {
        let clock = ManualClock::starting_at(100);
        let mut limiter = RateLimiter::new(1_000, Duration::from_secs(10), &clock);
        limiter.bump();
        clock.advance(3);
        limiter.bump();
        clock.advance(-2);
        limiter.bump();

        let stamps: Vec<i64> = limiter.buckets.iter().map(|bucket| bucket.timestamp).collect();
        assert_eq!(stamps, vec![103, 100]);
        assert_eq!(limiter.buckets[0].hits, 2);
        assert_eq!(limiter.total(), 3);
    }
}
