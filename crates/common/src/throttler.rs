use std::collections::VecDeque;

use chrono::Duration;
use tessera_core::Timestamp;

/// Sliding-window rate limiter
///
/// Admits at most `limit` events within any window of length `interval`.
/// Time is supplied by the caller so the throttler behaves identically under
/// test and live clocks.
#[derive(Debug, Clone)]
pub struct Throttler {
    name: String,
    limit: usize,
    interval: Duration,
    admitted: VecDeque<Timestamp>,
}

impl Throttler {
    pub fn new(name: impl Into<String>, limit: usize, interval: Duration) -> Self {
        Self {
            name: name.into(),
            limit,
            interval,
            admitted: VecDeque::with_capacity(limit),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn evict(&mut self, now: Timestamp) {
        while let Some(oldest) = self.admitted.front() {
            if now - *oldest >= self.interval {
                self.admitted.pop_front();
            } else {
                break;
            }
        }
    }

    /// Admit one event at `now` if capacity remains in the window
    pub fn try_acquire(&mut self, now: Timestamp) -> bool {
        self.evict(now);
        if self.admitted.len() >= self.limit {
            log::debug!(
                "Throttled: name={}, limit={}, interval={}",
                self.name,
                self.limit,
                self.interval
            );
            return false;
        }
        self.admitted.push_back(now);
        true
    }

    /// Events admitted within the window ending at `now`
    pub fn used(&mut self, now: Timestamp) -> usize {
        self.evict(now);
        self.admitted.len()
    }

    pub fn reset(&mut self) {
        self.admitted.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::stubs::ts;

    #[test]
    fn test_limits_within_window() {
        let mut throttler = Throttler::new("submit", 2, Duration::seconds(1));
        assert!(throttler.try_acquire(ts(0)));
        assert!(throttler.try_acquire(ts(0)));
        assert!(!throttler.try_acquire(ts(0)));
        assert_eq!(throttler.used(ts(0)), 2);
    }

    #[test]
    fn test_window_slides() {
        let mut throttler = Throttler::new("submit", 1, Duration::seconds(1));
        assert!(throttler.try_acquire(ts(0)));
        assert!(!throttler.try_acquire(ts(0) + Duration::milliseconds(999)));
        assert!(throttler.try_acquire(ts(1)));
        assert_eq!(throttler.used(ts(3)), 0);
    }

    #[test]
    fn test_reset_clears_window() {
        let mut throttler = Throttler::new("modify", 1, Duration::seconds(10));
        assert!(throttler.try_acquire(ts(0)));
        throttler.reset();
        assert!(throttler.try_acquire(ts(1)));
    }
}
