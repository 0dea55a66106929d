//! Per-client token bucket rate limiting.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A simple token bucket rate limiter.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        // Refill tokens
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[derive(Debug)]
struct Buckets {
    by_client: HashMap<String, TokenBucket>,
    last_sweep: Instant,
}

/// Buckets keyed by client address.
///
/// A bucket idle for longer than a full refill is indistinguishable from a
/// fresh one, so such buckets are dropped periodically.
#[derive(Debug)]
pub struct RateLimiter {
    buckets: Mutex<Buckets>,
    rps: f64,
    burst: f64,
    idle_limit: Duration,
}

impl RateLimiter {
    pub fn new(requests_per_second: u32, burst_size: u32) -> Self {
        let rps = requests_per_second as f64;
        let burst = burst_size.max(1) as f64;
        Self {
            buckets: Mutex::new(Buckets {
                by_client: HashMap::new(),
                last_sweep: Instant::now(),
            }),
            rps,
            burst,
            idle_limit: Duration::try_from_secs_f64(burst / rps).unwrap_or(Duration::MAX),
        }
    }

    /// Take one token from the client's bucket.
    pub fn check(&self, key: &str) -> bool {
        let mut buckets = self.buckets.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if buckets.last_sweep.elapsed() >= self.idle_limit {
            let idle_limit = self.idle_limit;
            buckets
                .by_client
                .retain(|_, bucket| bucket.last_update.elapsed() < idle_limit);
            buckets.last_sweep = Instant::now();
        }

        let bucket = buckets
            .by_client
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(self.burst));

        bucket.try_acquire(self.burst, self.rps)
    }

    /// Number of clients currently holding a bucket.
    pub fn tracked_clients(&self) -> usize {
        self.buckets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .by_client
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_then_reject() {
        let limiter = RateLimiter::new(1, 3);
        assert!(limiter.check("a"));
        assert!(limiter.check("a"));
        assert!(limiter.check("a"));
        assert!(!limiter.check("a"));
        assert!(limiter.check("b"));
    }

    #[test]
    fn test_refill() {
        let limiter = RateLimiter::new(1000, 1);
        assert!(limiter.check("a"));
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert!(limiter.check("a"));
    }

    #[test]
    fn test_idle_buckets_are_evicted() {
        // A full refill takes 1ms.
        let limiter = RateLimiter::new(1000, 1);
        assert!(limiter.check("a"));
        assert_eq!(limiter.tracked_clients(), 1);
        std::thread::sleep(Duration::from_millis(5));
        assert!(limiter.check("b"));
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn test_busy_buckets_are_kept() {
        let limiter = RateLimiter::new(1, 2);
        assert!(limiter.check("a"));
        assert!(limiter.check("b"));
        assert_eq!(limiter.tracked_clients(), 2);
    }
}
