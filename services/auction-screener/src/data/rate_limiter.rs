//! Token bucket rate limiter for vendor request throttling.
//!
//! Tushare enforces per-minute quotas per endpoint; exceeding them returns an
//! error row instead of data. The bucket keeps the adapter under its budget
//! no matter how many screening workers share it.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// A token bucket rate limiter.
///
/// Holds at most one second worth of requests; tokens refill continuously
/// at `requests_per_minute / 60` per second.
#[derive(Debug)]
pub struct RateLimiter {
    name: String,
    capacity: f64,
    per_second: f64,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// Create a new rate limiter allowing `requests_per_minute`.
    ///
    /// A zero budget is clamped to one request per minute.
    pub fn new(name: impl Into<String>, requests_per_minute: u32) -> Self {
        let per_minute = requests_per_minute.max(1) as f64;
        let per_second = per_minute / 60.0;
        let capacity = per_second.ceil().max(1.0);

        Self {
            name: name.into(),
            capacity,
            per_second,
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    fn refill(&self, bucket: &mut Bucket, now: Instant) {
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.per_second).min(self.capacity);
        bucket.last_refill = now;
    }

    /// Acquire a token, waiting if necessary.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock().await;
                self.refill(&mut bucket, Instant::now());

                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return;
                }

                Duration::from_secs_f64((1.0 - bucket.tokens) / self.per_second)
            };

            debug!(
                limiter = %self.name,
                wait_ms = wait.as_millis() as u64,
                "Rate limited, waiting for token"
            );

            tokio::time::sleep(wait.max(Duration::from_millis(5))).await;
        }
    }
}

/// Shared rate limiter that can be cloned.
pub type SharedRateLimiter = Arc<RateLimiter>;

/// Create a shared rate limiter.
pub fn shared_limiter(name: impl Into<String>, requests_per_minute: u32) -> SharedRateLimiter {
    Arc::new(RateLimiter::new(name, requests_per_minute))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHORT: Duration = Duration::from_millis(100);

    #[tokio::test]
    async fn test_burst_up_to_capacity() {
        // 300/min refills 5/sec, so five calls go through at once.
        let limiter = RateLimiter::new("test", 300);
        for _ in 0..5 {
            assert!(tokio::time::timeout(SHORT, limiter.acquire()).await.is_ok());
        }
        assert!(tokio::time::timeout(SHORT, limiter.acquire()).await.is_err());
    }

    #[tokio::test]
    async fn test_acquire_blocks_when_exhausted() {
        let limiter = RateLimiter::new("test", 60);
        assert!(tokio::time::timeout(SHORT, limiter.acquire()).await.is_ok());
        assert!(tokio::time::timeout(SHORT, limiter.acquire()).await.is_err());
    }

    #[tokio::test]
    async fn test_zero_budget_is_clamped() {
        let limiter = RateLimiter::new("test", 0);
        assert!(tokio::time::timeout(SHORT, limiter.acquire()).await.is_ok());
        assert!(tokio::time::timeout(SHORT, limiter.acquire()).await.is_err());
    }

    #[tokio::test]
    async fn test_acquire_waits_for_refill() {
        let limiter = shared_limiter("test", 6000); // 100 req/sec

        for _ in 0..100 {
            limiter.acquire().await;
        }

        let started = Instant::now();
        limiter.acquire().await;
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
