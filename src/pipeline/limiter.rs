//! Global rate limiting for external calls
//!
//! `RateLimiter` is a token bucket shared by every worker: it holds up to `max_requests`
//! tokens and refills them continuously over `period`, so no more than `max_requests`
//! calls start in any window of that length after the initial burst.

use crate::config::RateLimitConfig;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token-bucket limiter allowing at most K operations per T
#[derive(Debug)]
pub struct RateLimiter {
    capacity: f64,
    /// Tokens restored per second
    refill_rate: f64,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// Creates a limiter that starts full
    ///
    /// # Arguments
    ///
    /// * `max_requests` - Operations allowed per period (clamped to at least one)
    /// * `period` - Length of the window (clamped to at least one millisecond)
    pub fn new(max_requests: u32, period: Duration) -> Self {
        let capacity = f64::from(max_requests.max(1));
        let period = period.max(Duration::from_millis(1));

        Self {
            capacity,
            refill_rate: capacity / period.as_secs_f64(),
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, config.period())
    }

    /// Waits until a token is available and takes it
    ///
    /// The bucket lock is released while sleeping, so waiting workers never block each
    /// other's bookkeeping.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock().await;
                self.refill(&mut bucket);

                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return;
                }

                Duration::from_secs_f64((1.0 - bucket.tokens) / self.refill_rate)
            };

            tracing::trace!("Rate limit reached, waiting {:?}", wait);
            tokio::time::sleep(wait).await;
        }
    }

    /// Tokens currently available (after refilling)
    pub async fn available(&self) -> f64 {
        let mut bucket = self.bucket.lock().await;
        self.refill(&mut bucket);
        bucket.tokens
    }

    fn refill(&self, bucket: &mut Bucket) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(bucket.last_refill);
        bucket.tokens =
            (bucket.tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.capacity);
        bucket.last_refill = now;
    }
}
