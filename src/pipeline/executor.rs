//! Rate-limited retry executor
//!
//! Every external call goes through the same three gates, in order:
//! 1. A concurrency permit, if a cap is configured
//! 2. A token from the shared rate limiter
//! 3. The retry policy wrapped around the call itself

use crate::config::Config;
use crate::pipeline::{RateLimiter, RetryPolicy};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Shared gate wrapped around each unit of external work
#[derive(Debug, Clone)]
pub struct RateLimitedExecutor {
    limiter: Arc<RateLimiter>,
    gate: Option<Arc<Semaphore>>,
    retry: RetryPolicy,
}

impl RateLimitedExecutor {
    pub fn new(
        limiter: Arc<RateLimiter>,
        max_concurrent: Option<usize>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            limiter,
            gate: max_concurrent.map(|n| Arc::new(Semaphore::new(n.max(1)))),
            retry,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Arc::new(RateLimiter::from_config(&config.rate_limit)),
            config.rate_limit.max_concurrent,
            RetryPolicy::from_config(&config.retry),
        )
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Runs `op` behind the concurrency cap and the rate limiter, retrying on failure
    ///
    /// The permit is held across retries so that a backing-off call still counts as in
    /// flight. The rate limiter is consulted once per unit of work.
    pub async fn execute<T, E, F, Fut>(&self, label: &str, op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        // The semaphore is never closed, so acquiring only fails if that changes
        let _permit = match &self.gate {
            Some(gate) => gate.clone().acquire_owned().await.ok(),
            None => None,
        };

        self.limiter.acquire().await;

        self.retry.run(label, op).await
    }
}
