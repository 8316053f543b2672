//! Per-user rate limiting for generation endpoints
//!
//! Uses a simple token bucket algorithm with in-memory storage.
//! Tokens are stored per user_id and refill over time.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Rate limiter configuration
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Maximum tokens (burst capacity)
    pub max_tokens: u32,
    /// Tokens added per second
    pub refill_rate: f64,
}

impl RateLimitConfig {
    /// Burst of 10 LLM/render calls, then one every 6 seconds
    pub const GENERATION: RateLimitConfig = RateLimitConfig {
        max_tokens: 10,
        refill_rate: 1.0 / 6.0,
    };
}

struct UserBucket {
    tokens: f64,
    last_update: Instant,
}

/// Per-user rate limiter using token bucket algorithm
pub struct UserRateLimiter {
    config: RateLimitConfig,
    buckets: Mutex<HashMap<i64, UserBucket>>,
}

impl UserRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Check if a request is allowed for the given user_id.
    /// Returns true if allowed, false if rate limited.
    pub async fn check(&self, user_id: i64) -> bool {
        let mut buckets = self.buckets.lock().await;
        let now = Instant::now();

        let bucket = buckets.entry(user_id).or_insert_with(|| UserBucket {
            tokens: self.config.max_tokens as f64,
            last_update: now,
        });

        let elapsed = now.duration_since(bucket.last_update);
        let refill = elapsed.as_secs_f64() * self.config.refill_rate;
        bucket.tokens = (bucket.tokens + refill).min(self.config.max_tokens as f64);
        bucket.last_update = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Drop buckets idle for longer than `max_age`
    pub async fn cleanup(&self, max_age: Duration) {
        let mut buckets = self.buckets.lock().await;
        let now = Instant::now();
        buckets.retain(|_, bucket| now.duration_since(bucket.last_update) < max_age);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn burst_then_limited_per_user() {
        let limiter = UserRateLimiter::new(RateLimitConfig {
            max_tokens: 2,
            refill_rate: 0.0,
        });

        assert!(limiter.check(1).await);
        assert!(limiter.check(1).await);
        assert!(!limiter.check(1).await);

        // Other users have their own bucket
        assert!(limiter.check(2).await);
    }

    #[tokio::test]
    async fn cleanup_drops_idle_buckets() {
        let limiter = UserRateLimiter::new(RateLimitConfig {
            max_tokens: 1,
            refill_rate: 0.0,
        });
        assert!(limiter.check(1).await);
        assert!(!limiter.check(1).await);

        limiter.cleanup(Duration::ZERO).await;
        assert!(limiter.check(1).await);
    }
}
