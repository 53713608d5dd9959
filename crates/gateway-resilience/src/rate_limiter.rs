//! Token-bucket admission control, scoped per `(scope, key)` pair (e.g.
//! `("tenant", "acme-corp")`, `("api_key", "sk-abc...")`, `("global", "*")`).
//!
//! Each bucket refills continuously at a configured rate and holds up to a
//! burst capacity; `try_admit` is a non-blocking check, `wait` blocks the
//! caller (cooperatively, cancellable) until a token is available.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::sleep;

/// Configuration for one scope's admission limit.
#[derive(Debug, Clone, Copy)]
pub struct RateLimiterConfig {
    /// Sustained requests per second.
    pub rps: u32,
    /// Burst capacity above the sustained rate.
    pub burst: u32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self { rps: 100, burst: 100 }
    }
}

struct Bucket {
    config: RateLimiterConfig,
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn new(config: RateLimiterConfig) -> Self {
        Self {
            tokens: f64::from(config.burst),
            last_refill: Instant::now(),
            config,
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.last_refill = now;
        let refill = elapsed * f64::from(self.config.rps);
        self.tokens = (self.tokens + refill).min(f64::from(self.config.burst));
    }

    fn try_take(&mut self, cost: f64) -> bool {
        self.refill();
        if self.tokens >= cost {
            self.tokens -= cost;
            true
        } else {
            false
        }
    }

    fn time_until_available(&mut self, cost: f64) -> Duration {
        self.refill();
        if self.tokens >= cost {
            return Duration::ZERO;
        }
        let deficit = cost - self.tokens;
        let seconds = deficit / f64::from(self.config.rps.max(1));
        Duration::from_secs_f64(seconds)
    }
}

/// Error returned when a caller is cancelled while waiting for admission.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("wait for rate limit admission was cancelled")]
pub struct WaitCancelled;

/// A multi-scope token-bucket rate limiter.
///
/// One bucket is lazily created per `(scope, key)` on first use, configured
/// from `default_config` unless [`RateLimiter::configure`] set an override
/// for that scope.
pub struct RateLimiter {
    buckets: DashMap<(String, String), Bucket>,
    scope_defaults: DashMap<String, RateLimiterConfig>,
    default_config: RateLimiterConfig,
}

impl RateLimiter {
    /// Build a limiter using `default_config` for any scope without an
    /// explicit override.
    #[must_use]
    pub fn new(default_config: RateLimiterConfig) -> Self {
        Self {
            buckets: DashMap::new(),
            scope_defaults: DashMap::new(),
            default_config,
        }
    }

    /// Set the bucket configuration for a scope (e.g. `"tenant"`), applied
    /// to every key within it that doesn't already have a bucket.
    pub fn configure(&self, scope: impl Into<String>, config: RateLimiterConfig) {
        self.scope_defaults.insert(scope.into(), config);
    }

    fn config_for(&self, scope: &str) -> RateLimiterConfig {
        self.scope_defaults
            .get(scope)
            .map_or(self.default_config, |c| *c)
    }

    /// Attempt to admit one request of `cost` tokens (normally `1.0`)
    /// immediately, without blocking.
    #[must_use]
    pub fn try_admit(&self, scope: &str, key: &str, cost: f64) -> bool {
        let config = self.config_for(scope);
        let mut bucket = self
            .buckets
            .entry((scope.to_string(), key.to_string()))
            .or_insert_with(|| Bucket::new(config));
        bucket.try_take(cost)
    }

    /// Block until admission is granted or `cancelled` is signalled.
    ///
    /// # Errors
    /// Returns [`WaitCancelled`] if `cancelled` observes `true` before a
    /// token becomes available.
    pub async fn wait(
        &self,
        scope: &str,
        key: &str,
        cost: f64,
        cancelled: &watch::Receiver<bool>,
    ) -> Result<(), WaitCancelled> {
        loop {
            if *cancelled.borrow() {
                return Err(WaitCancelled);
            }
            if self.try_admit(scope, key, cost) {
                return Ok(());
            }
            let config = self.config_for(scope);
            let delay = {
                let mut bucket = self
                    .buckets
                    .entry((scope.to_string(), key.to_string()))
                    .or_insert_with(|| Bucket::new(config));
                bucket.time_until_available(cost)
            }
            .max(Duration::from_millis(1));
            sleep(delay).await;
        }
    }

    /// Number of distinct `(scope, key)` buckets currently tracked.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

/// Shared handle convenience alias, matching how the rest of the resilience
/// crate's components are wired into the pipeline.
pub type SharedRateLimiter = Arc<RateLimiter>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_admit_respects_burst() {
        let limiter = RateLimiter::new(RateLimiterConfig { rps: 1, burst: 2 });
        assert!(limiter.try_admit("tenant", "acme", 1.0));
        assert!(limiter.try_admit("tenant", "acme", 1.0));
        assert!(!limiter.try_admit("tenant", "acme", 1.0));
    }

    #[test]
    fn test_scopes_are_independent() {
        let limiter = RateLimiter::new(RateLimiterConfig { rps: 1, burst: 1 });
        assert!(limiter.try_admit("tenant", "acme", 1.0));
        assert!(limiter.try_admit("tenant", "other", 1.0));
        assert!(!limiter.try_admit("tenant", "acme", 1.0));
    }

    #[test]
    fn test_per_scope_override() {
        let limiter = RateLimiter::new(RateLimiterConfig { rps: 1, burst: 1 });
        limiter.configure("global", RateLimiterConfig { rps: 1, burst: 5 });
        for _ in 0..5 {
            assert!(limiter.try_admit("global", "*", 1.0));
        }
        assert!(!limiter.try_admit("global", "*", 1.0));
    }

    #[tokio::test]
    async fn test_wait_respects_cancellation() {
        let limiter = RateLimiter::new(RateLimiterConfig { rps: 1, burst: 1 });
        assert!(limiter.try_admit("tenant", "acme", 1.0));

        let (tx, rx) = watch::channel(false);
        tx.send(true).expect("send cancel");

        let result = limiter.wait("tenant", "acme", 1.0, &rx).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_wait_eventually_admits() {
        let limiter = RateLimiter::new(RateLimiterConfig { rps: 1000, burst: 1 });
        assert!(limiter.try_admit("tenant", "acme", 1.0));

        let (_tx, rx) = watch::channel(false);
        let result = limiter.wait("tenant", "acme", 1.0, &rx).await;
        assert!(result.is_ok());
    }
}
