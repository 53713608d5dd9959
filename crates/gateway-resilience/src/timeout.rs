//! Per-attempt and whole-request deadline enforcement.
//!
//! Distinguishes the two timeout classes the pipeline cares about: a single
//! adapter call exceeding its attempt budget (still retryable) versus the
//! request's overall deadline elapsing (never retryable, always terminal).

use gateway_core::GatewayError;
use std::future::Future;
use std::time::{Duration, Instant};

/// Timeout configuration for one operation class.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutConfig {
    /// Budget for a single attempt (one adapter call).
    pub per_attempt: Duration,
    /// Budget for the request as a whole, across all attempts/fallbacks.
    pub deadline: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            per_attempt: Duration::from_secs(30),
            deadline: Duration::from_secs(120),
        }
    }
}

/// Tracks elapsed time against a request's overall deadline, independent of
/// any individual attempt's timeout.
pub struct TimeoutManager {
    config: TimeoutConfig,
    started_at: Instant,
}

impl TimeoutManager {
    /// Start a deadline clock for one request.
    #[must_use]
    pub fn new(config: TimeoutConfig) -> Self {
        Self {
            config,
            started_at: Instant::now(),
        }
    }

    /// Time remaining before the request's overall deadline, or `None` if
    /// it has already elapsed.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.config.deadline.checked_sub(self.started_at.elapsed())
    }

    /// Whether the overall deadline has elapsed.
    #[must_use]
    pub fn deadline_exceeded(&self) -> bool {
        self.remaining().is_none()
    }

    /// Run `future` bounded by the smaller of the per-attempt budget and
    /// whatever remains of the overall deadline.
    ///
    /// # Errors
    /// Returns `GatewayError::Timeout` if the future does not complete in
    /// time; the error carries the elapsed duration so callers can
    /// distinguish an attempt timeout from a deadline timeout by comparing
    /// it against [`TimeoutManager::remaining`].
    pub async fn run<F, T>(&self, future: F) -> Result<T, GatewayError>
    where
        F: Future<Output = T>,
    {
        let Some(remaining) = self.remaining() else {
            return Err(GatewayError::timeout(self.started_at.elapsed()));
        };
        let budget = self.config.per_attempt.min(remaining);

        match tokio::time::timeout(budget, future).await {
            Ok(value) => Ok(value),
            Err(_) => Err(GatewayError::timeout(budget)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_completes_within_budget() {
        let manager = TimeoutManager::new(TimeoutConfig {
            per_attempt: Duration::from_millis(50),
            deadline: Duration::from_secs(1),
        });
        let result = manager
            .run(async {
                tokio::time::sleep(Duration::from_millis(1)).await;
                42
            })
            .await;
        assert_eq!(result.expect("completes"), 42);
    }

    #[tokio::test]
    async fn test_run_times_out_on_slow_future() {
        let manager = TimeoutManager::new(TimeoutConfig {
            per_attempt: Duration::from_millis(5),
            deadline: Duration::from_secs(1),
        });
        let result = manager
            .run(async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                42
            })
            .await;
        assert!(matches!(result, Err(GatewayError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_deadline_exceeded_short_circuits() {
        let manager = TimeoutManager::new(TimeoutConfig {
            per_attempt: Duration::from_secs(5),
            deadline: Duration::from_millis(1),
        });
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(manager.deadline_exceeded());
        let result = manager.run(async { 1 }).await;
        assert!(matches!(result, Err(GatewayError::Timeout { .. })));
    }
}
