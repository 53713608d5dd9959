//! # Gateway Resilience
//!
//! Resilience patterns for the LLM Inference Gateway:
//! - Circuit breaker for preventing cascading failures
//! - Retry policy with exponential backoff
//! - Bulkhead pattern for resource isolation
//! - Timeout management

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bulkhead;
pub mod circuit_breaker;
pub mod distributed_cache;
pub mod rate_limiter;
pub mod retry;
pub mod single_flight;
pub mod timeout;

// Re-export main types
pub use bulkhead::{Bulkhead, BulkheadConfig, BulkheadPermit};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitEvent, CircuitState};
pub use distributed_cache::{
    CacheBackend, CachedEntry, DistributedCache, DistributedCacheConfig, DistributedCacheKey,
};
pub use rate_limiter::{RateLimiter, RateLimiterConfig, SharedRateLimiter, WaitCancelled};
pub use retry::{RetryConfig, RetryPolicy, RetryResult};
pub use single_flight::{JoinOutcome, Role, SingleFlightError, SingleFlightGroup, Waiting};
pub use timeout::{TimeoutConfig, TimeoutManager};
