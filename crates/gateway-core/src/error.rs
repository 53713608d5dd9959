//! Error taxonomy for the gateway.
//!
//! Every error that escapes the pipeline is exactly one of these kinds.
//! Retries and fallbacks are decided from this type alone (see
//! `gateway-pipeline`'s retry policy) -- no call site downstream matches on
//! string messages.

use serde::Serialize;
use std::time::Duration;

/// Convenience alias used throughout the gateway crates.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// The gateway's error taxonomy (§7 of the design).
#[derive(Debug, thiserror::Error, Clone)]
pub enum GatewayError {
    /// Malformed or semantically invalid request. Never retried.
    #[error("invalid request: {message}")]
    Validation {
        /// Human-readable description.
        message: String,
        /// Offending field, if identifiable.
        field: Option<String>,
        /// Stable machine-readable code.
        code: String,
    },

    /// Missing/invalid credentials, insufficient permission, blocked IP.
    /// Never retried.
    #[error("authentication failed: {message}")]
    Authentication {
        /// Human-readable description.
        message: String,
    },

    /// Tenant or API key quota exhausted. Never retried.
    #[error("quota exceeded: {message}")]
    QuotaExceeded {
        /// Human-readable description.
        message: String,
        /// Seconds until the quota window resets.
        retry_after: Option<Duration>,
    },

    /// Admission limiter or upstream 429. Retried with backoff.
    #[error("rate limited")]
    RateLimit {
        /// Suggested wait before retrying.
        retry_after: Option<Duration>,
        /// The limit that was hit, if known.
        limit: Option<u32>,
    },

    /// Unknown model or route.
    #[error("not found: {message}")]
    NotFound {
        /// Human-readable description.
        message: String,
    },

    /// The circuit for this adapter+operation is open.
    #[error("circuit breaker open for '{provider_id}'")]
    CircuitBreakerOpen {
        /// The provider whose circuit is open.
        provider_id: String,
    },

    /// Provider 5xx or connection failure. Retried with backoff, falls back
    /// on exhaustion.
    #[error("provider '{provider_id}' error: {message}")]
    Provider {
        /// The provider that failed.
        provider_id: String,
        /// Human-readable description.
        message: String,
        /// HTTP status code, if the failure came from an HTTP call.
        status_code: Option<u16>,
        /// Whether the provider itself signalled this is safe to retry.
        retryable: bool,
    },

    /// Per-attempt or deadline timeout.
    #[error("operation timed out after {elapsed:?}")]
    Timeout {
        /// How long the operation ran before timing out.
        elapsed: Duration,
    },

    /// Upstream content filter triggered. Never retried, never falls back.
    #[error("content filtered: {message}")]
    Safety {
        /// Human-readable description.
        message: String,
    },

    /// Caller-driven cancellation. Never retried.
    #[error("request cancelled")]
    Cancelled,

    /// Stream-specific transport failure.
    #[error("streaming error: {message}")]
    Streaming {
        /// Human-readable description.
        message: String,
    },

    /// Invalid or ambiguous configuration, detected at startup.
    #[error("configuration error: {message}")]
    Configuration {
        /// Human-readable description.
        message: String,
    },

    /// Unexpected internal error. Detail is never surfaced to callers.
    #[error("internal error")]
    Internal {
        /// Internal detail, logged but not serialized to callers.
        detail: String,
        /// Correlation id for support/log lookup.
        trace_id: String,
    },
}

impl GatewayError {
    /// Build a validation error.
    #[must_use]
    pub fn validation(
        message: impl Into<String>,
        field: Option<String>,
        code: impl Into<String>,
    ) -> Self {
        Self::Validation {
            message: message.into(),
            field,
            code: code.into(),
        }
    }

    /// Build an authentication error.
    #[must_use]
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Build a quota-exceeded error.
    #[must_use]
    pub fn quota_exceeded(message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self::QuotaExceeded {
            message: message.into(),
            retry_after,
        }
    }

    /// Build a rate-limit error.
    #[must_use]
    pub fn rate_limit(retry_after: Option<Duration>, limit: Option<u32>) -> Self {
        Self::RateLimit { retry_after, limit }
    }

    /// Build a not-found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Build a model-not-found error (a common `NotFound` case).
    #[must_use]
    pub fn model_not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Build a circuit-breaker-open error.
    #[must_use]
    pub fn circuit_breaker_open(provider_id: impl Into<String>) -> Self {
        Self::CircuitBreakerOpen {
            provider_id: provider_id.into(),
        }
    }

    /// Build a provider error.
    #[must_use]
    pub fn provider(
        provider_id: impl Into<String>,
        message: impl Into<String>,
        status_code: Option<u16>,
        retryable: bool,
    ) -> Self {
        Self::Provider {
            provider_id: provider_id.into(),
            message: message.into(),
            status_code,
            retryable,
        }
    }

    /// Build a timeout error.
    #[must_use]
    pub fn timeout(elapsed: Duration) -> Self {
        Self::Timeout { elapsed }
    }

    /// Build a safety/content-filter error.
    #[must_use]
    pub fn safety(message: impl Into<String>) -> Self {
        Self::Safety {
            message: message.into(),
        }
    }

    /// Build a streaming error.
    #[must_use]
    pub fn streaming(message: impl Into<String>) -> Self {
        Self::Streaming {
            message: message.into(),
        }
    }

    /// Build a configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Build an internal error, stamping a fresh trace id for log lookup.
    #[must_use]
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::Internal {
            detail: detail.into(),
            trace_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Intrinsic retry eligibility, independent of any policy's status-code
    /// allowlist. Policies may still decide not to retry based on attempt
    /// budget; this only rules classes in or out per the taxonomy in §7.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimit { .. } | Self::Timeout { .. } | Self::Streaming { .. }
        ) || matches!(self, Self::Provider { retryable, .. } if *retryable)
    }

    /// Whether the pipeline may advance to the next fallback candidate after
    /// retries on the current one are exhausted.
    #[must_use]
    pub fn allows_fallback(&self) -> bool {
        matches!(
            self,
            Self::Provider { .. }
                | Self::Timeout { .. }
                | Self::CircuitBreakerOpen { .. }
                | Self::RateLimit { .. }
        )
    }

    /// Stable machine-readable error code for the JSON error envelope.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "invalid_request",
            Self::Authentication { .. } => "auth",
            Self::QuotaExceeded { .. } => "quota_exceeded",
            Self::RateLimit { .. } => "rate_limited",
            Self::NotFound { .. } => "not_found",
            Self::CircuitBreakerOpen { .. } => "circuit_open",
            Self::Provider { .. } => "upstream",
            Self::Timeout { .. } => "timeout",
            Self::Safety { .. } => "safety",
            Self::Cancelled => "cancelled",
            Self::Streaming { .. } => "streaming",
            Self::Configuration { .. } => "configuration",
            Self::Internal { .. } => "internal",
        }
    }

    /// Suggested wait before the caller retries, if any.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::QuotaExceeded { retry_after, .. } | Self::RateLimit { retry_after, .. } => {
                *retry_after
            }
            _ => None,
        }
    }
}

/// The JSON error envelope every user-visible failure is serialized as.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    /// Nested error body.
    pub error: ErrorBody,
}

/// Body of the JSON error envelope.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    /// Stable machine-readable code.
    pub code: String,
    /// Short human message. Internal detail is never included.
    pub message: String,
    /// Optional structured extra detail (never internal stack traces).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// Seconds to wait before retrying, for admission-related classes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    /// Correlation id for the originating request.
    pub request_id: String,
}

impl GatewayError {
    /// Render the stable, user-visible error envelope for this error.
    #[must_use]
    pub fn to_envelope(&self, request_id: &str) -> ErrorEnvelope {
        let message = match self {
            Self::Internal { .. } => "an internal error occurred".to_string(),
            other => other.to_string(),
        };

        ErrorEnvelope {
            error: ErrorBody {
                code: self.code().to_string(),
                message,
                details: None,
                retry_after: self.retry_after().map(|d| d.as_secs()),
                request_id: request_id.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(GatewayError::rate_limit(None, None).is_retryable());
        assert!(GatewayError::timeout(Duration::from_secs(1)).is_retryable());
        assert!(GatewayError::provider("p", "boom", Some(503), true).is_retryable());
        assert!(!GatewayError::provider("p", "boom", Some(400), false).is_retryable());
        assert!(!GatewayError::authentication("nope").is_retryable());
        assert!(!GatewayError::validation("bad", None, "x").is_retryable());
    }

    #[test]
    fn test_fallback_classification() {
        assert!(GatewayError::provider("p", "boom", Some(503), true).allows_fallback());
        assert!(GatewayError::circuit_breaker_open("p").allows_fallback());
        assert!(!GatewayError::authentication("nope").allows_fallback());
        assert!(!GatewayError::safety("filtered").allows_fallback());
    }

    #[test]
    fn test_internal_detail_not_leaked() {
        let err = GatewayError::internal("database password is hunter2");
        let envelope = err.to_envelope("req-1");
        assert_eq!(envelope.error.code, "internal");
        assert!(!envelope.error.message.contains("hunter2"));
    }

    #[test]
    fn test_quota_exceeded_retry_after() {
        let err = GatewayError::quota_exceeded("too many requests", Some(Duration::from_secs(42)));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(42)));
        let envelope = err.to_envelope("req-2");
        assert_eq!(envelope.error.retry_after, Some(42));
    }
}
