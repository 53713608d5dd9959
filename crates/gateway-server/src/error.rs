//! The HTTP-facing error envelope (§6, §7).
//!
//! [`ApiError`] is the single type every handler's `Result` fails with. It
//! maps the gateway error taxonomy (and the handful of server-local
//! failures -- bad JSON, missing auth header -- that never reach
//! `gateway-pipeline`) onto an HTTP status code and the
//! `{"error": {"code", "message", "details", "retryAfter", "requestId"}}`
//! envelope every user-visible failure serializes as.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use gateway_core::error::{ErrorBody, ErrorEnvelope, GatewayError};

use crate::auth::AuthError;

/// An HTTP-facing error: a status code plus the fields of the JSON error
/// envelope.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    /// HTTP status this error renders as.
    pub status: StatusCode,
    /// Stable machine-readable code.
    pub code: String,
    /// Short human message.
    pub message: String,
    /// Optional structured detail.
    pub details: Option<serde_json::Value>,
    /// Seconds to wait before retrying, for admission-related classes.
    pub retry_after: Option<u64>,
    /// Correlation id of the request that failed, filled in by middleware
    /// once the request id is known.
    pub request_id: Option<String>,
}

impl ApiError {
    /// Build an error with an explicit status, code, and message.
    #[must_use]
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            details: None,
            retry_after: None,
            request_id: None,
        }
    }

    /// 400, for malformed request bodies and invalid query parameters.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", message)
    }

    /// 401, for missing or rejected credentials.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "auth", message)
    }

    /// 403, for an authenticated caller lacking the required permission.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "forbidden", message)
    }

    /// 404, for unknown models, routes, or resources.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    /// 500, for unexpected internal failures. Never includes `detail`.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
    }

    /// Attach the originating request's id, rendered into the envelope.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Attach structured detail (never raw internal state for a 500).
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status;
        let retry_after = self.retry_after;
        let envelope = ErrorEnvelope {
            error: ErrorBody {
                code: self.code,
                message: self.message,
                details: self.details,
                retry_after,
                request_id: self.request_id.unwrap_or_default(),
            },
        };
        let mut response = (status, Json(envelope)).into_response();
        if let Some(secs) = retry_after {
            if let Ok(value) = secs.to_string().parse() {
                response.headers_mut().insert(axum::http::header::RETRY_AFTER, value);
            }
        }
        response
    }
}

/// Map every variant of the gateway error taxonomy onto its HTTP status
/// (§7's status-code table), preserving the code/message/retry-after the
/// envelope already carries.
impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        let status = match &err {
            GatewayError::Validation { .. } => StatusCode::BAD_REQUEST,
            GatewayError::Authentication { .. } => StatusCode::UNAUTHORIZED,
            GatewayError::QuotaExceeded { .. } | GatewayError::RateLimit { .. } => {
                StatusCode::TOO_MANY_REQUESTS
            }
            GatewayError::NotFound { .. } => StatusCode::NOT_FOUND,
            GatewayError::CircuitBreakerOpen { .. } => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Provider { status_code, .. } => status_code
                .and_then(|code| StatusCode::from_u16(code).ok())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            GatewayError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Safety { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            // 499, nginx's non-standard "client closed request" -- there is
            // no standard status for caller-driven cancellation.
            GatewayError::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST),
            GatewayError::Streaming { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::Configuration { .. } | GatewayError::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let envelope = err.to_envelope("");
        Self {
            status,
            code: envelope.error.code,
            message: envelope.error.message,
            details: envelope.error.details,
            retry_after: envelope.error.retry_after,
            request_id: None,
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self::new(err.status_code(), err.error_code(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_rate_limit_maps_to_429() {
        let err = GatewayError::rate_limit(Some(Duration::from_secs(5)), None);
        let api_err: ApiError = err.into();
        assert_eq!(api_err.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(api_err.retry_after, Some(5));
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let err = GatewayError::not_found("no such model");
        let api_err: ApiError = err.into();
        assert_eq!(api_err.status, StatusCode::NOT_FOUND);
        assert_eq!(api_err.code, "not_found");
    }

    #[test]
    fn test_internal_detail_not_exposed() {
        let err = GatewayError::internal("database password is hunter2");
        let api_err: ApiError = err.into();
        assert_eq!(api_err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!api_err.message.contains("hunter2"));
    }
}
