//! Security error types.

/// Result type for security operations.
pub type Result<T> = std::result::Result<T, SecurityError>;

/// Security error type.
#[derive(Debug, thiserror::Error)]
pub enum SecurityError {
    /// Validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Secret not found.
    #[error("Secret not found: {0}")]
    SecretNotFound(String),

    /// Secret expired.
    #[error("Secret expired: {0}")]
    SecretExpired(String),

    /// Internal error.
    #[error("Internal security error: {0}")]
    Internal(String),
}

impl SecurityError {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Check if error is a client error (4xx).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Get HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::SecretNotFound(_) => 404,
            Self::SecretExpired(_) => 401,
            Self::Internal(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SecurityError::validation("invalid input");
        assert!(err.to_string().contains("Validation error"));

        let err = SecurityError::SecretNotFound("api-key".to_string());
        assert!(err.to_string().contains("api-key"));
    }

    #[test]
    fn test_is_client_error() {
        assert!(SecurityError::Validation("test".to_string()).is_client_error());
        assert!(!SecurityError::Internal("test".to_string()).is_client_error());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(SecurityError::Validation("".to_string()).status_code(), 400);
        assert_eq!(SecurityError::SecretNotFound("".to_string()).status_code(), 404);
        assert_eq!(SecurityError::SecretExpired("".to_string()).status_code(), 401);
        assert_eq!(SecurityError::Internal("".to_string()).status_code(), 500);
    }
}
