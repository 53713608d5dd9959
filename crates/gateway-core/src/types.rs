//! Validated newtypes shared across the gateway.
//!
//! These wrap primitives that the data model calls out as invariant-bearing
//! (temperature range, token counts, identifiers) so that once a value is
//! constructed it is known-valid everywhere it is passed.

use crate::error::GatewayError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque request identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(String);

impl RequestId {
    /// Generate a new random request id.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Wrap an existing string as a request id.
    #[must_use]
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::generate()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validated model identifier.
///
/// Invariant: non-empty, no leading/trailing whitespace, no control
/// characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelId(String);

impl ModelId {
    /// Validate and construct a `ModelId`.
    ///
    /// # Errors
    /// Returns `GatewayError::InvalidRequest` if the id is empty or malformed.
    pub fn new(id: impl Into<String>) -> Result<Self, GatewayError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(GatewayError::validation(
                "model id must not be empty",
                Some("model".to_string()),
                "empty_model_id",
            ));
        }
        if id.trim() != id || id.chars().any(char::is_control) {
            return Err(GatewayError::validation(
                format!("model id '{id}' contains invalid characters"),
                Some("model".to_string()),
                "invalid_model_id",
            ));
        }
        Ok(Self(id))
    }

    /// Borrow the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Provider instance identifier (e.g. `"azure-east"`, `"bedrock-prod"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderId(String);

impl ProviderId {
    /// Construct a provider id from a non-empty string.
    ///
    /// # Errors
    /// Returns `GatewayError::InvalidRequest` if empty.
    pub fn new(id: impl Into<String>) -> Result<Self, GatewayError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(GatewayError::validation(
                "provider id must not be empty",
                Some("provider_id".to_string()),
                "empty_provider_id",
            ));
        }
        Ok(Self(id))
    }

    /// Borrow the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tenant identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(String);

impl TenantId {
    /// Construct a tenant id from a non-empty string.
    ///
    /// # Errors
    /// Returns `GatewayError::InvalidRequest` if empty.
    pub fn new(id: impl Into<String>) -> Result<Self, GatewayError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(GatewayError::validation(
                "tenant id must not be empty",
                Some("tenant_id".to_string()),
                "empty_tenant_id",
            ));
        }
        Ok(Self(id))
    }

    /// Borrow the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// API key identifier, masked on `Display`/`Debug` (`first4 + *** + last4`).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApiKey(String);

impl ApiKey {
    /// Validate the key's shape (length, prefix, absence of whitespace).
    ///
    /// # Errors
    /// Returns `GatewayError::Auth` if the key shape is invalid.
    pub fn new(key: impl Into<String>, expected_prefix: Option<&str>) -> Result<Self, GatewayError> {
        let key = key.into();
        if key.len() < 16 {
            return Err(GatewayError::authentication("API key is too short"));
        }
        if key.chars().any(char::is_whitespace) {
            return Err(GatewayError::authentication(
                "API key must not contain whitespace",
            ));
        }
        if let Some(prefix) = expected_prefix {
            if !key.starts_with(prefix) {
                return Err(GatewayError::authentication(format!(
                    "API key must start with '{prefix}'"
                )));
            }
        }
        Ok(Self(key))
    }

    /// Borrow the raw key. Callers must not log or persist the result.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Masked form suitable for logs and error surfaces: `first4***last4`.
    #[must_use]
    pub fn masked(&self) -> String {
        mask_secret(&self.0)
    }
}

/// Mask a secret as `first4 + *** + last4`, or fully mask short secrets.
#[must_use]
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}***{tail}")
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey({})", self.masked())
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.masked())
    }
}

/// Sampling temperature, validated to `[0.0, 2.0]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Temperature(f32);

impl Temperature {
    /// Validate and construct a temperature.
    ///
    /// # Errors
    /// Returns `GatewayError::InvalidRequest` if out of range.
    pub fn new(value: f32) -> Result<Self, GatewayError> {
        if !(0.0..=2.0).contains(&value) {
            return Err(GatewayError::validation(
                format!("temperature must be between 0.0 and 2.0, got {value}"),
                Some("temperature".to_string()),
                "invalid_temperature",
            ));
        }
        Ok(Self(value))
    }

    /// The raw value.
    #[must_use]
    pub fn value(&self) -> f32 {
        self.0
    }
}

/// Top-p nucleus sampling parameter, validated to `(0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TopP(f32);

impl TopP {
    /// Validate and construct a top-p value.
    ///
    /// # Errors
    /// Returns `GatewayError::InvalidRequest` if out of range.
    pub fn new(value: f32) -> Result<Self, GatewayError> {
        if !(0.0..=1.0).contains(&value) || value <= 0.0 {
            return Err(GatewayError::validation(
                format!("top_p must be between 0.0 (exclusive) and 1.0, got {value}"),
                Some("top_p".to_string()),
                "invalid_top_p",
            ));
        }
        Ok(Self(value))
    }

    /// The raw value.
    #[must_use]
    pub fn value(&self) -> f32 {
        self.0
    }
}

/// Top-k sampling parameter, validated to be non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopK(u32);

impl TopK {
    /// Validate and construct a top-k value.
    ///
    /// # Errors
    /// Returns `GatewayError::InvalidRequest` if zero.
    pub fn new(value: u32) -> Result<Self, GatewayError> {
        if value == 0 {
            return Err(GatewayError::validation(
                "top_k must be greater than zero",
                Some("top_k".to_string()),
                "invalid_top_k",
            ));
        }
        Ok(Self(value))
    }

    /// The raw value.
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }
}

/// Maximum output tokens, validated to be at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaxTokens(u32);

impl MaxTokens {
    /// Validate and construct a max-tokens value.
    ///
    /// # Errors
    /// Returns `GatewayError::InvalidRequest` if zero.
    pub fn new(value: u32) -> Result<Self, GatewayError> {
        if value == 0 {
            return Err(GatewayError::validation(
                "max_tokens must be at least 1",
                Some("max_tokens".to_string()),
                "invalid_max_tokens",
            ));
        }
        Ok(Self(value))
    }

    /// The raw value.
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_id_rejects_empty() {
        assert!(ModelId::new("").is_err());
        assert!(ModelId::new("  ").is_err());
        assert!(ModelId::new(" gpt-4").is_err());
        assert!(ModelId::new("gpt-4").is_ok());
    }

    #[test]
    fn test_temperature_range() {
        assert!(Temperature::new(-0.1).is_err());
        assert!(Temperature::new(2.1).is_err());
        assert!(Temperature::new(0.0).is_ok());
        assert!(Temperature::new(2.0).is_ok());
    }

    #[test]
    fn test_top_p_range() {
        assert!(TopP::new(0.0).is_err());
        assert!(TopP::new(1.0).is_ok());
        assert!(TopP::new(1.1).is_err());
    }

    #[test]
    fn test_max_tokens_nonzero() {
        assert!(MaxTokens::new(0).is_err());
        assert!(MaxTokens::new(1).is_ok());
    }

    #[test]
    fn test_api_key_masking() {
        let key = ApiKey::new("sk-abcdefghijklmno1234", Some("sk-")).expect("valid key");
        let masked = key.masked();
        assert!(masked.starts_with("sk-a"));
        assert!(masked.ends_with("1234"));
        assert!(masked.contains("***"));
        assert!(!masked.contains("efghijklmno"));
    }

    #[test]
    fn test_api_key_rejects_whitespace_and_short() {
        assert!(ApiKey::new("short", None).is_err());
        assert!(ApiKey::new("this has a space in it!", None).is_err());
    }

    #[test]
    fn test_request_id_generate_unique() {
        let a = RequestId::generate();
        let b = RequestId::generate();
        assert_ne!(a, b);
    }
}
