//! Security configuration: request validation limits and secrets-store
//! settings (the slice of the teacher's bundled `SecurityConfig` component K
//! still needs).

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Input validation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,

    /// Maximum string length.
    #[serde(default = "default_max_string_length")]
    pub max_string_length: usize,

    /// Maximum array length.
    #[serde(default = "default_max_array_length")]
    pub max_array_length: usize,

    /// Maximum nesting depth for JSON.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Allowed content types.
    #[serde(default = "default_content_types")]
    pub allowed_content_types: HashSet<String>,

    /// Whether to strip null bytes.
    #[serde(default = "default_true")]
    pub strip_null_bytes: bool,

    /// Whether to validate UTF-8.
    #[serde(default = "default_true")]
    pub validate_utf8: bool,
}

fn default_max_body_size() -> usize {
    10 * 1024 * 1024 // 10MB
}

fn default_max_string_length() -> usize {
    1_000_000 // 1MB for individual strings
}

fn default_max_array_length() -> usize {
    10_000
}

fn default_max_depth() -> usize {
    32
}

fn default_content_types() -> HashSet<String> {
    let mut set = HashSet::new();
    set.insert("application/json".to_string());
    set.insert("text/plain".to_string());
    set
}

fn default_true() -> bool {
    true
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_body_size: default_max_body_size(),
            max_string_length: default_max_string_length(),
            max_array_length: default_max_array_length(),
            max_depth: default_max_depth(),
            allowed_content_types: default_content_types(),
            strip_null_bytes: true,
            validate_utf8: true,
        }
    }
}

impl ValidationConfig {
    /// Create a strict validation config.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            max_body_size: 1024 * 1024, // 1MB
            max_string_length: 100_000,
            max_array_length: 1000,
            max_depth: 16,
            allowed_content_types: {
                let mut set = HashSet::new();
                set.insert("application/json".to_string());
                set
            },
            strip_null_bytes: true,
            validate_utf8: true,
        }
    }

    /// Create a permissive validation config.
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            max_body_size: 100 * 1024 * 1024, // 100MB
            max_string_length: 10_000_000,
            max_array_length: 100_000,
            max_depth: 64,
            allowed_content_types: {
                let mut set = HashSet::new();
                set.insert("application/json".to_string());
                set.insert("text/plain".to_string());
                set.insert("application/x-www-form-urlencoded".to_string());
                set.insert("multipart/form-data".to_string());
                set
            },
            strip_null_bytes: true,
            validate_utf8: true,
        }
    }
}

/// Secrets management configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretsConfig {
    /// Secrets backend.
    #[serde(default = "default_secrets_backend")]
    pub backend: String,

    /// Path for file-based secrets.
    #[serde(default)]
    pub path: Option<String>,

    /// Environment variable prefix.
    #[serde(default = "default_env_prefix")]
    pub env_prefix: String,

    /// Secret expiration.
    #[serde(with = "humantime_serde", default = "default_secret_expiry")]
    pub default_expiry: Duration,

    /// Enable secret rotation.
    #[serde(default)]
    pub rotation_enabled: bool,

    /// Rotation check interval.
    #[serde(with = "humantime_serde", default = "default_rotation_interval")]
    pub rotation_interval: Duration,
}

fn default_secrets_backend() -> String {
    "env".to_string()
}

fn default_env_prefix() -> String {
    "LLM_GATEWAY_".to_string()
}

fn default_secret_expiry() -> Duration {
    Duration::from_secs(86400 * 30) // 30 days
}

fn default_rotation_interval() -> Duration {
    Duration::from_secs(3600) // 1 hour
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            backend: default_secrets_backend(),
            path: None,
            env_prefix: default_env_prefix(),
            default_expiry: default_secret_expiry(),
            rotation_enabled: false,
            rotation_interval: default_rotation_interval(),
        }
    }
}
