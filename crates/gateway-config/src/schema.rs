//! The configuration schema (§6): one field per row of the recognized
//! options table, independently validated.

use gateway_core::ProviderType;
use secrecy::Secret;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("id", &self.id)
            .field("provider_type", &self.provider_type)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_key_env", &self.api_key_env)
            .field("base_url", &self.base_url)
            .field("region", &self.region)
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Top-level gateway configuration document.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP bind settings, ambient to every deployment.
    #[validate(nested)]
    pub server: ServerConfig,
    /// Default router strategy (§4.H).
    pub strategy: String,
    /// Pipeline worker cap.
    #[validate(range(min = 1))]
    pub max_concurrent: usize,
    /// Default request deadline, milliseconds.
    #[validate(range(min = 1))]
    pub timeout_ms: u64,
    /// Max retry attempts against a single candidate.
    pub retries: u32,
    /// Max retry attempts across fallback candidates combined.
    pub retries_per_model: u32,
    /// Cache policy.
    #[validate(nested)]
    pub cache: CacheConfig,
    /// Circuit breaker tuning.
    #[validate(nested)]
    pub circuit: CircuitConfig,
    /// Admission rate limits, keyed by scope name (`"tenant"`, `"api_key"`,
    /// `"global"`, ...).
    pub rate_limit: HashMap<String, RateLimitConfig>,
    /// Provider adapter credentials, keyed by provider instance id.
    pub providers: HashMap<String, ProviderConfig>,
    /// Model registry limits.
    #[validate(nested)]
    pub registry: RegistryConfig,
    /// Seed quotas for known tenants.
    #[validate(nested)]
    pub tenants: Vec<TenantSeed>,
    /// Preloaded A/B experiments.
    pub experiments: Vec<ExperimentSeed>,
    /// Preloaded SLAs.
    pub slas: Vec<SlaSeed>,
    /// Persistence backend.
    #[validate(nested)]
    pub storage: StorageConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            strategy: "round_robin".to_string(),
            max_concurrent: 256,
            timeout_ms: 30_000,
            retries: 2,
            retries_per_model: 1,
            cache: CacheConfig::default(),
            circuit: CircuitConfig::default(),
            rate_limit: HashMap::new(),
            providers: HashMap::new(),
            registry: RegistryConfig::default(),
            tenants: Vec::new(),
            experiments: Vec::new(),
            slas: Vec::new(),
            storage: StorageConfig::default(),
        }
    }
}

/// HTTP server bind settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind host.
    pub host: String,
    /// Bind port.
    #[validate(range(min = 1))]
    pub port: u16,
    /// Graceful-shutdown drain window, milliseconds.
    pub drain_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            drain_ms: 10_000,
        }
    }
}

/// Response cache policy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether caching is enabled at all.
    pub enabled: bool,
    /// Time-to-live for a cache entry, milliseconds.
    pub ttl_ms: u64,
    /// Maximum resident entries before LRU eviction.
    #[validate(range(min = 1))]
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_ms: 60_000,
            max_entries: 10_000,
        }
    }
}

/// Circuit breaker tuning, mirrored onto
/// `gateway_resilience::circuit_breaker::CircuitBreakerConfig` at wiring time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CircuitConfig {
    /// Error percentage, over the evaluation window, that trips the breaker.
    #[validate(range(min = 1, max = 100))]
    pub error_threshold_pct: u8,
    /// Minimum requests in the window before thresholds are evaluated.
    pub volume_threshold: u32,
    /// Milliseconds an OPEN circuit waits before allowing a HALF_OPEN probe.
    pub reset_after_ms: u64,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            error_threshold_pct: 50,
            volume_threshold: 20,
            reset_after_ms: 30_000,
        }
    }
}

/// Token-bucket admission limit for one scope.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate)]
pub struct RateLimitConfig {
    /// Sustained requests per second.
    #[validate(range(min = 1))]
    pub rps: u32,
    /// Burst capacity above the sustained rate.
    #[validate(range(min = 1))]
    pub burst: u32,
}

/// Model registry limits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RegistryConfig {
    /// Maximum concurrently *loaded* models (LRU-evicts the least recently
    /// used loaded model; registration is preserved). Required: the
    /// upstream source expressed this ambiguously across two code paths
    /// with differing defaults (20 vs 50) -- this gateway instead requires
    /// one explicit value and refuses to start on ambiguity.
    pub max_models: Option<u32>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { max_models: None }
    }
}

/// One provider adapter's credentials and connection settings.
#[derive(Clone, Deserialize, Validate)]
#[serde(default)]
pub struct ProviderConfig {
    /// Provider instance id, unique within the registry.
    #[validate(length(min = 1))]
    pub id: String,
    /// Which backend family this adapter talks to.
    pub provider_type: ProviderType,
    /// Inline API key, if provided directly in the document. Prefer
    /// `api_key_env` in committed config; this exists for local/dev use.
    pub api_key: Option<Secret<String>>,
    /// Name of an environment variable to read the API key from.
    pub api_key_env: Option<String>,
    /// Base URL override (self-hosted/compatible endpoints, Azure
    /// deployments).
    pub base_url: Option<String>,
    /// Cloud region, for providers that require one (Bedrock, Azure).
    pub region: Option<String>,
    /// Whether to register this provider at startup.
    pub enabled: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            provider_type: ProviderType::OpenAI,
            api_key: None,
            api_key_env: None,
            base_url: None,
            region: None,
            enabled: true,
        }
    }
}

/// A seed quota entry for a tenant loaded at startup.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QuotaSeed {
    /// Quota kind (`"requests"`, `"tokens"`, `"cost_usd"`).
    #[validate(length(min = 1))]
    pub kind: String,
    /// Limit per window.
    pub limit: u64,
    /// Window length, milliseconds.
    pub window_ms: u64,
}

/// A tenant seeded at startup, with its quotas.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TenantSeed {
    /// Tenant id.
    #[validate(length(min = 1))]
    pub id: String,
    /// Display name.
    pub name: Option<String>,
    /// Seed quotas for this tenant.
    #[validate(nested)]
    pub quotas: Vec<QuotaSeed>,
}

/// A single named variant and its traffic weight within an experiment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentVariantSeed {
    /// Variant name.
    pub name: String,
    /// Traffic weight; all variants in an experiment should sum to 100.
    pub weight: u32,
    /// Model id this variant routes to, if it overrides the request's
    /// requested model.
    pub model_id: Option<String>,
}

/// A preloaded A/B experiment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentSeed {
    /// Experiment id.
    pub id: String,
    /// Variants and weights.
    pub variants: Vec<ExperimentVariantSeed>,
    /// Whether the experiment is active at startup.
    pub enabled: bool,
    /// Control model id, used when no variant overrides it. Defaults to
    /// empty, meaning "the request's own model" (a prompt-only experiment).
    #[serde(default)]
    pub control_model_id: String,
    /// Metric results are compared on when ranking variants.
    #[serde(default = "default_success_metric")]
    pub success_metric: String,
}

fn default_success_metric() -> String {
    "latency_ms".to_string()
}

/// A preloaded SLA definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaSeed {
    /// SLA id.
    pub id: String,
    /// Scope this SLA evaluates (`"tenant:<id>"`, `"model:<id>"`, `"global"`).
    pub scope: String,
    /// Metric this SLA tracks (`"p95_latency_ms"`, `"error_rate"`, ...).
    pub metric: String,
    /// Comparison applied between the aggregated metric and `threshold`
    /// (`"gt"`, `"gte"`, `"lt"`, `"lte"`) -- a breach is declared when
    /// `operator(aggregate(metric), threshold)` holds.
    pub operator: String,
    /// Threshold that constitutes a breach.
    pub threshold: f64,
    /// Sliding evaluation window, milliseconds.
    pub window_ms: u64,
}

/// Persistence backend selection.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend kind: `"memory"`, `"sqlite"`, or `"postgres"`.
    pub kind: String,
    /// Filesystem path, for `"sqlite"`.
    pub path: Option<String>,
    /// Connection string, for `"postgres"`.
    pub dsn: Option<Secret<String>>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: "memory".to_string(),
            path: None,
            dsn: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = GatewayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.strategy, "round_robin");
        assert!(config.registry.max_models.is_none());
    }

    #[test]
    fn test_provider_config_redacts_api_key_in_debug() {
        let config = ProviderConfig {
            api_key: Some(Secret::new("sk-super-secret".to_string())),
            ..ProviderConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("redacted"));
    }

    #[test]
    fn test_invalid_max_concurrent_rejected() {
        let config = GatewayConfig {
            max_concurrent: 0,
            ..GatewayConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
