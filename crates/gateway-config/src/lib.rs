//! # Gateway Config
//!
//! Configuration loading, validation, and hot reload for the LLM Inference
//! Gateway: a single structured document (YAML or TOML) overlaid with
//! `GATEWAY_*` environment variables, validated at startup, and optionally
//! watched for live updates.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod reload;
pub mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_config, load_from_path};
pub use reload::ConfigHandle;
pub use schema::{
    CacheConfig, CircuitConfig, ExperimentSeed, ExperimentVariantSeed, GatewayConfig,
    ProviderConfig, QuotaSeed, RateLimitConfig, RegistryConfig, ServerConfig, SlaSeed,
    StorageConfig, TenantSeed,
};
