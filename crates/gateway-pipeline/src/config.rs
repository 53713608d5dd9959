//! Pipeline tuning, mirrored from `gateway_config::schema::GatewayConfig` at
//! wiring time (this crate does not depend on `gateway-config` directly, the
//! same layering `gateway-resilience`/`gateway-providers` use for their own
//! `*Config` structs).

use gateway_routing::RoutingStrategy;
use std::time::Duration;

/// Execution tuning for [`crate::pipeline::Pipeline`].
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Default routing strategy when a request does not supply a
    /// `strategy_hint`.
    pub default_strategy: RoutingStrategy,
    /// Per-attempt timeout ceiling; the effective per-attempt timeout is
    /// `min(request.metadata.timeout_ms, this)`.
    pub default_timeout: Duration,
    /// Retry attempts against one candidate before advancing to the next
    /// fallback (§4.I stage 8: "may advance to the next fallback after
    /// retriesPerModel exhausted").
    pub retries_per_model: u32,
    /// Exponential backoff base delay between retries against the same
    /// candidate.
    pub retry_base_delay: Duration,
    /// Cap on backoff delay regardless of attempt count.
    pub retry_max_delay: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_strategy: RoutingStrategy::default(),
            default_timeout: Duration::from_secs(30),
            retries_per_model: 2,
            retry_base_delay: Duration::from_millis(100),
            retry_max_delay: Duration::from_secs(10),
        }
    }
}
