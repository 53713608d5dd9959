//! `AppState`: the shared handle every Axum handler receives, wiring the
//! routing/pipeline/tenancy/telemetry crates into one object the server
//! crate owns.

use std::sync::Arc;
use std::time::Duration;

use gateway_config::schema::{GatewayConfig, RateLimitConfig};
use gateway_pipeline::{ModelSignalTracker, Pipeline, PipelineConfig, RegistryCandidateSource};
use gateway_providers::ProviderRegistry;
use gateway_resilience::{
    CircuitBreakerConfig, DistributedCache, DistributedCacheConfig, RateLimiter,
    RateLimiterConfig,
};
use gateway_routing::{Router, RouterConfig};
use gateway_telemetry::observer::Observer;
use gateway_telemetry::{Metrics, RequestTracker};
use gateway_tenancy::experiment::{Experiment, Variant};
use gateway_tenancy::sla::{Operator, Sla};
use gateway_tenancy::{ExperimentRegistry, QuotaRegistry, SlaEvaluator, TenantRegistry};

use crate::auth::AuthState;
use crate::health::HealthChecker;
use crate::shutdown::ShutdownCoordinator;

/// Everything an Axum handler needs: the execution pipeline plus the
/// read-side registries handlers query directly (models, tenants, health).
#[derive(Clone)]
pub struct AppState {
    /// The wired execution pipeline (§4.I).
    pub pipeline: Arc<Pipeline>,
    /// The model catalog, queried directly by `/models` handlers.
    pub registry: Arc<ProviderRegistry>,
    /// Tenant catalog, queried directly by admin handlers.
    pub tenants: Arc<TenantRegistry>,
    /// Quota registry, queried directly by admin/introspection handlers.
    pub quotas: Arc<QuotaRegistry>,
    /// SLA evaluator, fed latency/error observations by the pipeline and
    /// polled by the background evaluation loop (`gateway-server::sla_loop`).
    pub sla: Arc<SlaEvaluator>,
    /// SLAs seeded from configuration, evaluated on each tick of the
    /// background loop.
    pub slas: Arc<Vec<Sla>>,
    /// Typed event channels (SLA transitions, route decisions, circuit
    /// breaker flips, ...) that admin/introspection endpoints and the SLA
    /// loop publish to.
    pub observer: Arc<Observer>,
    /// Authentication state (JWT/OIDC/API-key).
    pub auth: AuthState,
    /// Liveness/readiness/startup/deep health checks.
    pub health: Arc<HealthChecker>,
    /// Coordinates graceful shutdown and in-flight request draining.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// Prometheus metrics registry.
    pub metrics: Arc<Metrics>,
    /// The gateway's static configuration document, for read-only
    /// introspection endpoints (`/admin/config` and similar).
    pub config: Arc<GatewayConfig>,
}

impl AppState {
    /// Start building an `AppState` from a loaded configuration document.
    #[must_use]
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::default()
    }
}

/// Builds an [`AppState`], wiring every dependent crate's config struct
/// from the relevant slice of [`GatewayConfig`].
#[derive(Default)]
pub struct AppStateBuilder {
    config: Option<GatewayConfig>,
    registry: Option<Arc<ProviderRegistry>>,
    auth: Option<AuthState>,
    shutdown: Option<Arc<ShutdownCoordinator>>,
}

impl AppStateBuilder {
    /// Supply the loaded configuration document.
    #[must_use]
    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Supply a pre-populated provider registry (providers are constructed
    /// by the binary's `main`, which has access to adapter-specific config
    /// structs this crate does not depend on).
    #[must_use]
    pub fn registry(mut self, registry: Arc<ProviderRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Supply authentication state (built separately since it is async to
    /// construct -- JWKS/OIDC discovery may need a network round trip).
    #[must_use]
    pub fn auth(mut self, auth: AuthState) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Share the same [`ShutdownCoordinator`] the owning [`GracefulServer`]
    /// drives, so handlers and the drain loop agree on in-flight state.
    ///
    /// [`GracefulServer`]: crate::shutdown::GracefulServer
    #[must_use]
    pub fn shutdown(mut self, coordinator: Arc<ShutdownCoordinator>) -> Self {
        self.shutdown = Some(coordinator);
        self
    }

    /// Wire every component from the accumulated config and finish.
    ///
    /// Falls back to reasonable empty defaults (in-memory registry, no
    /// seeded tenants, disabled auth) wherever a prerequisite wasn't
    /// supplied, so tests can build a minimal state with just
    /// `AppState::builder().config(GatewayConfig::default()).build()`.
    #[must_use]
    pub fn build(self) -> AppState {
        let config = self.config.unwrap_or_default();
        let registry = self.registry.unwrap_or_else(|| Arc::new(ProviderRegistry::new()));
        if let Some(max_models) = config.registry.max_models {
            registry.set_max_models(max_models);
        }

        // `CircuitBreakerConfig::failure_threshold` is an absolute failure
        // count, not a percentage, so `error_threshold_pct` is converted
        // against the configured volume: a breaker with `volume_threshold`
        // requests in its window opens once `error_threshold_pct` of them
        // have failed.
        let failure_threshold = ((f64::from(config.circuit.error_threshold_pct) / 100.0)
            * f64::from(config.circuit.volume_threshold))
        .round()
        .max(1.0) as u32;
        let circuit_config = CircuitBreakerConfig {
            failure_threshold,
            min_requests: config.circuit.volume_threshold,
            window_size: config.circuit.volume_threshold,
            timeout: Duration::from_millis(config.circuit.reset_after_ms),
            ..CircuitBreakerConfig::default()
        };
        let signals = Arc::new(ModelSignalTracker::new(circuit_config));
        let candidate_source = Arc::new(RegistryCandidateSource::new(registry.clone(), signals));

        let router_config = RouterConfig {
            default_strategy: parse_strategy(&config.strategy),
            ..RouterConfig::default()
        };
        let router = Arc::new(Router::new(candidate_source.clone(), router_config));

        let cache = Arc::new(DistributedCache::new(DistributedCacheConfig {
            enabled: config.cache.enabled,
            default_ttl: Duration::from_millis(config.cache.ttl_ms),
            ..DistributedCacheConfig::default()
        }));

        let global_rate_limit = config
            .rate_limit
            .get("global")
            .copied()
            .unwrap_or(RateLimitConfig { rps: 1_000, burst: 2_000 });
        let rate_limiter = Arc::new(RateLimiter::new(RateLimiterConfig {
            rps: global_rate_limit.rps,
            burst: global_rate_limit.burst,
        }));

        let quotas = Arc::new(QuotaRegistry::new());
        let tenants = Arc::new(TenantRegistry::new());
        for seed in &config.tenants {
            let tenant = gateway_tenancy::Tenant::new(seed.id.clone());
            let _ = tenants.register(tenant);
            for quota in &seed.quotas {
                quotas.seed(
                    seed.id.clone(),
                    quota.kind.clone(),
                    gateway_tenancy::quota::QuotaLimit {
                        limit: quota.limit,
                        window: Duration::from_millis(quota.window_ms),
                    },
                );
            }
        }
        let experiments = Arc::new(ExperimentRegistry::new());
        for seed in &config.experiments {
            experiments.register(Experiment {
                id: seed.id.clone(),
                active: seed.enabled,
                control_model_id: seed.control_model_id.clone(),
                variants: seed
                    .variants
                    .iter()
                    .map(|v| Variant {
                        name: v.name.clone(),
                        weight: v.weight,
                        model_id: v.model_id.clone(),
                    })
                    .collect(),
                success_metric: seed.success_metric.clone(),
            });
        }

        let sla = Arc::new(SlaEvaluator::new());
        let slas: Arc<Vec<Sla>> = Arc::new(
            config
                .slas
                .iter()
                .map(|seed| Sla {
                    id: seed.id.clone(),
                    scope: seed.scope.clone(),
                    metric: seed.metric.clone(),
                    operator: Operator::parse(&seed.operator),
                    threshold: seed.threshold,
                    window: Duration::from_millis(seed.window_ms),
                })
                .collect(),
        );

        let request_tracker = Arc::new(RequestTracker::with_defaults());
        let metrics = Arc::new(
            Metrics::with_defaults().expect("default metric collectors register under unique names"),
        );
        let middleware = Arc::new(gateway_pipeline::MiddlewareChain::new());

        let pipeline_config = PipelineConfig {
            default_strategy: parse_strategy(&config.strategy),
            default_timeout: Duration::from_millis(config.timeout_ms),
            retries_per_model: config.retries_per_model,
            ..PipelineConfig::default()
        };

        let pipeline = Arc::new(Pipeline::new(
            router,
            candidate_source,
            registry.clone(),
            cache,
            rate_limiter,
            quotas.clone(),
            experiments,
            request_tracker,
            metrics.clone(),
            middleware,
            sla.clone(),
            pipeline_config,
        ));

        let health = Arc::new(HealthChecker::with_defaults());
        let shutdown = self.shutdown.unwrap_or_else(|| {
            Arc::new(ShutdownCoordinator::new(crate::shutdown::ShutdownConfig {
                drain_timeout: Duration::from_millis(config.server.drain_ms),
                ..crate::shutdown::ShutdownConfig::default()
            }))
        });

        AppState {
            pipeline,
            registry,
            tenants,
            quotas,
            sla,
            slas,
            observer: Arc::new(Observer::with_defaults()),
            auth: self.auth.unwrap_or_else(AuthState::disabled),
            health,
            shutdown,
            metrics,
            config: Arc::new(config),
        }
    }
}

fn parse_strategy(name: &str) -> gateway_routing::RoutingStrategy {
    let kebab = name.replace('_', "-");
    serde_json::from_value(serde_json::Value::String(kebab))
        .unwrap_or(gateway_routing::RoutingStrategy::Balanced)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_produces_usable_state_from_defaults() {
        let state = AppState::builder().config(GatewayConfig::default()).build();
        assert!(state.registry.is_empty());
        assert!(state.tenants.is_empty());
    }

    #[test]
    fn test_builder_seeds_tenants_and_quotas() {
        let mut config = GatewayConfig::default();
        config.tenants.push(gateway_config::schema::TenantSeed {
            id: "acme".to_string(),
            name: Some("Acme Corp".to_string()),
            quotas: vec![gateway_config::schema::QuotaSeed {
                kind: "requests".to_string(),
                limit: 1_000,
                window_ms: 60_000,
            }],
        });

        let state = AppState::builder().config(config).build();
        assert_eq!(state.tenants.len(), 1);
        assert!(state.quotas.snapshot("acme", "requests").is_some());
    }
}
