//! The Router (§4.H): picks an ordered fallback chain for a request.
//!
//! `Router::route` is the single public entry the Pipeline calls. It
//! applies rules, filters candidates, scores and orders them, and memoizes
//! the decision by `(strategy, sorted candidate ids, capability demands)`
//! until a health transition purges the cache.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use gateway_core::principal::Principal;
use gateway_core::types::ModelId;
use gateway_core::GatewayError;
use gateway_resilience::CircuitState;
use tracing::{debug, warn};

use crate::load_balancer::{break_ties, LoadBalancer, LoadBalancingStrategy};
use crate::rules::{evaluate, RuleAction, RoutingRule};
use crate::selector::{CandidateSource, CapabilityDemand, ProviderCandidate, ProviderSelector, SelectionCriteria};
use crate::strategy::{score, RoutingStrategy};

/// A single request's routing inputs the Router needs beyond the candidate
/// pool itself.
#[derive(Debug, Clone, Default)]
pub struct RouteRequest {
    /// The principal issuing the request (drives candidate sourcing and
    /// rule tenant matching).
    pub tenant_id: String,
    /// `req.options.modelHint`, if the caller asked for a specific model.
    pub model_hint: Option<String>,
    /// `req.options.strategyHint`, if the caller asked for a specific
    /// strategy; otherwise the router's configured default applies.
    pub strategy_hint: Option<RoutingStrategy>,
    /// Capability demands normalized from the request body.
    pub capability_demand: CapabilityDemand,
}

/// Configuration for one `Router` instance.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Strategy used when the request has no `strategyHint`.
    pub default_strategy: RoutingStrategy,
    /// Operator-defined rules, evaluated before scoring.
    pub rules: Vec<RoutingRule>,
    /// Tie-break/rotation rule applied among top-scoring candidates.
    pub load_balancing: LoadBalancingStrategy,
    /// How long a memoized route decision remains valid.
    pub decision_cache_ttl: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            default_strategy: RoutingStrategy::Balanced,
            rules: Vec::new(),
            load_balancing: LoadBalancingStrategy::LeastConnections,
            decision_cache_ttl: Duration::from_secs(30),
        }
    }
}

/// The fallback chain the Router produces: `primary` first, then ordered
/// fallbacks.
pub type RouteDecision = Vec<ModelId>;

struct CachedDecision {
    decision: RouteDecision,
    expires_at: Instant,
}

/// §4.H's Router: strategy-driven candidate selection, scoring, and
/// fallback ordering. Depends on a [`CandidateSource`] (an interface seam)
/// rather than the Registry directly.
pub struct Router<S: CandidateSource> {
    source: Arc<S>,
    config: RouterConfig,
    load_balancer: LoadBalancer,
    decision_cache: DashMap<u64, CachedDecision>,
}

impl<S: CandidateSource> Router<S> {
    /// Build a router backed by `source`.
    pub fn new(source: Arc<S>, config: RouterConfig) -> Self {
        Self {
            source,
            config,
            load_balancer: LoadBalancer::new(),
            decision_cache: DashMap::new(),
        }
    }

    /// Purge every memoized decision. Called by the caller on any model
    /// health transition (§4.H: "purge on model health transitions").
    pub fn purge_decision_cache(&self) {
        self.decision_cache.clear();
    }

    /// Produce the ordered fallback chain for `request`.
    ///
    /// # Errors
    /// Returns `GatewayError::NotFound` ("NoCandidate") if the principal has
    /// no usable candidates at all.
    pub async fn route(
        &self,
        principal: &Principal,
        request: &RouteRequest,
    ) -> Result<RouteDecision, GatewayError> {
        let mut pool = self.source.candidates(principal).await?;

        let mut excluded = std::collections::HashSet::new();
        let mut pinned: Option<String> = None;
        let mut strategy = request.strategy_hint.unwrap_or(self.config.default_strategy);

        if let Some(action) = evaluate(
            &self.config.rules,
            request.model_hint.as_deref(),
            &request.tenant_id,
        ) {
            match action {
                RuleAction::PinModel(id) => pinned = Some(id.clone()),
                RuleAction::UseStrategy(s) => strategy = *s,
                RuleAction::ExcludeModel(id) => {
                    excluded.insert(id.clone());
                }
            }
        }

        pool.retain(|c| !excluded.contains(c.model_id.as_str()));

        if pool.is_empty() {
            return Err(GatewayError::not_found("no candidate model available (NoCandidate)"));
        }

        let cache_key = self.cache_key(strategy, &pool, &request.capability_demand);
        if let Some(entry) = self.decision_cache.get(&cache_key) {
            if entry.expires_at > Instant::now() {
                debug!(strategy = ?strategy, "route decision cache hit");
                return Ok(entry.decision.clone());
            }
        }

        let criteria = SelectionCriteria {
            demand: request.capability_demand.clone(),
            allowed_model_ids: None,
        };
        let filtered = ProviderSelector::select(pool, &criteria);
        if filtered.is_empty() {
            return Err(GatewayError::not_found(
                "no candidate satisfies the request's capability demands (NoCandidate)",
            ));
        }

        let decision = self.decide(strategy, filtered, pinned.or(request.model_hint.clone()))?;

        self.decision_cache.insert(
            cache_key,
            CachedDecision {
                decision: decision.clone(),
                expires_at: Instant::now() + self.config.decision_cache_ttl,
            },
        );
        Ok(decision)
    }

    fn decide(
        &self,
        strategy: RoutingStrategy,
        mut candidates: Vec<ProviderCandidate>,
        hinted_model_id: Option<String>,
    ) -> Result<RouteDecision, GatewayError> {
        // "When req.modelHint is set and legal for the principal, it is
        // placed first regardless of score."
        let hinted = hinted_model_id.as_deref().and_then(|hint| {
            candidates
                .iter()
                .position(|c| c.model_id.as_str() == hint)
                .map(|idx| candidates.remove(idx))
        });

        let callable: Vec<ProviderCandidate> = candidates.iter().filter(|c| c.is_callable()).cloned().collect();
        let mut ordered = if callable.is_empty() {
            // "All candidates in OPEN circuits -> best-effort: pick the one
            // with nearest nextAttemptAt, force HALF_OPEN probe."
            let mut remaining = candidates;
            remaining.sort_by_key(|c| c.next_attempt_at_ms.unwrap_or(u64::MAX));
            warn!("all candidates have open circuits; forcing a half-open probe on the soonest");
            remaining
        } else if strategy.is_unweighted() {
            let lb_strategy = match strategy {
                RoutingStrategy::RoundRobin => LoadBalancingStrategy::RoundRobin,
                RoutingStrategy::Random => LoadBalancingStrategy::Random,
                _ => self.config.load_balancing,
            };
            let rotation_key = rotation_key(&callable);
            self.load_balancer.order(lb_strategy, &rotation_key, callable)
        } else {
            let mut scored: Vec<(f64, ProviderCandidate)> = callable
                .into_iter()
                .map(|c| {
                    let bonus = if matches!(strategy, RoutingStrategy::CapabilityMatch) {
                        0.1
                    } else {
                        0.0
                    };
                    (score(strategy, &c, bonus), c)
                })
                .collect();
            scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
            let top_score = scored.first().map(|(s, _)| *s).unwrap_or(0.0);
            let mut tied: Vec<ProviderCandidate> = scored
                .into_iter()
                .take_while(|(s, _)| (top_score - s).abs() < f64::EPSILON)
                .map(|(_, c)| c)
                .collect();
            break_ties(&mut tied);
            tied
        };

        if let Some(hinted) = hinted {
            ordered.insert(0, hinted);
        }

        Ok(ordered.into_iter().map(|c| c.model_id).collect())
    }

    fn cache_key(&self, strategy: RoutingStrategy, pool: &[ProviderCandidate], demand: &CapabilityDemand) -> u64 {
        let mut ids: Vec<&str> = pool.iter().map(|c| c.model_id.as_str()).collect();
        ids.sort_unstable();
        let mut hasher = DefaultHasher::new();
        strategy.hash(&mut hasher);
        ids.hash(&mut hasher);
        demand.cache_fragment().hash(&mut hasher);
        hasher.finish()
    }
}

fn rotation_key(candidates: &[ProviderCandidate]) -> String {
    let mut ids: Vec<&str> = candidates.iter().map(|c| c.model_id.as_str()).collect();
    ids.sort_unstable();
    ids.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gateway_core::provider::ProviderCapabilities;

    struct FixedSource(Vec<ProviderCandidate>);

    #[async_trait]
    impl CandidateSource for FixedSource {
        async fn candidates(&self, _principal: &Principal) -> Result<Vec<ProviderCandidate>, GatewayError> {
            Ok(self.0.clone())
        }
    }

    fn candidate(id: &str, quality: f64, state: CircuitState) -> ProviderCandidate {
        ProviderCandidate {
            model_id: ModelId::new(id).expect("valid"),
            provider_id: id.to_string(),
            capabilities: ProviderCapabilities::default(),
            quality,
            speed: 0.5,
            cost: 0.3,
            health: 1.0,
            in_flight: 0,
            circuit_state: state,
            next_attempt_at_ms: None,
        }
    }

    fn principal() -> Principal {
        Principal::new("u1", "t1")
    }

    #[tokio::test]
    async fn test_empty_candidate_set_is_no_candidate() {
        let router = Router::new(Arc::new(FixedSource(vec![])), RouterConfig::default());
        let err = router
            .route(&principal(), &RouteRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "not_found");
    }

    #[tokio::test]
    async fn test_model_hint_placed_first_regardless_of_score() {
        let pool = vec![
            candidate("best", 0.99, CircuitState::Closed),
            candidate("hinted", 0.1, CircuitState::Closed),
        ];
        let router = Router::new(Arc::new(FixedSource(pool)), RouterConfig::default());
        let req = RouteRequest {
            model_hint: Some("hinted".to_string()),
            ..RouteRequest::default()
        };
        let decision = router.route(&principal(), &req).await.expect("routes");
        assert_eq!(decision[0].as_str(), "hinted");
    }

    #[tokio::test]
    async fn test_quality_first_orders_by_score() {
        let pool = vec![
            candidate("low", 0.2, CircuitState::Closed),
            candidate("high", 0.9, CircuitState::Closed),
        ];
        let mut config = RouterConfig::default();
        config.default_strategy = RoutingStrategy::QualityFirst;
        let router = Router::new(Arc::new(FixedSource(pool)), config);
        let decision = router.route(&principal(), &RouteRequest::default()).await.expect("routes");
        assert_eq!(decision[0].as_str(), "high");
    }

    #[tokio::test]
    async fn test_all_open_circuits_falls_back_to_nearest_attempt() {
        let pool = vec![
            candidate("far", 0.9, CircuitState::Open),
            candidate("near", 0.1, CircuitState::Open),
        ];
        let mut pool = pool;
        pool[0].next_attempt_at_ms = Some(5_000);
        pool[1].next_attempt_at_ms = Some(100);
        let router = Router::new(Arc::new(FixedSource(pool)), RouterConfig::default());
        let decision = router.route(&principal(), &RouteRequest::default()).await.expect("routes");
        assert_eq!(decision[0].as_str(), "near");
    }

    struct ToggleSource(std::sync::Mutex<Vec<ProviderCandidate>>);

    #[async_trait]
    impl CandidateSource for ToggleSource {
        async fn candidates(&self, _principal: &Principal) -> Result<Vec<ProviderCandidate>, GatewayError> {
            Ok(self.0.lock().expect("lock").clone())
        }
    }

    #[tokio::test]
    async fn test_decision_cache_purge_picks_up_circuit_trip() {
        let pool = vec![
            candidate("a", 0.9, CircuitState::Closed),
            candidate("b", 0.1, CircuitState::Closed),
        ];
        let source = Arc::new(ToggleSource(std::sync::Mutex::new(pool)));
        let router = Router::new(source.clone(), RouterConfig::default());
        let req = RouteRequest::default();

        let first = router.route(&principal(), &req).await.expect("routes");
        assert_eq!(first[0].as_str(), "a", "higher quality candidate wins while both are closed");

        // "a"'s circuit trips open. Without a purge the memoized decision
        // is still returned even though "a" is no longer callable.
        source.0.lock().expect("lock")[0].circuit_state = CircuitState::Open;
        let cached = router.route(&principal(), &req).await.expect("routes");
        assert_eq!(cached, first, "cache hit masks the circuit trip until purged");

        router.purge_decision_cache();
        let after_purge = router.route(&principal(), &req).await.expect("routes");
        assert_eq!(after_purge[0].as_str(), "b", "purge forces a fresh decision that excludes the open circuit");
        assert_ne!(after_purge, first);
    }
}
