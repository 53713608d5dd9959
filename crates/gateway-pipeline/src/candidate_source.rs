//! Bridges `gateway-providers::ProviderRegistry` and per-model circuit
//! breakers into `gateway-routing`'s [`CandidateSource`] seam, so the
//! Router never imports the Registry directly (Design Note, carried from
//! `gateway-routing::selector`'s own doc comment).

use async_trait::async_trait;
use dashmap::DashMap;
use gateway_core::principal::Principal;
use gateway_core::types::ModelId;
use gateway_core::GatewayError;
use gateway_providers::ProviderRegistry;
use gateway_resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use gateway_routing::{CandidateSource, ProviderCandidate};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// A model's rolling quality/speed/health signal, fed back from execution
/// outcomes at pipeline stage 10 ("update model health stats").
struct ModelSignal {
    /// Exponentially-weighted moving average latency, milliseconds.
    ewma_latency_ms: Mutex<f64>,
    /// Exponentially-weighted moving average of the success rate, `[0, 1]`.
    ewma_success: Mutex<f64>,
    in_flight: AtomicU32,
}

impl Default for ModelSignal {
    fn default() -> Self {
        Self {
            ewma_latency_ms: Mutex::new(500.0),
            ewma_success: Mutex::new(1.0),
            in_flight: AtomicU32::new(0),
        }
    }
}

const EWMA_ALPHA: f64 = 0.2;
/// Latency, in milliseconds, normalized to a speed signal of `0.0`; slower
/// observations clamp at `0.0` rather than going negative.
const SPEED_FLOOR_MS: f64 = 10_000.0;
/// Cost-per-million-tokens normalized to a cost signal of `1.0`; pricier
/// models clamp at `1.0` rather than exceeding it.
const COST_CEILING_PER_MILLION: f64 = 60.0;

/// Live per-model signal tracker plus the circuit breaker registry, shared
/// between the candidate source (reads) and the pipeline's publish stage
/// (writes).
pub struct ModelSignalTracker {
    signals: DashMap<String, Arc<ModelSignal>>,
    circuits: DashMap<String, Arc<CircuitBreaker>>,
    circuit_config: CircuitBreakerConfig,
}

impl ModelSignalTracker {
    /// Construct a tracker whose circuit breakers share `circuit_config`.
    #[must_use]
    pub fn new(circuit_config: CircuitBreakerConfig) -> Self {
        Self {
            signals: DashMap::new(),
            circuits: DashMap::new(),
            circuit_config,
        }
    }

    fn signal(&self, model_id: &str) -> Arc<ModelSignal> {
        self.signals
            .entry(model_id.to_string())
            .or_insert_with(|| Arc::new(ModelSignal::default()))
            .clone()
    }

    /// The circuit breaker for `model_id`, created on first access.
    #[must_use]
    pub fn circuit(&self, model_id: &str) -> Arc<CircuitBreaker> {
        let config = self.circuit_config.clone();
        self.circuits
            .entry(model_id.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(model_id.to_string(), config)))
            .clone()
    }

    /// Mark one more request in flight against `model_id`.
    pub fn begin(&self, model_id: &str) {
        self.signal(model_id).in_flight.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed request's outcome and latency, updating the
    /// rolling signals and releasing the in-flight slot.
    pub fn finish(&self, model_id: &str, latency_ms: f64, success: bool) {
        let signal = self.signal(model_id);
        signal.in_flight.fetch_sub(1, Ordering::Relaxed);

        let mut latency = signal.ewma_latency_ms.lock();
        *latency = EWMA_ALPHA * latency_ms + (1.0 - EWMA_ALPHA) * *latency;

        let mut success_rate = signal.ewma_success.lock();
        let observed = if success { 1.0 } else { 0.0 };
        *success_rate = EWMA_ALPHA * observed + (1.0 - EWMA_ALPHA) * *success_rate;

        let breaker = self.circuit(model_id);
        if success {
            breaker.record_success();
        } else {
            breaker.record_failure();
        }
    }

    fn speed(&self, model_id: &str) -> f64 {
        let latency = *self.signal(model_id).ewma_latency_ms.lock();
        (1.0 - latency / SPEED_FLOOR_MS).clamp(0.0, 1.0)
    }

    fn health(&self, model_id: &str) -> f64 {
        *self.signal(model_id).ewma_success.lock()
    }

    fn in_flight(&self, model_id: &str) -> u32 {
        self.signal(model_id).in_flight.load(Ordering::Relaxed)
    }
}

/// Normalize a per-million-token price into a cost signal in `[0, 1]`.
fn normalize_cost(cost_per_million_in: f64, cost_per_million_out: f64) -> f64 {
    let blended = (cost_per_million_in + cost_per_million_out) / 2.0;
    (blended / COST_CEILING_PER_MILLION).clamp(0.0, 1.0)
}

/// Default quality signal for a model with no explicit override: a model
/// catalog entry carries no quality score of its own (§3's Model entity
/// does not define one), so every candidate starts at a neutral value and
/// is differentiated by cost/speed/health instead.
const DEFAULT_QUALITY: f64 = 0.75;

/// The live [`CandidateSource`] implementation, wrapping the model
/// registry and the signal tracker.
pub struct RegistryCandidateSource {
    registry: Arc<ProviderRegistry>,
    signals: Arc<ModelSignalTracker>,
}

impl RegistryCandidateSource {
    /// Construct a candidate source over `registry`, using `signals` for
    /// quality/speed/cost/health and circuit state.
    #[must_use]
    pub fn new(registry: Arc<ProviderRegistry>, signals: Arc<ModelSignalTracker>) -> Self {
        Self { registry, signals }
    }

    /// The shared signal tracker, so the pipeline can feed outcomes back
    /// into it after execution.
    #[must_use]
    pub fn signals(&self) -> Arc<ModelSignalTracker> {
        self.signals.clone()
    }

    /// The underlying registry, so the pipeline can resolve a routed model
    /// id back to the provider instance serving it.
    #[must_use]
    pub fn registry(&self) -> Arc<ProviderRegistry> {
        self.registry.clone()
    }
}

#[async_trait]
impl CandidateSource for RegistryCandidateSource {
    async fn candidates(&self, _principal: &Principal) -> Result<Vec<ProviderCandidate>, GatewayError> {
        let descriptors = self.registry.list(None);
        let mut candidates = Vec::with_capacity(descriptors.len());

        for descriptor in descriptors {
            let model_id = ModelId::new(descriptor.info.id.clone())?;
            let circuit = self.signals.circuit(descriptor.info.id.as_str());
            let capabilities = self
                .registry
                .get_provider(&descriptor.provider_id)
                .map(|provider| provider.capabilities().clone())
                .unwrap_or_default();
            candidates.push(ProviderCandidate {
                model_id,
                provider_id: descriptor.provider_id.clone(),
                capabilities,
                quality: DEFAULT_QUALITY,
                speed: self.signals.speed(&descriptor.info.id),
                cost: normalize_cost(descriptor.info.cost_per_million_in, descriptor.info.cost_per_million_out),
                health: self.signals.health(&descriptor.info.id),
                in_flight: self.signals.in_flight(&descriptor.info.id),
                circuit_state: circuit.state(),
                next_attempt_at_ms: matches!(circuit.state(), CircuitState::Open).then_some(0),
            });
        }

        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_tracker_updates_latency_and_health() {
        let tracker = ModelSignalTracker::new(CircuitBreakerConfig::default());
        tracker.begin("gpt-4o");
        tracker.finish("gpt-4o", 100.0, true);
        assert!(tracker.speed("gpt-4o") > 0.0);
        assert!(tracker.health("gpt-4o") > 0.5);
        assert_eq!(tracker.in_flight("gpt-4o"), 0);
    }

    #[test]
    fn test_cost_normalization_clamps() {
        assert!((normalize_cost(0.0, 0.0) - 0.0).abs() < f64::EPSILON);
        assert!((normalize_cost(1_000.0, 1_000.0) - 1.0).abs() < f64::EPSILON);
    }
}
