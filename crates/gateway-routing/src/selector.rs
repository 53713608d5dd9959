//! Candidate gathering and filtering (§4.H "candidate set = healthy, loaded
//! (or loadable) models the principal is allowed to use").
//!
//! [`ProviderCandidate`] is the scoring-ready shape the rest of the routing
//! crate consumes. Building one from live registry/circuit-breaker/
//! telemetry state is the caller's job -- [`CandidateSource`] is the
//! interface seam (Design Note: Router depends on an interface, not on
//! `gateway-providers` directly, breaking the Router/Registry/Pipeline
//! import cycle).

use async_trait::async_trait;
use gateway_core::principal::Principal;
use gateway_core::provider::ProviderCapabilities;
use gateway_core::types::ModelId;
use gateway_core::GatewayError;
use gateway_resilience::CircuitState;
use std::collections::HashSet;

/// A capability a request may demand of the model it is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityFlag {
    /// Streaming responses.
    Streaming,
    /// Tool/function calling.
    FunctionCalling,
    /// Image content parts.
    Vision,
    /// Structured JSON response format.
    JsonMode,
    /// Deterministic seed parameter.
    Seed,
}

/// The normalized capability demands of a single request, used both to
/// filter candidates and as part of the route-decision cache key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityDemand {
    /// Capabilities the request requires; candidates missing any of these
    /// are dropped entirely.
    pub required: HashSet<CapabilityFlagOrd>,
}

/// `CapabilityFlag` wrapped for use in an ordered/hashable set (needed for
/// a deterministic cache key -- see `router::cache_key`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CapabilityFlagOrd(pub CapabilityFlag);

impl PartialOrd for CapabilityFlag {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for CapabilityFlag {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (*self as u8).cmp(&(*other as u8))
    }
}
impl Eq for CapabilityFlag {}

impl CapabilityDemand {
    /// An empty demand set -- every candidate passes.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Require `flag`.
    #[must_use]
    pub fn require(mut self, flag: CapabilityFlag) -> Self {
        self.required.insert(CapabilityFlagOrd(flag));
        self
    }

    fn satisfied_by(&self, caps: &ProviderCapabilities) -> bool {
        self.required.iter().all(|f| match f.0 {
            CapabilityFlag::Streaming => caps.streaming,
            CapabilityFlag::FunctionCalling => caps.function_calling,
            CapabilityFlag::Vision => caps.vision,
            CapabilityFlag::JsonMode => caps.json_mode,
            CapabilityFlag::Seed => caps.seed,
        })
    }

    /// Stable sorted string used in cache keys, independent of insertion
    /// order or hash-iteration order.
    #[must_use]
    pub fn cache_fragment(&self) -> String {
        let mut flags: Vec<&'static str> = self
            .required
            .iter()
            .map(|f| match f.0 {
                CapabilityFlag::Streaming => "streaming",
                CapabilityFlag::FunctionCalling => "function_calling",
                CapabilityFlag::Vision => "vision",
                CapabilityFlag::JsonMode => "json_mode",
                CapabilityFlag::Seed => "seed",
            })
            .collect();
        flags.sort_unstable();
        flags.join(",")
    }
}

/// A scoring-ready view of one routable model, assembled by the caller from
/// the Registry, Circuit Breaker, and telemetry state.
#[derive(Debug, Clone)]
pub struct ProviderCandidate {
    /// The model this candidate serves.
    pub model_id: ModelId,
    /// The provider instance id serving it.
    pub provider_id: String,
    /// Declared capabilities.
    pub capabilities: ProviderCapabilities,
    /// Normalized quality signal in `[0, 1]`.
    pub quality: f64,
    /// Normalized speed signal in `[0, 1]` (higher is faster).
    pub speed: f64,
    /// Normalized cost signal in `[0, 1]` (higher is costlier).
    pub cost: f64,
    /// Normalized health signal in `[0, 1]` (1.0 = fully healthy).
    pub health: f64,
    /// Current in-flight request count against this candidate.
    pub in_flight: u32,
    /// This candidate's circuit breaker state.
    pub circuit_state: CircuitState,
    /// When the circuit's next half-open probe is permitted, if open.
    pub next_attempt_at_ms: Option<u64>,
}

impl ProviderCandidate {
    /// Whether this candidate may currently receive a call: closed, or
    /// half-open (a probe), but never plain open.
    #[must_use]
    pub fn is_callable(&self) -> bool {
        !matches!(self.circuit_state, CircuitState::Open)
    }
}

/// Criteria a candidate must satisfy to be routable for a given request.
#[derive(Debug, Clone, Default)]
pub struct SelectionCriteria {
    /// Capability demands the request makes.
    pub demand: CapabilityDemand,
    /// Model ids the principal is explicitly permitted to use; `None` means
    /// no restriction beyond what the candidate source already applied.
    pub allowed_model_ids: Option<HashSet<String>>,
}

/// Supplies the candidate pool for a request; implemented outside this
/// crate (typically backed by `gateway-providers::ProviderRegistry` plus
/// circuit-breaker and telemetry state) so the Router never imports the
/// Registry directly.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    /// Every candidate the principal is allowed to route to right now,
    /// before capability filtering.
    async fn candidates(&self, principal: &Principal) -> Result<Vec<ProviderCandidate>, GatewayError>;
}

/// Filters a raw candidate pool down to those matching `criteria`: declared
/// capabilities satisfy the demand, and (if set) the model id is in the
/// principal's allow-list. Health is NOT filtered here -- §4.H's "all
/// candidates in OPEN circuits" edge case needs the full (unhealthy-
/// inclusive) set available to the caller.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProviderSelector;

impl ProviderSelector {
    /// Apply `criteria` to `pool`, returning the matching subset in the
    /// original order.
    #[must_use]
    pub fn select(pool: Vec<ProviderCandidate>, criteria: &SelectionCriteria) -> Vec<ProviderCandidate> {
        pool.into_iter()
            .filter(|c| criteria.demand.satisfied_by(&c.capabilities))
            .filter(|c| {
                criteria
                    .allowed_model_ids
                    .as_ref()
                    .map_or(true, |allowed| allowed.contains(c.model_id.as_str()))
            })
            .collect()
    }
}
