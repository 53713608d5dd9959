//! Load balancing among candidates tied on score (§4.H tie-break: "lower
//! current in-flight count, then alphabetical id").
//!
//! `RoundRobin` and `Random` strategies skip scoring entirely and go
//! straight through a [`LoadBalancer`] instead; every other strategy uses
//! one only to break ties after scoring.

use crate::selector::ProviderCandidate;
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Which rule a [`LoadBalancer`] applies to break ties / rotate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadBalancingStrategy {
    /// Rotate through candidates in order, one per call, per rotation key.
    RoundRobin,
    /// Pick uniformly at random.
    Random,
    /// Pick the candidate with the fewest in-flight requests.
    LeastConnections,
}

/// Tuning for the load balancer. Currently only the strategy; reserved for
/// future additions (e.g. weighted round robin) without breaking callers.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadBalancerConfig {
    /// Which tie-break/rotation rule to apply.
    pub strategy: Option<LoadBalancingStrategy>,
}

/// Stateful load balancer: round-robin needs a cursor per rotation key
/// (e.g. per strategy+candidate-set), so it isn't a pure function like
/// scoring is.
pub struct LoadBalancer {
    cursors: Mutex<HashMap<String, AtomicUsize>>,
}

impl Default for LoadBalancer {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadBalancer {
    /// Construct an empty load balancer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cursors: Mutex::new(HashMap::new()),
        }
    }

    /// Order `candidates` per `strategy`. For `RoundRobin`, `rotation_key`
    /// identifies which cursor to advance (typically the sorted candidate
    /// id set, so distinct candidate pools rotate independently).
    #[must_use]
    pub fn order(
        &self,
        strategy: LoadBalancingStrategy,
        rotation_key: &str,
        mut candidates: Vec<ProviderCandidate>,
    ) -> Vec<ProviderCandidate> {
        if candidates.is_empty() {
            return candidates;
        }
        match strategy {
            LoadBalancingStrategy::RoundRobin => {
                let start = self.advance(rotation_key, candidates.len());
                candidates.rotate_left(start);
                candidates
            }
            LoadBalancingStrategy::Random => {
                candidates.shuffle(&mut rand::thread_rng());
                candidates
            }
            LoadBalancingStrategy::LeastConnections => {
                candidates.sort_by(|a, b| {
                    a.in_flight
                        .cmp(&b.in_flight)
                        .then_with(|| a.model_id.as_str().cmp(b.model_id.as_str()))
                });
                candidates
            }
        }
    }

    fn advance(&self, key: &str, modulus: usize) -> usize {
        let mut cursors = self.cursors.lock();
        let cursor = cursors
            .entry(key.to_string())
            .or_insert_with(|| AtomicUsize::new(0));
        cursor.fetch_add(1, Ordering::Relaxed) % modulus
    }
}

/// Deterministic tie-break per §4.H: lower in-flight count first, then
/// alphabetical model id. Applied after scoring, among candidates whose
/// scores are equal (or within floating-point epsilon).
pub fn break_ties(candidates: &mut [ProviderCandidate]) {
    candidates.sort_by(|a, b| {
        a.in_flight
            .cmp(&b.in_flight)
            .then_with(|| a.model_id.as_str().cmp(b.model_id.as_str()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_core::provider::ProviderCapabilities;
    use gateway_core::types::ModelId;
    use gateway_resilience::CircuitState;

    fn candidate(id: &str, in_flight: u32) -> ProviderCandidate {
        ProviderCandidate {
            model_id: ModelId::new(id).expect("valid"),
            provider_id: id.to_string(),
            capabilities: ProviderCapabilities::default(),
            quality: 0.5,
            speed: 0.5,
            cost: 0.5,
            health: 1.0,
            in_flight,
            circuit_state: CircuitState::Closed,
            next_attempt_at_ms: None,
        }
    }

    #[test]
    fn test_round_robin_rotates() {
        let lb = LoadBalancer::new();
        let pool = vec![candidate("a", 0), candidate("b", 0), candidate("c", 0)];
        let first = lb.order(LoadBalancingStrategy::RoundRobin, "key", pool.clone());
        let second = lb.order(LoadBalancingStrategy::RoundRobin, "key", pool.clone());
        assert_ne!(
            first[0].model_id.as_str(),
            second[0].model_id.as_str(),
            "successive calls should rotate the front candidate"
        );
    }

    #[test]
    fn test_round_robin_cursors_independent_per_key() {
        let lb = LoadBalancer::new();
        let pool = vec![candidate("a", 0), candidate("b", 0)];
        let ordered_x = lb.order(LoadBalancingStrategy::RoundRobin, "x", pool.clone());
        let ordered_y = lb.order(LoadBalancingStrategy::RoundRobin, "y", pool.clone());
        assert_eq!(ordered_x[0].model_id.as_str(), ordered_y[0].model_id.as_str());
    }

    #[test]
    fn test_least_connections_orders_by_in_flight() {
        let lb = LoadBalancer::new();
        let pool = vec![candidate("busy", 10), candidate("idle", 0)];
        let ordered = lb.order(LoadBalancingStrategy::LeastConnections, "k", pool);
        assert_eq!(ordered[0].model_id.as_str(), "idle");
    }

    #[test]
    fn test_tie_break_alphabetical_on_equal_load() {
        let mut pool = vec![candidate("zebra", 0), candidate("alpha", 0)];
        break_ties(&mut pool);
        assert_eq!(pool[0].model_id.as_str(), "alpha");
    }
}
