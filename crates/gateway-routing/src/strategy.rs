//! Router strategies and the weighted scoring function (§4.H).
//!
//! A [`RoutingStrategy`] picks the weight vector `(wq, ws, wc, wh)` applied
//! to a candidate's quality/speed/cost/health signals. `score` is the sole
//! place the formula from the design is evaluated so every strategy shares
//! one implementation.

use serde::{Deserialize, Serialize};

use crate::selector::ProviderCandidate;

/// The enumerated strategy set from §4.H.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoutingStrategy {
    /// Weight quality heavily; used for user-facing, correctness-sensitive
    /// traffic.
    QualityFirst,
    /// Weight speed heavily; used for latency-sensitive traffic.
    SpeedPriority,
    /// Weight cost heavily; used for bulk/batch traffic.
    CostOptimized,
    /// Even weighting across quality, speed, and cost.
    Balanced,
    /// Ignore scoring; rotate through candidates in order.
    RoundRobin,
    /// Ignore scoring; pick uniformly at random.
    Random,
    /// Filter to candidates matching the request's declared capability
    /// demands, then fall back to `Balanced` scoring among survivors.
    CapabilityMatch,
}

impl Default for RoutingStrategy {
    fn default() -> Self {
        Self::Balanced
    }
}

/// The four weights `(wq, ws, wc, wh)` a strategy applies to a candidate's
/// normalized quality/speed/cost/health signals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrategyWeights {
    /// Weight on quality (higher is better).
    pub quality: f64,
    /// Weight on speed (higher is better).
    pub speed: f64,
    /// Weight on cost (subtracted -- higher cost lowers the score).
    pub cost: f64,
    /// Weight on health (higher is better).
    pub health: f64,
}

impl RoutingStrategy {
    /// The weight vector this strategy applies, per §4.H's enumerated
    /// values (`quality-first: wq=0.8, ws=0.1, wc=0.05, wh=0.05`, and so
    /// on for the remaining strategies).
    #[must_use]
    pub fn weights(self) -> StrategyWeights {
        match self {
            Self::QualityFirst => StrategyWeights {
                quality: 0.8,
                speed: 0.1,
                cost: 0.05,
                health: 0.05,
            },
            Self::SpeedPriority => StrategyWeights {
                quality: 0.1,
                speed: 0.75,
                cost: 0.05,
                health: 0.1,
            },
            Self::CostOptimized => StrategyWeights {
                quality: 0.15,
                speed: 0.1,
                cost: 0.65,
                health: 0.1,
            },
            Self::Balanced | Self::CapabilityMatch => StrategyWeights {
                quality: 0.3,
                speed: 0.3,
                cost: 0.25,
                health: 0.15,
            },
            Self::RoundRobin | Self::Random => StrategyWeights {
                quality: 0.0,
                speed: 0.0,
                cost: 0.0,
                health: 0.0,
            },
        }
    }

    /// Whether this strategy ignores the weighted score entirely and
    /// selects by rotation/chance instead.
    #[must_use]
    pub fn is_unweighted(self) -> bool {
        matches!(self, Self::RoundRobin | Self::Random)
    }
}

/// `score(m, req) = wq*quality + ws*speed - wc*cost + wh*health +
/// capabilityBonus - loadPenalty`, exactly per §4.H.
#[must_use]
pub fn score(strategy: RoutingStrategy, candidate: &ProviderCandidate, capability_bonus: f64) -> f64 {
    let w = strategy.weights();
    let load_penalty = load_penalty(candidate.in_flight);
    w.quality * candidate.quality + w.speed * candidate.speed - w.cost * candidate.cost
        + w.health * candidate.health
        + capability_bonus
        - load_penalty
}

/// Monotonically increasing penalty for in-flight load, diminishing returns
/// via a soft logarithmic curve so a handful of in-flight requests doesn't
/// swing the score as hard as a few hundred.
#[must_use]
pub fn load_penalty(in_flight: u32) -> f64 {
    0.02 * (f64::from(in_flight) + 1.0).ln()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::ProviderCandidate;
    use gateway_core::provider::ProviderCapabilities;
    use gateway_core::types::ModelId;
    use gateway_resilience::CircuitState;

    fn candidate(quality: f64, speed: f64, cost: f64, health: f64, in_flight: u32) -> ProviderCandidate {
        ProviderCandidate {
            model_id: ModelId::new("m").expect("valid"),
            provider_id: "p".to_string(),
            capabilities: ProviderCapabilities::default(),
            quality,
            speed,
            cost,
            health,
            in_flight,
            circuit_state: CircuitState::Closed,
            next_attempt_at_ms: None,
        }
    }

    #[test]
    fn test_quality_first_rewards_quality_over_cost() {
        let high_quality = candidate(0.95, 0.5, 0.8, 1.0, 0);
        let cheap = candidate(0.5, 0.5, 0.1, 1.0, 0);
        assert!(
            score(RoutingStrategy::QualityFirst, &high_quality, 0.0)
                > score(RoutingStrategy::QualityFirst, &cheap, 0.0)
        );
    }

    #[test]
    fn test_cost_optimized_rewards_cheap_over_quality() {
        let high_quality = candidate(0.95, 0.5, 0.9, 1.0, 0);
        let cheap = candidate(0.6, 0.5, 0.05, 1.0, 0);
        assert!(
            score(RoutingStrategy::CostOptimized, &cheap, 0.0)
                > score(RoutingStrategy::CostOptimized, &high_quality, 0.0)
        );
    }

    #[test]
    fn test_load_penalty_monotonic() {
        assert!(load_penalty(10) > load_penalty(1));
        assert!(load_penalty(1) > load_penalty(0));
    }

    #[test]
    fn test_unweighted_strategies() {
        assert!(RoutingStrategy::RoundRobin.is_unweighted());
        assert!(RoutingStrategy::Random.is_unweighted());
        assert!(!RoutingStrategy::Balanced.is_unweighted());
    }
}
