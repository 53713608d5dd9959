//! A/B experiment assignment and result recording (§4.J).
//!
//! Assignment is a pure function of `(experimentId, userKey)`: the same
//! caller always lands in the same variant for the lifetime of an
//! experiment, without storing a per-user assignment anywhere.

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Buckets per experiment, matching §4.J's `mod 10000` granularity (finer
/// than the `weight` field's 0-100 scale, so integer weights still bucket
/// cleanly).
const BUCKET_SPACE: u64 = 10_000;

/// One named variant and its traffic share within an experiment.
#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    /// Variant name (`"control"`, `"treatment-a"`, ...).
    pub name: String,
    /// Traffic weight, 0-100; every experiment's variants should sum to 100.
    pub weight: u32,
    /// Model id this variant routes to, constraining the Router via its
    /// `model_hint`. `None` means "use the request's own model unchanged"
    /// (e.g. the control variant of a prompt-only experiment).
    pub model_id: Option<String>,
}

/// A preloaded or runtime-registered A/B experiment.
#[derive(Debug, Clone)]
pub struct Experiment {
    /// Experiment id.
    pub id: String,
    /// Whether traffic is currently being assigned to this experiment.
    pub active: bool,
    /// The control model id, used when no variant overrides it.
    pub control_model_id: String,
    /// Variants and their weights. Must sum to 100.
    pub variants: Vec<Variant>,
    /// The metric results are keyed by when comparing variants.
    pub success_metric: String,
}

impl Experiment {
    /// Whether `variants`' weights sum to exactly 100, the invariant §3
    /// requires of every experiment.
    #[must_use]
    pub fn has_valid_split(&self) -> bool {
        self.variants.iter().map(|v| v.weight).sum::<u32>() == 100
    }
}

/// Deterministically bucket `(experiment_id, user_key)` into `[0, 10000)`.
#[must_use]
pub fn bucket(experiment_id: &str, user_key: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(experiment_id.as_bytes());
    hasher.update(b"\0");
    hasher.update(user_key.as_bytes());
    let digest = hasher.finalize();
    let first_eight: [u8; 8] = digest[0..8].try_into().expect("sha256 digest is 32 bytes");
    u64::from_be_bytes(first_eight) % BUCKET_SPACE
}

/// Pick the variant `user_key` lands in, by cumulative weight over the
/// bucket space. Returns `None` if `experiment` is inactive or has no
/// variants.
#[must_use]
pub fn assign<'a>(experiment: &'a Experiment, user_key: &str) -> Option<&'a Variant> {
    if !experiment.active || experiment.variants.is_empty() {
        return None;
    }
    let b = bucket(&experiment.id, user_key);
    let mut cumulative = 0u64;
    for variant in &experiment.variants {
        cumulative += u64::from(variant.weight) * (BUCKET_SPACE / 100);
        if b < cumulative {
            return Some(variant);
        }
    }
    experiment.variants.last()
}

/// Aggregated per-variant, per-metric results.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExperimentResult {
    /// Number of observations recorded.
    pub count: u64,
    /// Running sum, for computing the mean.
    pub sum: f64,
    /// Minimum observed value.
    pub min: f64,
    /// Maximum observed value.
    pub max: f64,
}

impl ExperimentResult {
    /// Arithmetic mean of all recorded observations.
    #[must_use]
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    fn record(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.sum += value;
        self.count += 1;
    }
}

/// The experiment catalog and its recorded results.
pub struct ExperimentRegistry {
    experiments: DashMap<String, Experiment>,
    /// `(experiment_id, variant_name, metric)` -> aggregate.
    results: DashMap<(String, String, String), ExperimentResult>,
}

impl Default for ExperimentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ExperimentRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            experiments: DashMap::new(),
            results: DashMap::new(),
        }
    }

    /// Register or replace an experiment.
    pub fn register(&self, experiment: Experiment) {
        self.experiments.insert(experiment.id.clone(), experiment);
    }

    /// Assign `user_key` a variant of `experiment_id`, if the experiment
    /// exists and is active.
    #[must_use]
    pub fn assign(&self, experiment_id: &str, user_key: &str) -> Option<Variant> {
        let experiment = self.experiments.get(experiment_id)?;
        assign(&experiment, user_key).cloned()
    }

    /// Record one observation of `metric` for a variant.
    pub fn record_result(&self, experiment_id: &str, variant: &str, metric: &str, value: f64) {
        let key = (experiment_id.to_string(), variant.to_string(), metric.to_string());
        self.results
            .entry(key)
            .or_insert_with(ExperimentResult::default)
            .record(value);
    }

    /// Snapshot every metric recorded for `experiment_id`, keyed by
    /// `(variant, metric)`.
    #[must_use]
    pub fn results(&self, experiment_id: &str) -> HashMap<(String, String), ExperimentResult> {
        self.results
            .iter()
            .filter(|e| e.key().0 == experiment_id)
            .map(|e| ((e.key().1.clone(), e.key().2.clone()), *e.value()))
            .collect()
    }

    /// The id of an active experiment whose `control_model_id` matches
    /// `model`, if one is registered. Used by the pipeline's stage-4 A/B
    /// hook to find which experiment, if any, governs requests aimed at a
    /// given model -- a request otherwise carries no experiment id of its
    /// own.
    #[must_use]
    pub fn find_by_control_model(&self, model: &str) -> Option<String> {
        self.experiments
            .iter()
            .find(|entry| entry.value().active && entry.value().control_model_id == model)
            .map(|entry| entry.key().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Experiment {
        Experiment {
            id: "exp-1".to_string(),
            active: true,
            control_model_id: "gpt-4o".to_string(),
            variants: vec![
                Variant {
                    name: "control".to_string(),
                    weight: 50,
                    model_id: None,
                },
                Variant {
                    name: "treatment".to_string(),
                    weight: 50,
                    model_id: Some("gpt-4o-mini".to_string()),
                },
            ],
            success_metric: "latency_ms".to_string(),
        }
    }

    #[test]
    fn test_split_validity() {
        assert!(sample().has_valid_split());
        let mut bad = sample();
        bad.variants[0].weight = 40;
        assert!(!bad.has_valid_split());
    }

    #[test]
    fn test_assignment_is_deterministic() {
        let exp = sample();
        let a = assign(&exp, "user-42");
        let b = assign(&exp, "user-42");
        assert_eq!(a, b);
    }

    #[test]
    fn test_inactive_experiment_assigns_nothing() {
        let mut exp = sample();
        exp.active = false;
        assert!(assign(&exp, "user-42").is_none());
    }

    #[test]
    fn test_assignment_distributes_across_variants() {
        let exp = sample();
        let mut seen = std::collections::HashSet::new();
        for i in 0..200 {
            let v = assign(&exp, &format!("user-{i}")).unwrap();
            seen.insert(v.name.clone());
        }
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_registry_assign_and_record() {
        let registry = ExperimentRegistry::new();
        registry.register(sample());
        let variant = registry.assign("exp-1", "user-1").unwrap();
        registry.record_result("exp-1", &variant.name, "latency_ms", 120.0);
        registry.record_result("exp-1", &variant.name, "latency_ms", 80.0);
        let results = registry.results("exp-1");
        let agg = results.get(&(variant.name.clone(), "latency_ms".to_string())).unwrap();
        assert_eq!(agg.count, 2);
        assert!((agg.mean() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_find_by_control_model() {
        let registry = ExperimentRegistry::new();
        registry.register(sample());
        assert_eq!(registry.find_by_control_model("gpt-4o"), Some("exp-1".to_string()));
        assert_eq!(registry.find_by_control_model("unrelated-model"), None);
    }

    #[test]
    fn test_find_by_control_model_ignores_inactive() {
        let registry = ExperimentRegistry::new();
        let mut inactive = sample();
        inactive.active = false;
        registry.register(inactive);
        assert_eq!(registry.find_by_control_model("gpt-4o"), None);
    }
}
