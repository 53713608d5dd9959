//! SLA evaluation (§4.J): a continuous append of `(metric, value, timestamp)`
//! observations per scope, aggregated over a sliding window and compared to
//! a target via a configured operator, with breach/recovery tracking,
//! escalation of long-unresolved breaches, and alert fan-out deduplication.

use crate::breach::{Breach, Severity};
use chrono::Utc;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Observations older than this are pruned from a scope/metric's time
/// series regardless of any individual SLA's window, bounding memory use.
const MAX_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

/// How an SLA's aggregate compares to its threshold to decide a breach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// Breach when the aggregate is greater than the threshold.
    GreaterThan,
    /// Breach when the aggregate is greater than or equal to the threshold.
    GreaterOrEqual,
    /// Breach when the aggregate is less than the threshold.
    LessThan,
    /// Breach when the aggregate is less than or equal to the threshold.
    LessOrEqual,
}

impl Operator {
    /// Parse the `gateway-config::schema::SlaSeed::operator` string
    /// (`"gt"|"gte"|"lt"|"lte"`). Unrecognized strings fall back to `gt`,
    /// the conservative choice for an uptime/error-rate style metric where
    /// silently disabling breach detection would be worse.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "gte" => Self::GreaterOrEqual,
            "lt" => Self::LessThan,
            "lte" => Self::LessOrEqual,
            _ => Self::GreaterThan,
        }
    }

    fn holds(self, value: f64, threshold: f64) -> bool {
        match self {
            Self::GreaterThan => value > threshold,
            Self::GreaterOrEqual => value >= threshold,
            Self::LessThan => value < threshold,
            Self::LessOrEqual => value <= threshold,
        }
    }
}

/// The aggregate function applied to a metric's windowed observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    /// Arithmetic mean.
    Avg,
    /// 50th percentile.
    P50,
    /// 95th percentile.
    P95,
    /// 99th percentile.
    P99,
    /// Minimum.
    Min,
    /// Maximum.
    Max,
    /// Count of observations.
    Count,
}

impl Aggregate {
    /// Infer the aggregate from a metric name by its conventional prefix
    /// (`"p95_latency_ms"` -> `P95`, `"error_rate"` -> `Avg`, ...), since the
    /// SLA schema names the metric rather than a separate aggregate field.
    #[must_use]
    pub fn infer(metric: &str) -> Self {
        if metric.starts_with("p50_") {
            Self::P50
        } else if metric.starts_with("p95_") {
            Self::P95
        } else if metric.starts_with("p99_") {
            Self::P99
        } else if metric.starts_with("min_") {
            Self::Min
        } else if metric.starts_with("max_") {
            Self::Max
        } else if metric.starts_with("count_") {
            Self::Count
        } else {
            Self::Avg
        }
    }

    fn compute(self, values: &mut [f64]) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        match self {
            Self::Avg => values.iter().sum::<f64>() / values.len() as f64,
            Self::Count => values.len() as f64,
            Self::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Self::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Self::P50 => percentile(values, 0.50),
            Self::P95 => percentile(values, 0.95),
            Self::P99 => percentile(values, 0.99),
        }
    }
}

fn percentile(values: &mut [f64], p: f64) -> f64 {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let rank = (p * (values.len() - 1) as f64).round() as usize;
    values[rank.min(values.len() - 1)]
}

/// A preloaded or runtime-registered SLA definition.
#[derive(Debug, Clone)]
pub struct Sla {
    /// SLA id.
    pub id: String,
    /// Scope evaluated (`"tenant:<id>"`, `"model:<id>"`, `"global"`).
    pub scope: String,
    /// Metric tracked; also determines the aggregate via
    /// [`Aggregate::infer`].
    pub metric: String,
    /// Comparison that constitutes a breach.
    pub operator: Operator,
    /// Threshold compared against the windowed aggregate.
    pub threshold: f64,
    /// Sliding evaluation window.
    pub window: Duration,
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Time series plus breach/alert state, evaluated on demand or from a
/// periodic background task.
pub struct SlaEvaluator {
    series: DashMap<(String, String), VecDeque<(i64, f64)>>,
    open_breaches: DashMap<(String, String), Breach>,
    last_alert: DashMap<(String, String), i64>,
    /// Minimum time between repeated alerts for the same `(scope, metric)`.
    alert_cooldown: Duration,
    /// How long a breach may stay open before its severity escalates.
    escalate_after: Duration,
    next_breach_id: std::sync::atomic::AtomicU64,
}

/// What changed as a result of an evaluation, if anything alert-worthy did.
#[derive(Debug, Clone)]
pub enum BreachTransition {
    /// A new breach opened.
    Opened(Breach),
    /// An open breach escalated to a higher severity.
    Escalated(Breach),
    /// An open breach recovered.
    Recovered(Breach),
}

impl SlaEvaluator {
    /// Construct an evaluator with a one-minute alert cooldown and a
    /// five-minute escalation threshold.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(Duration::from_secs(60), Duration::from_secs(5 * 60))
    }

    /// Construct an evaluator with explicit alert-cooldown and
    /// escalation-threshold durations.
    #[must_use]
    pub fn with_config(alert_cooldown: Duration, escalate_after: Duration) -> Self {
        Self {
            series: DashMap::new(),
            open_breaches: DashMap::new(),
            last_alert: DashMap::new(),
            alert_cooldown,
            escalate_after,
            next_breach_id: std::sync::atomic::AtomicU64::new(1),
        }
    }

    /// Append one observation for `(scope, metric)`, pruning points older
    /// than [`MAX_RETENTION`].
    pub fn record(&self, scope: &str, metric: &str, value: f64) {
        let key = (scope.to_string(), metric.to_string());
        let now = now_ms();
        let cutoff = now - MAX_RETENTION.as_millis() as i64;
        let mut entry = self.series.entry(key).or_insert_with(VecDeque::new);
        entry.push_back((now, value));
        while entry.front().is_some_and(|(ts, _)| *ts < cutoff) {
            entry.pop_front();
        }
    }

    /// Compute the windowed aggregate for `sla` from its currently recorded
    /// observations. Returns `None` if there are no observations in the
    /// window.
    #[must_use]
    pub fn aggregate(&self, sla: &Sla) -> Option<f64> {
        let key = (sla.scope.clone(), sla.metric.clone());
        let series = self.series.get(&key)?;
        let cutoff = now_ms() - sla.window.as_millis() as i64;
        let mut values: Vec<f64> = series.iter().filter(|(ts, _)| *ts >= cutoff).map(|(_, v)| *v).collect();
        if values.is_empty() {
            return None;
        }
        Some(Aggregate::infer(&sla.metric).compute(&mut values))
    }

    /// Evaluate `sla` against its current window, updating breach/recovery
    /// state and returning a transition if alert-worthy and outside the
    /// dedup cooldown.
    pub fn evaluate(&self, sla: &Sla) -> Option<BreachTransition> {
        let Some(aggregate) = self.aggregate(sla) else {
            return None;
        };
        let breached = sla.operator.holds(aggregate, sla.threshold);
        let key = (sla.scope.clone(), sla.metric.clone());
        let now = Utc::now();

        if breached {
            let deviation_ratio = if sla.threshold.abs() > f64::EPSILON {
                ((aggregate - sla.threshold) / sla.threshold).abs()
            } else {
                aggregate.abs()
            };
            let severity = Severity::from_deviation_ratio(deviation_ratio);

            if let Some(mut existing) = self.open_breaches.get_mut(&key) {
                let age = now.signed_duration_since(existing.opened_at);
                let escalated_severity = if age.to_std().unwrap_or_default() >= self.escalate_after {
                    existing.severity.escalate()
                } else {
                    severity
                };
                if escalated_severity > existing.severity {
                    existing.severity = escalated_severity;
                    existing.observed_value = aggregate;
                    return self.maybe_alert(&key, BreachTransition::Escalated(existing.clone()));
                }
                None
            } else {
                let id = self.next_breach_id.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                let breach = Breach {
                    id: format!("breach-{id}"),
                    sla_id: sla.id.clone(),
                    scope: sla.scope.clone(),
                    metric: sla.metric.clone(),
                    severity,
                    observed_value: aggregate,
                    opened_at: now,
                    resolved_at: None,
                };
                self.open_breaches.insert(key.clone(), breach.clone());
                self.maybe_alert(&key, BreachTransition::Opened(breach))
            }
        } else if let Some((_, mut breach)) = self.open_breaches.remove(&key) {
            breach.resolve(now);
            self.maybe_alert(&key, BreachTransition::Recovered(breach))
        } else {
            None
        }
    }

    fn maybe_alert(&self, key: &(String, String), transition: BreachTransition) -> Option<BreachTransition> {
        let now = now_ms();
        let cooldown_ms = self.alert_cooldown.as_millis() as i64;
        let fire = match self.last_alert.get(key) {
            Some(last) if now - *last < cooldown_ms => false,
            _ => true,
        };
        if fire {
            self.last_alert.insert(key.clone(), now);
            Some(transition)
        } else {
            None
        }
    }

    /// Currently open breaches.
    #[must_use]
    pub fn open_breaches(&self) -> Vec<Breach> {
        self.open_breaches.iter().map(|e| e.value().clone()).collect()
    }
}

impl Default for SlaEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sla() -> Sla {
        Sla {
            id: "sla-1".to_string(),
            scope: "global".to_string(),
            metric: "p95_latency_ms".to_string(),
            operator: Operator::GreaterThan,
            threshold: 500.0,
            window: Duration::from_secs(60),
        }
    }

    #[test]
    fn test_operator_parse() {
        assert_eq!(Operator::parse("gt"), Operator::GreaterThan);
        assert_eq!(Operator::parse("gte"), Operator::GreaterOrEqual);
        assert_eq!(Operator::parse("lt"), Operator::LessThan);
        assert_eq!(Operator::parse("lte"), Operator::LessOrEqual);
        assert_eq!(Operator::parse("bogus"), Operator::GreaterThan);
    }

    #[test]
    fn test_aggregate_inference() {
        assert_eq!(Aggregate::infer("p95_latency_ms"), Aggregate::P95);
        assert_eq!(Aggregate::infer("error_rate"), Aggregate::Avg);
        assert_eq!(Aggregate::infer("count_requests"), Aggregate::Count);
    }

    #[test]
    fn test_no_observations_yields_no_aggregate() {
        let evaluator = SlaEvaluator::new();
        assert!(evaluator.aggregate(&sla()).is_none());
    }

    #[test]
    fn test_breach_opens_and_recovers() {
        let evaluator = SlaEvaluator::new();
        let definition = sla();
        for _ in 0..5 {
            evaluator.record("global", "p95_latency_ms", 900.0);
        }
        let transition = evaluator.evaluate(&definition);
        assert!(matches!(transition, Some(BreachTransition::Opened(_))));
        assert_eq!(evaluator.open_breaches().len(), 1);

        for _ in 0..5 {
            evaluator.record("global", "p95_latency_ms", 100.0);
        }
        let transition = evaluator.evaluate(&definition);
        assert!(matches!(transition, Some(BreachTransition::Recovered(_))));
        assert!(evaluator.open_breaches().is_empty());
    }

    #[test]
    fn test_alert_dedup_within_cooldown() {
        let evaluator = SlaEvaluator::with_config(Duration::from_secs(3600), Duration::from_secs(3600));
        let definition = sla();
        evaluator.record("global", "p95_latency_ms", 900.0);
        let first = evaluator.evaluate(&definition);
        assert!(first.is_some());

        evaluator.record("global", "p95_latency_ms", 950.0);
        let second = evaluator.evaluate(&definition);
        assert!(second.is_none(), "repeat breach within cooldown should not re-alert");
    }

    #[test]
    fn test_severity_from_deviation() {
        assert_eq!(Severity::from_deviation_ratio(0.1), Severity::Minor);
        assert_eq!(Severity::from_deviation_ratio(0.5), Severity::Major);
        assert_eq!(Severity::from_deviation_ratio(1.5), Severity::Critical);
    }
}
