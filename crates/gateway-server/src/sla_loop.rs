//! Periodic SLA evaluation loop (§4.J). Ticks on a fixed interval,
//! evaluating every seeded SLA against the evaluator's recorded series and
//! publishing any breach/escalation/recovery transition on the observer.
//! The pipeline only *records* observations (`SlaEvaluator::record`); this
//! loop is the sole place `SlaEvaluator::evaluate` runs, so a breach opens
//! at most once per tick rather than once per request.

use std::sync::Arc;
use std::time::Duration;

use gateway_telemetry::observer::{EventKind, Observer};
use gateway_tenancy::sla::{BreachTransition, Sla};
use gateway_tenancy::SlaEvaluator;
use serde_json::json;
use tracing::{info, warn};

use crate::shutdown::ShutdownCoordinator;

/// Default interval between evaluation passes.
pub const DEFAULT_TICK: Duration = Duration::from_secs(15);

/// Spawn the background loop. Exits once `shutdown` signals.
pub fn spawn(
    sla: Arc<SlaEvaluator>,
    slas: Arc<Vec<Sla>>,
    observer: Arc<Observer>,
    shutdown: Arc<ShutdownCoordinator>,
) -> tokio::task::JoinHandle<()> {
    spawn_with_interval(sla, slas, observer, shutdown, DEFAULT_TICK)
}

fn spawn_with_interval(
    sla: Arc<SlaEvaluator>,
    slas: Arc<Vec<Sla>>,
    observer: Arc<Observer>,
    shutdown: Arc<ShutdownCoordinator>,
    tick: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(tick);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    for s in slas.iter() {
                        if let Some(transition) = sla.evaluate(s) {
                            publish(&observer, &transition);
                        }
                    }
                }
                () = shutdown.shutdown_signal() => break,
            }
        }
    })
}

fn publish(observer: &Observer, transition: &BreachTransition) {
    match transition {
        BreachTransition::Opened(breach) => {
            warn!(
                sla = %breach.sla_id, scope = %breach.scope, metric = %breach.metric,
                severity = ?breach.severity, value = breach.observed_value, "sla-breach"
            );
            observer.publish(
                EventKind::SlaTransition,
                json!({
                    "event": "sla-breach",
                    "sla_id": breach.sla_id,
                    "scope": breach.scope,
                    "metric": breach.metric,
                    "severity": format!("{:?}", breach.severity),
                    "observed_value": breach.observed_value,
                }),
            );
        }
        BreachTransition::Escalated(breach) => {
            warn!(
                sla = %breach.sla_id, scope = %breach.scope, severity = ?breach.severity,
                "sla-escalated"
            );
            observer.publish(
                EventKind::SlaTransition,
                json!({
                    "event": "sla-escalated",
                    "sla_id": breach.sla_id,
                    "scope": breach.scope,
                    "metric": breach.metric,
                    "severity": format!("{:?}", breach.severity),
                    "observed_value": breach.observed_value,
                }),
            );
        }
        BreachTransition::Recovered(breach) => {
            info!(sla = %breach.sla_id, scope = %breach.scope, "sla-recovery");
            observer.publish(
                EventKind::SlaTransition,
                json!({
                    "event": "sla-recovery",
                    "sla_id": breach.sla_id,
                    "scope": breach.scope,
                    "metric": breach.metric,
                }),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_tenancy::sla::Operator;
    use std::time::Duration as StdDuration;

    #[tokio::test]
    async fn test_loop_publishes_breach_and_recovery() {
        let sla_eval = Arc::new(SlaEvaluator::with_config(
            StdDuration::from_millis(0),
            StdDuration::from_secs(300),
        ));
        let sla_def = Sla {
            id: "latency-sla".to_string(),
            scope: "global".to_string(),
            metric: "latency_ms".to_string(),
            operator: Operator::GreaterThan,
            threshold: 100.0,
            window: StdDuration::from_secs(60),
        };
        let observer = Arc::new(Observer::with_defaults());
        let mut handle = observer.subscribe(EventKind::SlaTransition);

        for _ in 0..5 {
            sla_eval.record("global", "latency_ms", 500.0);
        }
        let transition = sla_eval.evaluate(&sla_def);
        assert!(matches!(transition, Some(BreachTransition::Opened(_))));
        if let Some(t) = transition {
            publish(&observer, &t);
        }

        let event = handle.recv().await.unwrap();
        assert_eq!(event.payload["event"], "sla-breach");
    }
}
