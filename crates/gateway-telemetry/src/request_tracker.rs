//! In-flight request tracking.
//!
//! Bridges the pipeline's per-request lifecycle to the metrics, cost, and
//! audit sinks: a request is registered when it enters the gateway and
//! finished exactly once, with the `RequestOutcome` fed to all three.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Snapshot of an in-flight or completed request.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    /// Gateway-assigned request id.
    pub request_id: String,
    /// Tenant id, if authenticated.
    pub tenant_id: Option<String>,
    /// Model requested.
    pub model: String,
    /// Provider selected to serve it, set once routing completes.
    pub provider: Option<String>,
    /// Wall-clock time the request was registered.
    pub started_at: DateTime<Utc>,
    #[doc(hidden)]
    started_instant: Instant,
}

/// Terminal outcome of a tracked request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Completed successfully.
    Success,
    /// Failed with a provider or internal error.
    Error,
    /// Rejected before reaching a provider (validation, auth, quota).
    Rejected,
    /// Cancelled by the caller before completion.
    Cancelled,
}

impl RequestOutcome {
    /// Label used on the `outcome` dimension of request metrics.
    #[must_use]
    pub fn as_label(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }
}

/// A request that has finished, with its measured duration and outcome.
#[derive(Debug, Clone)]
pub struct FinishedRequest {
    /// The original registration snapshot.
    pub info: RequestInfo,
    /// Elapsed wall-clock time from registration to completion.
    pub duration: Duration,
    /// Terminal outcome.
    pub outcome: RequestOutcome,
}

/// Tracks in-flight requests by request id.
///
/// A request not finished within `stale_after` of registration is reported
/// by [`RequestTracker::sweep_stale`] rather than silently retained forever
/// -- a dropped `finish` call (panic, disconnected client with no
/// cancellation signal) must not leak tracker entries indefinitely.
pub struct RequestTracker {
    in_flight: DashMap<String, RequestInfo>,
    stale_after: Duration,
}

impl RequestTracker {
    /// Create a tracker with the given staleness threshold.
    #[must_use]
    pub fn new(stale_after: Duration) -> Self {
        Self {
            in_flight: DashMap::new(),
            stale_after,
        }
    }

    /// Create a tracker with a five minute staleness threshold.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(Duration::from_secs(300))
    }

    /// Register a request as having started.
    pub fn start(&self, request_id: impl Into<String>, model: impl Into<String>, tenant_id: Option<String>) {
        let request_id = request_id.into();
        let info = RequestInfo {
            request_id: request_id.clone(),
            tenant_id,
            model: model.into(),
            provider: None,
            started_at: Utc::now(),
            started_instant: Instant::now(),
        };
        if self.in_flight.insert(request_id.clone(), info).is_some() {
            warn!(request_id = %request_id, "request id already registered with the tracker");
        }
    }

    /// Record which provider was selected for an in-flight request.
    pub fn set_provider(&self, request_id: &str, provider: impl Into<String>) {
        if let Some(mut entry) = self.in_flight.get_mut(request_id) {
            entry.provider = Some(provider.into());
        }
    }

    /// Number of requests currently in flight.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Look up a snapshot of an in-flight request.
    #[must_use]
    pub fn get(&self, request_id: &str) -> Option<RequestInfo> {
        self.in_flight.get(request_id).map(|e| e.clone())
    }

    /// Finish a request, removing it from the in-flight set and returning
    /// its duration and recorded outcome. Returns `None` if the request id
    /// was never registered or was already finished.
    pub fn finish(&self, request_id: &str, outcome: RequestOutcome) -> Option<FinishedRequest> {
        let (_, info) = self.in_flight.remove(request_id)?;
        let duration = info.started_instant.elapsed();

        debug!(
            request_id = %info.request_id,
            model = %info.model,
            provider = ?info.provider,
            outcome = outcome.as_label(),
            duration_ms = duration.as_millis(),
            "request finished"
        );

        Some(FinishedRequest {
            info,
            duration,
            outcome,
        })
    }

    /// Remove and return every in-flight request older than the tracker's
    /// staleness threshold, logging a warning for each. Intended to run
    /// periodically from a background task.
    pub fn sweep_stale(&self) -> Vec<RequestInfo> {
        let stale: Vec<String> = self
            .in_flight
            .iter()
            .filter(|e| e.started_instant.elapsed() > self.stale_after)
            .map(|e| e.key().clone())
            .collect();

        let mut removed = Vec::with_capacity(stale.len());
        for request_id in stale {
            if let Some((_, info)) = self.in_flight.remove(&request_id) {
                warn!(
                    request_id = %info.request_id,
                    age_secs = info.started_instant.elapsed().as_secs(),
                    "evicting stale in-flight request"
                );
                removed.push(info);
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_and_finish() {
        let tracker = RequestTracker::with_defaults();
        tracker.start("req-1", "gpt-4o", Some("tenant-1".to_string()));
        assert_eq!(tracker.in_flight_count(), 1);

        tracker.set_provider("req-1", "azure-openai");
        let info = tracker.get("req-1").unwrap();
        assert_eq!(info.provider, Some("azure-openai".to_string()));

        let finished = tracker.finish("req-1", RequestOutcome::Success).unwrap();
        assert_eq!(finished.outcome, RequestOutcome::Success);
        assert_eq!(tracker.in_flight_count(), 0);
    }

    #[test]
    fn test_finish_unknown_request_returns_none() {
        let tracker = RequestTracker::with_defaults();
        assert!(tracker.finish("never-started", RequestOutcome::Error).is_none());
    }

    #[test]
    fn test_sweep_stale() {
        let tracker = RequestTracker::new(Duration::from_millis(0));
        tracker.start("req-1", "gpt-4o", None);
        std::thread::sleep(Duration::from_millis(5));

        let stale = tracker.sweep_stale();
        assert_eq!(stale.len(), 1);
        assert_eq!(tracker.in_flight_count(), 0);
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(RequestOutcome::Success.as_label(), "success");
        assert_eq!(RequestOutcome::Rejected.as_label(), "rejected");
    }
}
