//! Typed observer registration.
//!
//! Components publish lifecycle events (provider health flips, circuit
//! breaker transitions, cache evictions, route decisions) through a typed
//! channel per [`EventKind`] rather than a single global event bus: a
//! listener subscribed to `CircuitBreakerChanged` never pays for, or can be
//! starved by, a flood of `CacheEvent`s. Each channel is a bounded
//! `tokio::sync::broadcast` that silently drops its oldest entry when a slow
//! subscriber falls behind -- publishers never block on a lagging listener --
//! and every drop increments a per-kind counter so the loss is observable
//! rather than silent.

use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::warn;

/// Category of event a component can publish or subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A request completed (success, error, rejection, or cancellation).
    RequestCompleted,
    /// A provider's health check result changed.
    ProviderHealthChanged,
    /// A circuit breaker transitioned state for a provider.
    CircuitBreakerChanged,
    /// A cache entry was inserted, hit, or evicted.
    CacheEvent,
    /// The router selected a provider for a request.
    RouteDecision,
    /// A tenant crossed a budget or rate limit threshold.
    QuotaEvent,
    /// An SLA opened, escalated, or recovered from a breach.
    SlaTransition,
}

/// A single published event: a kind tag plus an opaque JSON payload, so
/// publishers and subscribers need not share a payload type per kind.
#[derive(Debug, Clone)]
pub struct ObserverEvent {
    /// The kind this event was published under.
    pub kind: EventKind,
    /// Event payload.
    pub payload: Value,
}

/// Error returned while waiting on a subscription.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// Every publisher for this event kind has been dropped and the channel
    /// is closed.
    #[error("observer channel closed")]
    Closed,
}

/// A live subscription to one [`EventKind`].
pub struct ObserverHandle {
    kind: EventKind,
    receiver: broadcast::Receiver<ObserverEvent>,
    dropped: Arc<AtomicU64>,
}

impl ObserverHandle {
    /// Await the next event, transparently skipping past any events this
    /// subscriber lagged behind on (each skip increments the kind's dropped
    /// counter, visible via [`Observer::dropped_count`]).
    ///
    /// # Errors
    /// Returns [`ObserverError::Closed`] once every publisher for this kind
    /// has been dropped.
    pub async fn recv(&mut self) -> Result<ObserverEvent, ObserverError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Ok(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    self.dropped.fetch_add(skipped, Ordering::Relaxed);
                    warn!(kind = ?self.kind, skipped, "observer subscriber lagged, dropping oldest events");
                }
                Err(broadcast::error::RecvError::Closed) => return Err(ObserverError::Closed),
            }
        }
    }
}

/// Per-process registry of observer channels, one bounded broadcast channel
/// per [`EventKind`], created lazily on first publish or subscribe.
#[derive(Default)]
pub struct Observer {
    channels: DashMap<EventKind, broadcast::Sender<ObserverEvent>>,
    dropped: DashMap<EventKind, Arc<AtomicU64>>,
    capacity: usize,
}

impl Observer {
    /// Create an observer with the given per-kind channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            dropped: DashMap::new(),
            capacity,
        }
    }

    /// Create an observer with a 256-event-per-kind channel capacity.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(256)
    }

    fn sender_for(&self, kind: EventKind) -> broadcast::Sender<ObserverEvent> {
        self.channels
            .entry(kind)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Subscribe to events of the given kind. The returned handle can be
    /// held across `.await` points; it does not block publishers.
    pub fn subscribe(&self, kind: EventKind) -> ObserverHandle {
        let sender = self.sender_for(kind);
        let dropped = self
            .dropped
            .entry(kind)
            .or_insert_with(|| Arc::new(AtomicU64::new(0)))
            .clone();

        ObserverHandle {
            kind,
            receiver: sender.subscribe(),
            dropped,
        }
    }

    /// Publish an event. A no-op if nobody is currently subscribed to this
    /// kind (publishers never wait on subscribers).
    pub fn publish(&self, kind: EventKind, payload: Value) {
        let sender = self.sender_for(kind);
        // Err means there are currently no receivers; that is expected and
        // not a failure for a fire-and-forget publish.
        let _ = sender.send(ObserverEvent { kind, payload });
    }

    /// Number of events dropped for a given kind across all subscribers due
    /// to lag, since the observer was created.
    #[must_use]
    pub fn dropped_count(&self, kind: EventKind) -> u64 {
        self.dropped
            .get(&kind)
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_publish_subscribe_roundtrip() {
        let observer = Observer::with_defaults();
        let mut handle = observer.subscribe(EventKind::ProviderHealthChanged);

        observer.publish(EventKind::ProviderHealthChanged, json!({"provider": "azure-openai", "healthy": false}));

        let event = handle.recv().await.unwrap();
        assert_eq!(event.kind, EventKind::ProviderHealthChanged);
        assert_eq!(event.payload["provider"], "azure-openai");
    }

    #[tokio::test]
    async fn test_publish_with_no_subscribers_does_not_panic() {
        let observer = Observer::with_defaults();
        observer.publish(EventKind::CacheEvent, json!({"op": "evict"}));
    }

    #[tokio::test]
    async fn test_lag_increments_dropped_counter() {
        let observer = Observer::new(2);
        let mut handle = observer.subscribe(EventKind::CacheEvent);

        for i in 0..5 {
            observer.publish(EventKind::CacheEvent, json!({"seq": i}));
        }

        // The handle lagged behind the 5 publishes against a capacity-2
        // channel; the first recv surfaces the lag before catching up.
        let event = handle.recv().await.unwrap();
        assert!(observer.dropped_count(EventKind::CacheEvent) > 0);
        assert_eq!(event.kind, EventKind::CacheEvent);
    }

    #[tokio::test]
    async fn test_different_kinds_are_independent() {
        let observer = Observer::with_defaults();
        let mut health_handle = observer.subscribe(EventKind::ProviderHealthChanged);

        observer.publish(EventKind::CacheEvent, json!({"op": "hit"}));
        observer.publish(EventKind::ProviderHealthChanged, json!({"healthy": true}));

        let event = health_handle.recv().await.unwrap();
        assert_eq!(event.kind, EventKind::ProviderHealthChanged);
    }
}
