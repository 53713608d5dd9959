//! Prometheus metrics for request volume, latency, and provider health.

use prometheus::{
    Encoder, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;
use tracing::warn;

/// Metrics configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Enable metrics collection.
    pub enabled: bool,
    /// Namespace prefix for all metric names (e.g. "gateway").
    pub namespace: String,
    /// Histogram buckets for request latency, in seconds.
    pub latency_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            namespace: "gateway".to_string(),
            latency_buckets: vec![
                0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
            ],
        }
    }
}

impl MetricsConfig {
    /// Create a configuration with the given namespace.
    #[must_use]
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..Default::default()
        }
    }
}

/// Metrics error.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// A collector could not be registered (e.g. duplicate metric name).
    #[error("failed to register metric: {0}")]
    Registration(String),
    /// The text encoder failed to serialize the metric families.
    #[error("failed to encode metrics: {0}")]
    Encode(String),
}

/// Per-request metrics recorded at the end of a gateway request, independent
/// of which provider served it.
#[derive(Debug, Clone)]
pub struct RequestMetrics {
    /// Provider that served (or attempted to serve) the request.
    pub provider: String,
    /// Model id requested.
    pub model: String,
    /// HTTP-style status class recorded on the request counter ("success",
    /// "error", "rate_limited", "circuit_open").
    pub outcome: String,
    /// Wall-clock request duration.
    pub duration: Duration,
    /// Prompt tokens consumed, if known.
    pub prompt_tokens: Option<u32>,
    /// Completion tokens produced, if known.
    pub completion_tokens: Option<u32>,
    /// Whether the response was served from cache.
    pub cached: bool,
}

impl RequestMetrics {
    /// Create a new request metrics record.
    #[must_use]
    pub fn new(provider: impl Into<String>, model: impl Into<String>, outcome: impl Into<String>, duration: Duration) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            outcome: outcome.into(),
            duration,
            prompt_tokens: None,
            completion_tokens: None,
            cached: false,
        }
    }

    /// Attach token usage.
    #[must_use]
    pub fn with_tokens(mut self, prompt: u32, completion: u32) -> Self {
        self.prompt_tokens = Some(prompt);
        self.completion_tokens = Some(completion);
        self
    }

    /// Mark the response as cache-served.
    #[must_use]
    pub fn with_cached(mut self, cached: bool) -> Self {
        self.cached = cached;
        self
    }
}

/// Process-wide Prometheus metrics registry and collector set.
///
/// One `Metrics` instance is constructed at startup and shared (behind an
/// `Arc`) across the request-handling and pipeline stages; every collector
/// it owns is pre-registered so `/metrics` scrapes never race collector
/// creation.
pub struct Metrics {
    config: MetricsConfig,
    registry: Registry,
    requests_total: IntCounterVec,
    request_duration_seconds: HistogramVec,
    tokens_total: IntCounterVec,
    in_flight: IntGaugeVec,
    circuit_breaker_state: IntGaugeVec,
    cache_hits_total: IntCounterVec,
    metrics_dropped_total: prometheus::IntCounter,
}

impl Metrics {
    /// Build a new metrics set and register every collector with a fresh
    /// registry.
    ///
    /// # Errors
    /// Returns an error if a collector fails to register (e.g. duplicate
    /// metric names within the same registry).
    pub fn new(config: MetricsConfig) -> Result<Self, MetricsError> {
        let registry = Registry::new();
        let ns = config.namespace.as_str();

        let requests_total = IntCounterVec::new(
            Opts::new("requests_total", "Total gateway requests by provider, model, and outcome").namespace(ns),
            &["provider", "model", "outcome"],
        )
        .map_err(|e| MetricsError::Registration(e.to_string()))?;

        let request_duration_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "request_duration_seconds",
                "Request latency in seconds by provider and model",
            )
            .namespace(ns)
            .buckets(config.latency_buckets.clone()),
            &["provider", "model"],
        )
        .map_err(|e| MetricsError::Registration(e.to_string()))?;

        let tokens_total = IntCounterVec::new(
            Opts::new("tokens_total", "Total tokens consumed by provider, model, and kind (prompt/completion)").namespace(ns),
            &["provider", "model", "kind"],
        )
        .map_err(|e| MetricsError::Registration(e.to_string()))?;

        let in_flight = IntGaugeVec::new(
            Opts::new("requests_in_flight", "Currently in-flight requests by provider").namespace(ns),
            &["provider"],
        )
        .map_err(|e| MetricsError::Registration(e.to_string()))?;

        let circuit_breaker_state = IntGaugeVec::new(
            Opts::new("circuit_breaker_state", "Circuit breaker state by provider (0=closed, 1=half_open, 2=open)").namespace(ns),
            &["provider"],
        )
        .map_err(|e| MetricsError::Registration(e.to_string()))?;

        let cache_hits_total = IntCounterVec::new(
            Opts::new("cache_hits_total", "Cache hits and misses by outcome").namespace(ns),
            &["outcome"],
        )
        .map_err(|e| MetricsError::Registration(e.to_string()))?;

        let metrics_dropped_total = prometheus::IntCounter::with_opts(
            Opts::new("metrics_dropped_total", "Metric updates dropped because the sink channel was full").namespace(ns),
        )
        .map_err(|e| MetricsError::Registration(e.to_string()))?;

        registry
            .register(Box::new(requests_total.clone()))
            .map_err(|e| MetricsError::Registration(e.to_string()))?;
        registry
            .register(Box::new(request_duration_seconds.clone()))
            .map_err(|e| MetricsError::Registration(e.to_string()))?;
        registry
            .register(Box::new(tokens_total.clone()))
            .map_err(|e| MetricsError::Registration(e.to_string()))?;
        registry
            .register(Box::new(in_flight.clone()))
            .map_err(|e| MetricsError::Registration(e.to_string()))?;
        registry
            .register(Box::new(circuit_breaker_state.clone()))
            .map_err(|e| MetricsError::Registration(e.to_string()))?;
        registry
            .register(Box::new(cache_hits_total.clone()))
            .map_err(|e| MetricsError::Registration(e.to_string()))?;
        registry
            .register(Box::new(metrics_dropped_total.clone()))
            .map_err(|e| MetricsError::Registration(e.to_string()))?;

        Ok(Self {
            config,
            registry,
            requests_total,
            request_duration_seconds,
            tokens_total,
            in_flight,
            circuit_breaker_state,
            cache_hits_total,
            metrics_dropped_total,
        })
    }

    /// Build with default configuration.
    ///
    /// # Errors
    /// Returns an error under the same conditions as [`Metrics::new`].
    pub fn with_defaults() -> Result<Self, MetricsError> {
        Self::new(MetricsConfig::default())
    }

    /// Whether metrics collection is enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Record a completed request.
    pub fn record_request(&self, metrics: &RequestMetrics) {
        if !self.config.enabled {
            return;
        }

        self.requests_total
            .with_label_values(&[&metrics.provider, &metrics.model, &metrics.outcome])
            .inc();

        self.request_duration_seconds
            .with_label_values(&[&metrics.provider, &metrics.model])
            .observe(metrics.duration.as_secs_f64());

        if let Some(prompt) = metrics.prompt_tokens {
            self.tokens_total
                .with_label_values(&[&metrics.provider, &metrics.model, "prompt"])
                .inc_by(u64::from(prompt));
        }
        if let Some(completion) = metrics.completion_tokens {
            self.tokens_total
                .with_label_values(&[&metrics.provider, &metrics.model, "completion"])
                .inc_by(u64::from(completion));
        }

        self.cache_hits_total
            .with_label_values(&[if metrics.cached { "hit" } else { "miss" }])
            .inc();
    }

    /// Mark a request as starting, incrementing the in-flight gauge for the
    /// given provider. Pair with [`Metrics::request_ended`].
    pub fn request_started(&self, provider: &str) {
        if self.config.enabled {
            self.in_flight.with_label_values(&[provider]).inc();
        }
    }

    /// Mark a request as finished, decrementing the in-flight gauge.
    pub fn request_ended(&self, provider: &str) {
        if self.config.enabled {
            self.in_flight.with_label_values(&[provider]).dec();
        }
    }

    /// Record a circuit breaker state transition (0=closed, 1=half_open, 2=open).
    pub fn set_circuit_breaker_state(&self, provider: &str, state: i64) {
        if self.config.enabled {
            self.circuit_breaker_state
                .with_label_values(&[provider])
                .set(state);
        }
    }

    /// Increment the dropped-metrics counter, used when a bounded metrics
    /// sink channel is full and a write is discarded rather than blocking
    /// the request path.
    pub fn record_dropped(&self) {
        self.metrics_dropped_total.inc();
    }

    /// Render all registered metrics in the Prometheus text exposition
    /// format, for the `/metrics` endpoint.
    ///
    /// # Errors
    /// Returns an error if the text encoder fails to serialize a metric
    /// family.
    pub fn render(&self) -> Result<String, MetricsError> {
        let families = self.registry.gather();
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&families, &mut buf)
            .map_err(|e| MetricsError::Encode(e.to_string()))?;
        String::from_utf8(buf).map_err(|e| {
            warn!(error = %e, "metrics encoder produced invalid utf-8");
            MetricsError::Encode(e.to_string())
        })
    }

    /// Access the underlying registry, e.g. to register additional
    /// process-level collectors.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_request() {
        let metrics = Metrics::with_defaults().unwrap();
        let record = RequestMetrics::new("azure-openai", "gpt-4o", "success", Duration::from_millis(250))
            .with_tokens(100, 50)
            .with_cached(false);

        metrics.record_request(&record);

        let rendered = metrics.render().unwrap();
        assert!(rendered.contains("gateway_requests_total"));
        assert!(rendered.contains("gateway_tokens_total"));
    }

    #[test]
    fn test_in_flight_tracking() {
        let metrics = Metrics::with_defaults().unwrap();
        metrics.request_started("azure-openai");
        metrics.request_started("azure-openai");
        metrics.request_ended("azure-openai");

        let rendered = metrics.render().unwrap();
        assert!(rendered.contains("gateway_requests_in_flight"));
    }

    #[test]
    fn test_dropped_counter() {
        let metrics = Metrics::with_defaults().unwrap();
        metrics.record_dropped();
        metrics.record_dropped();
        let rendered = metrics.render().unwrap();
        assert!(rendered.contains("gateway_metrics_dropped_total 2"));
    }

    #[test]
    fn test_disabled_metrics_are_no_ops() {
        let metrics = Metrics::new(MetricsConfig {
            enabled: false,
            ..Default::default()
        })
        .unwrap();

        let record = RequestMetrics::new("azure-openai", "gpt-4o", "success", Duration::from_millis(10));
        metrics.record_request(&record);

        let rendered = metrics.render().unwrap();
        assert!(!rendered.contains("azure-openai"));
    }
}
