//! The eleven-stage request pipeline (§4.I): validate, admit, quota, A/B
//! assignment, pre-middleware, cache probe, route, execute (circuit breaker
//! + retry + fallback), post-middleware, publish, return.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::BoxStream;
use futures::StreamExt;
use gateway_core::principal::Principal;
use gateway_core::provider::LLMProvider;
use gateway_core::response::{FinishReason, Usage};
use gateway_core::streaming::StreamFrame;
use gateway_core::types::RequestId;
use gateway_core::{GatewayError, GatewayRequest, GatewayResponse};
use gateway_providers::ProviderRegistry;
use gateway_resilience::{
    CircuitBreaker, DistributedCache, JoinOutcome, RateLimiter, Role, SingleFlightGroup,
};
use gateway_routing::{CapabilityDemand, CapabilityFlag, RouteRequest, Router, RoutingStrategy};
use gateway_telemetry::{Metrics, RequestMetrics, RequestOutcome, RequestTracker};
use gateway_tenancy::{ExperimentRegistry, QuotaRegistry, SlaEvaluator};
use tokio::sync::watch;
use tracing::warn;

use crate::candidate_source::RegistryCandidateSource;
use crate::config::PipelineConfig;
use crate::context::RequestContext;
use crate::middleware::{MiddlewareChain, PreOutcome};

/// Everything the pipeline needs to execute one request, wired together at
/// startup by the server crate.
pub struct Pipeline {
    router: Arc<Router<RegistryCandidateSource>>,
    candidate_source: Arc<RegistryCandidateSource>,
    registry: Arc<ProviderRegistry>,
    cache: Arc<DistributedCache>,
    rate_limiter: Arc<RateLimiter>,
    single_flight: Arc<SingleFlightGroup<String, GatewayResponse>>,
    quotas: Arc<QuotaRegistry>,
    experiments: Arc<ExperimentRegistry>,
    request_tracker: Arc<RequestTracker>,
    metrics: Arc<Metrics>,
    middleware: Arc<MiddlewareChain>,
    sla: Arc<SlaEvaluator>,
    config: PipelineConfig,
}

fn parse_strategy_hint(hint: &str) -> Option<RoutingStrategy> {
    let normalized = format!("\"{hint}\"");
    serde_json::from_str(&normalized).ok()
}

impl Pipeline {
    /// Wire a pipeline from its dependencies. Constructing these is the
    /// server crate's job (`gateway-server::state`).
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        router: Arc<Router<RegistryCandidateSource>>,
        candidate_source: Arc<RegistryCandidateSource>,
        registry: Arc<ProviderRegistry>,
        cache: Arc<DistributedCache>,
        rate_limiter: Arc<RateLimiter>,
        quotas: Arc<QuotaRegistry>,
        experiments: Arc<ExperimentRegistry>,
        request_tracker: Arc<RequestTracker>,
        metrics: Arc<Metrics>,
        middleware: Arc<MiddlewareChain>,
        sla: Arc<SlaEvaluator>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            router,
            candidate_source,
            registry,
            cache,
            rate_limiter,
            single_flight: Arc::new(SingleFlightGroup::new()),
            quotas,
            experiments,
            request_tracker,
            metrics,
            middleware,
            sla,
            config,
        }
    }

    /// Run a non-streaming request through every stage, returning the final
    /// response or the error that aborted it.
    pub async fn execute(&self, principal: &Principal, mut request: GatewayRequest) -> Result<GatewayResponse, GatewayError> {
        // Stage 1: validate/normalize, inject request id.
        if request.id.as_str().is_empty() {
            request.id = RequestId::generate();
        }
        let ctx = RequestContext::new(request.id.as_str().to_string(), principal.clone());
        let tenant_id = principal.tenant_id.clone();

        self.request_tracker
            .start(ctx.request_id.clone(), request.model.clone(), Some(tenant_id.clone()));

        let outcome = self.execute_inner(&ctx, &tenant_id, request).await;

        let request_outcome = match &outcome {
            Ok(_) => RequestOutcome::Success,
            Err(err) if matches!(err, GatewayError::Cancelled) => RequestOutcome::Cancelled,
            Err(err) if matches!(err, GatewayError::QuotaExceeded { .. } | GatewayError::RateLimit { .. }) => {
                RequestOutcome::Rejected
            }
            Err(_) => RequestOutcome::Error,
        };
        if let Some(finished) = self.request_tracker.finish(&ctx.request_id, request_outcome) {
            if self.metrics.is_enabled() {
                self.metrics.record_request(
                    &RequestMetrics::new(
                        finished.info.provider.clone().unwrap_or_else(|| "unknown".to_string()),
                        finished.info.model.clone(),
                        request_outcome.as_label(),
                        finished.duration,
                    ),
                );
            }
            let latency_ms = finished.duration.as_secs_f64() * 1000.0;
            let error = if matches!(request_outcome, RequestOutcome::Success) { 0.0 } else { 1.0 };
            self.record_sla(&tenant_id, latency_ms, error);
        }
        outcome
    }

    /// Feed a completed request's latency and error indicator into the SLA
    /// evaluator, both under the tenant's own scope and under `"global"` so
    /// tenant-specific and fleet-wide SLAs can both observe the same series.
    fn record_sla(&self, tenant_id: &str, latency_ms: f64, error: f64) {
        self.sla.record(tenant_id, "latency_ms", latency_ms);
        self.sla.record(tenant_id, "error_rate", error);
        self.sla.record("global", "latency_ms", latency_ms);
        self.sla.record("global", "error_rate", error);
    }

    /// Run a streaming request through admission, quota, A/B, pre-middleware
    /// and routing, then hand back a frame stream the caller drives to
    /// completion. Unlike [`Self::execute`], streaming responses never
    /// consult or populate the cache (§4.I stage 6 is cache-probe "for
    /// non-streaming requests only") and never join a single-flight group --
    /// every call is a fresh upstream invocation.
    ///
    /// `cancel` is the caller's cancellation signal (closed HTTP connection,
    /// client abort). When it fires mid-stream, the upstream provider
    /// stream is dropped -- closing its connection per
    /// [`gateway_core::provider::LLMProvider::chat_completion_stream`]'s
    /// contract -- and the returned stream yields one terminal frame with
    /// `finish_reason: Cancelled` and whatever partial usage the upstream
    /// had reported so far. No cache write happens for a cancelled stream.
    pub async fn execute_stream(
        &self,
        principal: &Principal,
        mut request: GatewayRequest,
        cancel: watch::Receiver<bool>,
    ) -> Result<BoxStream<'static, StreamFrame>, GatewayError> {
        if request.id.as_str().is_empty() {
            request.id = RequestId::generate();
        }
        request.stream = true;
        let ctx = RequestContext::new(request.id.as_str().to_string(), principal.clone());
        let tenant_id = principal.tenant_id.clone();

        self.request_tracker
            .start(ctx.request_id.clone(), request.model.clone(), Some(tenant_id.clone()));

        if let Err(err) = self.admit_stream_request(&tenant_id, &ctx, &mut request) {
            self.request_tracker.finish(&ctx.request_id, RequestOutcome::Rejected);
            return Err(err);
        }

        let request = match self.middleware.run_pre(&ctx, request).await {
            Ok(PreOutcome::Continue(r)) => r,
            Ok(PreOutcome::ShortCircuit(response)) => {
                self.request_tracker.finish(&ctx.request_id, RequestOutcome::Success);
                return Ok(single_frame_stream(response));
            }
            Err(err) => {
                self.request_tracker.finish(&ctx.request_id, RequestOutcome::Error);
                return Err(err);
            }
        };

        let strategy_hint = request
            .metadata
            .as_ref()
            .and_then(|m| m.strategy_hint.as_deref())
            .and_then(parse_strategy_hint);
        let route_request = RouteRequest {
            tenant_id: ctx.principal.tenant_id.clone(),
            model_hint: Some(request.model.clone()),
            strategy_hint: strategy_hint.or(Some(self.config.default_strategy)),
            capability_demand: CapabilityDemand::none().require(CapabilityFlag::Streaming),
        };

        let decision = match self.router.route(principal, &route_request).await {
            Ok(decision) => decision,
            Err(err) => {
                self.request_tracker.finish(&ctx.request_id, RequestOutcome::Error);
                return Err(err);
            }
        };

        let mut last_error: Option<GatewayError> = None;
        for model_id in &decision {
            let Some(descriptor) = self.registry.get(model_id.as_str()) else {
                continue;
            };
            let Some(provider) = self.registry.get_provider(&descriptor.provider_id) else {
                continue;
            };
            let circuit = self.candidate_source.signals().circuit(model_id.as_str());
            if circuit.check().is_err() {
                continue;
            }

            self.candidate_source.signals().begin(model_id.as_str());
            let started = Instant::now();
            match provider.chat_completion_stream(&request).await {
                Ok(upstream) => {
                    circuit.record_success();
                    return Ok(wrap_upstream_stream(
                        upstream,
                        cancel,
                        model_id.as_str().to_string(),
                        self.candidate_source.signals(),
                        self.request_tracker.clone(),
                        self.metrics.clone(),
                        self.sla.clone(),
                        ctx.request_id.clone(),
                        tenant_id.clone(),
                        started,
                    ));
                }
                Err(err) => {
                    circuit.record_failure();
                    self.candidate_source
                        .signals()
                        .finish(model_id.as_str(), started.elapsed().as_secs_f64() * 1000.0, false);
                    if !err.allows_fallback() {
                        self.request_tracker.finish(&ctx.request_id, RequestOutcome::Error);
                        return Err(err);
                    }
                    last_error = Some(err);
                }
            }
        }

        self.request_tracker.finish(&ctx.request_id, RequestOutcome::Error);
        Err(last_error.unwrap_or_else(|| GatewayError::not_found("no routable candidate for this request")))
    }

    /// Stages 2-4 for a streaming request: admission rate limit, quota, and
    /// A/B model-hint assignment. Shared in spirit with `execute_inner`'s
    /// stages 2-4, kept separate because the streaming path never owns a
    /// `&mut` borrow across an `.await` the way the cache/single-flight
    /// branch in `execute_inner` does.
    fn admit_stream_request(
        &self,
        tenant_id: &str,
        ctx: &RequestContext,
        request: &mut GatewayRequest,
    ) -> Result<(), GatewayError> {
        if !self.rate_limiter.try_admit("tenant", tenant_id, 1.0) {
            return Err(GatewayError::rate_limit(Some(Duration::from_secs(1)), None));
        }
        self.quotas.check_and_consume(tenant_id, "requests", 1)?;

        if let Some(experiment_id) = self.experiment_for_model(&request.model) {
            if let Some(variant) = self.experiments.assign(&experiment_id, &ctx.principal.user_id) {
                if let Some(variant_model) = variant.model_id.clone() {
                    request.model = variant_model;
                }
            }
        }
        Ok(())
    }

    async fn execute_inner(
        &self,
        ctx: &RequestContext,
        tenant_id: &str,
        mut request: GatewayRequest,
    ) -> Result<GatewayResponse, GatewayError> {
        // Stage 2: admission rate limiting, scoped by tenant.
        if !self.rate_limiter.try_admit("tenant", tenant_id, 1.0) {
            return Err(GatewayError::rate_limit(Some(Duration::from_secs(1)), None));
        }

        // Stage 3: quota.
        self.quotas.check_and_consume(tenant_id, "requests", 1)?;

        // Stage 4: A/B assignment, only when an active experiment controls
        // this request's model.
        let mut model_hint = request
            .metadata
            .as_ref()
            .and_then(|m| m.preferred_provider.clone());
        if let Some(experiment_id) = self.experiment_for_model(&request.model) {
            if let Some(variant) = self.experiments.assign(&experiment_id, &ctx.principal.user_id) {
                if let Some(variant_model) = variant.model_id.clone() {
                    model_hint = Some(variant_model);
                }
            }
        }

        // Stage 5: pre-middleware.
        match self.middleware.run_pre(ctx, request).await? {
            PreOutcome::ShortCircuit(response) => return Ok(response),
            PreOutcome::Continue(mutated) => request = mutated,
        }

        // Stage 6: cache probe (non-streaming only).
        let cache_key = format!("{}:{}", tenant_id, cache_fingerprint(&request));
        if !request.stream && self.cache.is_cacheable(&request) {
            if let Some(mut cached) = self.cache.get(&request).await {
                cached.cached = true;
                return self.run_post_and_return(ctx, cached).await;
            }

            match self.single_flight.enter(cache_key.clone()) {
                Role::Leader => {
                    return self.lead_cache_build(ctx, &request, model_hint, cache_key).await;
                }
                Role::Waiter(waiting) => {
                    return match self.single_flight.join(&cache_key, waiting).await {
                        JoinOutcome::Resolved(Ok(response)) => {
                            self.run_post_and_return(ctx, response).await
                        }
                        JoinOutcome::Resolved(Err(err)) => Err(GatewayError::internal(err.to_string())),
                        // The leader abandoned (e.g. cancelled) before
                        // resolving and handed leadership to this caller;
                        // build the value ourselves under the same contract.
                        JoinOutcome::Promoted => {
                            self.lead_cache_build(ctx, &request, model_hint, cache_key).await
                        }
                    };
                }
            }
        }

        // Stages 7-8: route and execute (no caching for this request).
        let response = self.route_and_execute(ctx, &request, model_hint).await?;
        self.run_post_and_return(ctx, response).await
    }

    /// Build the cache value as single-flight leader (original or promoted):
    /// race the build against the request's cancellation signal so a
    /// client disconnect abandons leadership -- promoting a queued waiter
    /// instead of leaving the key stuck pending forever -- rather than
    /// caching a response nobody is left to receive.
    async fn lead_cache_build(
        &self,
        ctx: &RequestContext,
        request: &GatewayRequest,
        model_hint: Option<String>,
        cache_key: String,
    ) -> Result<GatewayResponse, GatewayError> {
        let mut cancel = ctx.cancellation();
        if *cancel.borrow() {
            self.single_flight.abandon(cache_key);
            return Err(GatewayError::Cancelled);
        }

        let result = tokio::select! {
            biased;
            _ = cancel.changed() => {
                self.single_flight.abandon(cache_key);
                return Err(GatewayError::Cancelled);
            }
            result = self.route_and_execute(ctx, request, model_hint) => result,
        };

        match &result {
            Ok(response) => self.single_flight.resolve(cache_key.clone(), response.clone()),
            Err(err) => self.single_flight.resolve_err(cache_key.clone(), err.to_string()),
        }
        let response = result?;
        self.cache.put(request, response.clone()).await;
        self.run_post_and_return(ctx, response).await
    }

    async fn run_post_and_return(
        &self,
        ctx: &RequestContext,
        response: GatewayResponse,
    ) -> Result<GatewayResponse, GatewayError> {
        // Stage 9: post-middleware.
        let response = self.middleware.run_post(ctx, response).await?;
        // Stage 10 (publish) happens in `execute`'s caller via the request
        // tracker / metrics; per-model health signals are updated inside
        // `route_and_execute` as each attempt resolves, tolerating sink
        // failures by construction (none of these calls return errors that
        // propagate to the caller).
        Ok(response)
    }

    /// Whether `model` is the control model of an active experiment, and if
    /// so, that experiment's id. A request never carries an experiment id
    /// of its own (§3's `Experiment` entity is looked up by model, not
    /// requested directly), so this is the sole association point between
    /// an inbound request and the preloaded `experiments[]` config.
    fn experiment_for_model(&self, model: &str) -> Option<String> {
        self.experiments.find_by_control_model(model)
    }

    /// Stages 7 and 8: obtain the fallback chain and execute it through
    /// each candidate's circuit breaker, retrying per-candidate before
    /// advancing to the next fallback.
    async fn route_and_execute(
        &self,
        ctx: &RequestContext,
        request: &GatewayRequest,
        model_hint: Option<String>,
    ) -> Result<GatewayResponse, GatewayError> {
        let strategy_hint = request
            .metadata
            .as_ref()
            .and_then(|m| m.strategy_hint.as_deref())
            .and_then(parse_strategy_hint);

        let route_request = RouteRequest {
            tenant_id: ctx.principal.tenant_id.clone(),
            model_hint: model_hint.or_else(|| Some(request.model.clone())),
            strategy_hint: strategy_hint.or(Some(self.config.default_strategy)),
            capability_demand: CapabilityDemand::none(),
        };

        let decision = self.router.route(&ctx.principal, &route_request).await?;
        if decision.is_empty() {
            return Err(GatewayError::not_found("no routable candidate for this request"));
        }

        let mut last_error: Option<GatewayError> = None;
        let mut fallback_depth = 0u32;

        for model_id in &decision {
            let Some(descriptor) = self.registry.get(model_id.as_str()) else {
                continue;
            };
            let Some(provider) = self.registry.get_provider(&descriptor.provider_id) else {
                continue;
            };
            let circuit = self.candidate_source.signals().circuit(model_id.as_str());

            self.candidate_source.signals().begin(model_id.as_str());
            let attempt_result = self
                .call_with_retries(provider.as_ref(), &circuit, request, model_id.as_str())
                .await;

            match attempt_result {
                Ok(mut response) => {
                    response.fallback_depth = fallback_depth;
                    return Ok(response);
                }
                Err(err) => {
                    if !err.allows_fallback() {
                        return Err(err);
                    }
                    last_error = Some(err);
                    fallback_depth += 1;
                }
            }
        }

        Err(last_error.unwrap_or_else(|| GatewayError::not_found("no routable candidate for this request")))
    }

    /// Retry a single candidate up to `retries_per_model` times, with
    /// exponential backoff, stopping early on a non-retryable error.
    async fn call_with_retries(
        &self,
        provider: &dyn LLMProvider,
        circuit: &CircuitBreaker,
        request: &GatewayRequest,
        model_id: &str,
    ) -> Result<GatewayResponse, GatewayError> {
        for attempt in 0..=self.config.retries_per_model {
            if let Err(err) = circuit.check() {
                self.candidate_source.signals().finish(model_id, 0.0, false);
                return Err(err);
            }

            let start = Instant::now();
            match provider.chat_completion(request).await {
                Ok(response) => {
                    let elapsed = start.elapsed();
                    circuit.record_success();
                    self.candidate_source.signals().finish(model_id, elapsed.as_secs_f64() * 1000.0, true);
                    return Ok(response);
                }
                Err(err) => {
                    circuit.record_failure();
                    self.candidate_source.signals().finish(model_id, start.elapsed().as_secs_f64() * 1000.0, false);

                    if !err.is_retryable() || attempt == self.config.retries_per_model {
                        return Err(err);
                    }

                    let delay = backoff_delay(attempt, self.config.retry_base_delay, self.config.retry_max_delay);
                    warn!(model = model_id, attempt, error = %err, "retrying after provider error");
                    tokio::time::sleep(delay).await;
                }
            }
        }
        unreachable!("loop always returns before exhausting its range")
    }
}

fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let scaled = base.saturating_mul(2u32.saturating_pow(attempt));
    scaled.min(max)
}

/// Render a pre-middleware short-circuit response as a one-shot stream: a
/// single delta carrying the whole message, then the terminal frame.
fn single_frame_stream(response: GatewayResponse) -> BoxStream<'static, StreamFrame> {
    let stream = async_stream::stream! {
        let text = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .unwrap_or_default();
        if !text.is_empty() {
            yield StreamFrame::delta(text);
        }
        let finish_reason = response.finish_reason().unwrap_or(FinishReason::Stop);
        yield StreamFrame::terminal(response.usage, finish_reason);
    };
    Box::pin(stream)
}

/// Adapt a provider's [`gateway_core::streaming::ChatChunk`] stream into the
/// wire-facing [`StreamFrame`] sequence, forwarding cancellation into a
/// dropped upstream and feeding the outcome back into the signal tracker,
/// request tracker, and metrics the same way a non-streaming attempt does
/// at stage 10.
#[allow(clippy::too_many_arguments)]
fn wrap_upstream_stream(
    upstream: BoxStream<'static, Result<gateway_core::streaming::ChatChunk, GatewayError>>,
    mut cancel: watch::Receiver<bool>,
    model_id: String,
    signals: Arc<crate::candidate_source::ModelSignalTracker>,
    tracker: Arc<RequestTracker>,
    metrics: Arc<Metrics>,
    sla: Arc<SlaEvaluator>,
    request_id: String,
    tenant_id: String,
    started: Instant,
) -> BoxStream<'static, StreamFrame> {
    let stream = async_stream::stream! {
        let mut upstream = upstream;
        let mut usage = Usage::default();
        let mut finish_reason = FinishReason::Stop;
        let mut cancelled = false;
        let mut errored = false;

        loop {
            tokio::select! {
                biased;
                changed = cancel.changed() => {
                    if changed.is_ok() && *cancel.borrow() {
                        cancelled = true;
                        finish_reason = FinishReason::Cancelled;
                    }
                    break;
                }
                next = upstream.next() => {
                    match next {
                        Some(Ok(chunk)) => {
                            if let Some(chunk_usage) = chunk.usage {
                                usage = chunk_usage;
                            }
                            for choice in chunk.choices {
                                if let Some(text) = choice.delta.content {
                                    if !text.is_empty() {
                                        yield StreamFrame::delta(text);
                                    }
                                }
                                if let Some(reason) = choice.finish_reason {
                                    finish_reason = reason;
                                }
                            }
                        }
                        Some(Err(_)) => {
                            errored = true;
                            finish_reason = FinishReason::Error;
                            break;
                        }
                        None => break,
                    }
                }
            }
        }
        // Dropping `upstream` here (end of scope) closes the provider's
        // connection for the cancelled/errored/early-exit cases alike.
        drop(upstream);

        let success = !cancelled && !errored;
        signals.finish(&model_id, started.elapsed().as_secs_f64() * 1000.0, success);

        let outcome = if cancelled {
            RequestOutcome::Cancelled
        } else if errored {
            RequestOutcome::Error
        } else {
            RequestOutcome::Success
        };
        if let Some(finished) = tracker.finish(&request_id, outcome) {
            if metrics.is_enabled() {
                metrics.record_request(
                    &RequestMetrics::new(
                        finished.info.provider.clone().unwrap_or_else(|| "unknown".to_string()),
                        finished.info.model.clone(),
                        outcome.as_label(),
                        finished.duration,
                    )
                    .with_tokens(usage.prompt_tokens, usage.completion_tokens),
                );
            }
            let latency_ms = finished.duration.as_secs_f64() * 1000.0;
            let error = if matches!(outcome, RequestOutcome::Success) { 0.0 } else { 1.0 };
            sla.record(&tenant_id, "latency_ms", latency_ms);
            sla.record(&tenant_id, "error_rate", error);
            sla.record("global", "latency_ms", latency_ms);
            sla.record("global", "error_rate", error);
        }

        yield StreamFrame::terminal(usage, finish_reason);
    };
    Box::pin(stream)
}

/// A stable fingerprint for single-flight leadership, independent of the
/// full canonical cache key (the `DistributedCache` derives its own key
/// internally; this one only needs to be unique enough to avoid collapsing
/// unrelated requests into the same leader).
fn cache_fingerprint(request: &GatewayRequest) -> String {
    format!(
        "{}:{}:{:?}",
        request.model,
        request.messages.len(),
        request.temperature
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_delay_caps_at_max() {
        let base = Duration::from_millis(100);
        let max = Duration::from_secs(1);
        assert!(backoff_delay(10, base, max) <= max);
        assert_eq!(backoff_delay(0, base, max), base);
    }

    #[test]
    fn test_parse_strategy_hint() {
        assert_eq!(parse_strategy_hint("quality-first"), Some(RoutingStrategy::QualityFirst));
        assert_eq!(parse_strategy_hint("not-a-strategy"), None);
    }
}
