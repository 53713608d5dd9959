//! The pre/post middleware chain (§4.I stages 5 and 9): ordered
//! user-registered hooks that may mutate the request or response, or
//! short-circuit the pipeline entirely with a response.

use crate::context::RequestContext;
use async_trait::async_trait;
use gateway_core::{GatewayError, GatewayRequest, GatewayResponse};

/// What a pre-request hook decided.
pub enum PreOutcome {
    /// Continue the pipeline with (possibly mutated) `request`.
    Continue(GatewayRequest),
    /// Skip routing and execution entirely, returning `response` directly.
    ShortCircuit(GatewayResponse),
}

/// One middleware hook, run before routing and after execution.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// A name for logging and error attribution.
    fn name(&self) -> &str;

    /// Inspect or transform the inbound request. The default passes it
    /// through unchanged.
    async fn pre(&self, _ctx: &RequestContext, request: GatewayRequest) -> Result<PreOutcome, GatewayError> {
        Ok(PreOutcome::Continue(request))
    }

    /// Inspect or transform the outbound response. The default passes it
    /// through unchanged.
    async fn post(
        &self,
        _ctx: &RequestContext,
        response: GatewayResponse,
    ) -> Result<GatewayResponse, GatewayError> {
        Ok(response)
    }
}

/// An ordered chain of middleware, run in registration order for `pre` and
/// the same order for `post` (§4.I does not require reversal; post hooks
/// observe the response other post hooks have already transformed).
#[derive(Default)]
pub struct MiddlewareChain {
    hooks: Vec<std::sync::Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    /// An empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    /// Append a hook to the end of the chain.
    pub fn register(&mut self, hook: std::sync::Arc<dyn Middleware>) {
        self.hooks.push(hook);
    }

    /// Run every `pre` hook in order. Stops and returns early on the first
    /// short-circuit or error.
    pub async fn run_pre(
        &self,
        ctx: &RequestContext,
        mut request: GatewayRequest,
    ) -> Result<PreOutcome, GatewayError> {
        for hook in &self.hooks {
            match hook.pre(ctx, request).await? {
                PreOutcome::Continue(next) => request = next,
                short @ PreOutcome::ShortCircuit(_) => return Ok(short),
            }
        }
        Ok(PreOutcome::Continue(request))
    }

    /// Run every `post` hook in order, each seeing the prior hook's output.
    pub async fn run_post(
        &self,
        ctx: &RequestContext,
        mut response: GatewayResponse,
    ) -> Result<GatewayResponse, GatewayError> {
        for hook in &self.hooks {
            response = hook.post(ctx, response).await?;
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_core::principal::Principal;
    use gateway_core::request::ChatMessage;

    struct Tagger;

    #[async_trait]
    impl Middleware for Tagger {
        fn name(&self) -> &str {
            "tagger"
        }

        async fn pre(&self, _ctx: &RequestContext, mut request: GatewayRequest) -> Result<PreOutcome, GatewayError> {
            request.user = Some("tagged".to_string());
            Ok(PreOutcome::Continue(request))
        }
    }

    fn sample_request() -> GatewayRequest {
        GatewayRequest::builder()
            .model("gpt-4o")
            .message(ChatMessage::user("hi"))
            .build()
            .expect("valid request")
    }

    #[tokio::test]
    async fn test_pre_hook_mutates_request() {
        let mut chain = MiddlewareChain::new();
        chain.register(std::sync::Arc::new(Tagger));
        let ctx = RequestContext::new("req-1", Principal::new("u", "t"));
        let outcome = chain.run_pre(&ctx, sample_request()).await.unwrap();
        match outcome {
            PreOutcome::Continue(req) => assert_eq!(req.user.as_deref(), Some("tagged")),
            PreOutcome::ShortCircuit(_) => panic!("expected continue"),
        }
    }
}
