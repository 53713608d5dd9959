//! Per-request execution context (§5 Concurrency & Resource Model).
//!
//! Cancellation is cooperative: a `watch<bool>` is the existing convention
//! (`gateway_resilience::RateLimiter::wait` already takes one), so the
//! pipeline reuses the same shape instead of introducing a second
//! cancellation primitive.

use gateway_core::principal::Principal;
use std::time::Instant;
use tokio::sync::watch;

/// Everything one in-flight request carries through the eleven stages.
pub struct RequestContext {
    /// Gateway-assigned request id, injected at stage 1 if the caller did
    /// not supply one.
    pub request_id: String,
    /// The authenticated caller.
    pub principal: Principal,
    /// When this request was admitted to the pipeline.
    pub started_at: Instant,
    /// How many fallback candidates have been tried so far.
    pub fallback_depth: u32,
    cancel_tx: watch::Sender<bool>,
    cancel_rx: watch::Receiver<bool>,
}

impl RequestContext {
    /// Start a new context for `principal`, with a fresh cancellation
    /// channel in the not-cancelled state.
    #[must_use]
    pub fn new(request_id: impl Into<String>, principal: Principal) -> Self {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        Self {
            request_id: request_id.into(),
            principal,
            started_at: Instant::now(),
            fallback_depth: 0,
            cancel_tx,
            cancel_rx,
        }
    }

    /// A receiver other components (the rate limiter, the provider call)
    /// can poll or await for cancellation.
    #[must_use]
    pub fn cancellation(&self) -> watch::Receiver<bool> {
        self.cancel_rx.clone()
    }

    /// Signal cancellation to every holder of a [`Self::cancellation`]
    /// receiver.
    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }

    /// Whether cancellation has been signalled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.cancel_rx.borrow()
    }

    /// Elapsed wall-clock time since this context was created.
    #[must_use]
    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_observed() {
        let ctx = RequestContext::new("req-1", Principal::new("user-1", "tenant-1"));
        let rx = ctx.cancellation();
        assert!(!*rx.borrow());
        ctx.cancel();
        assert!(ctx.is_cancelled());
        assert!(*rx.borrow());
    }
}
