//! # Gateway Telemetry
//!
//! Observability and telemetry for the LLM Inference Gateway.
//!
//! This crate provides:
//! - Prometheus metrics for monitoring
//! - Distributed tracing with OpenTelemetry
//! - Structured logging
//! - Request/response tracking
//! - Cost tracking and per-tenant budgets
//! - Audit logging for compliance and security events
//! - PII detection and redaction
//! - Typed, per-kind observer channels for component-to-component events

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod audit;
pub mod cost;
pub mod metrics;
pub mod observer;
pub mod pii;
pub mod tracing_setup;
pub mod logging;
pub mod request_tracker;

// Re-export main types
pub use audit::{
    AuditActor, AuditEvent, AuditEventBuilder, AuditEventType, AuditLogConfig, AuditLogger,
    AuditOutcome, AuditResource, AuditSeverity, AuditStats,
};
pub use cost::{
    Budget, BudgetStatus, CostConfig, CostReport, CostTracker, ModelPricing, UsageEvent,
    UsageStats,
};
pub use metrics::{Metrics, MetricsConfig, RequestMetrics};
pub use observer::{EventKind, Observer, ObserverEvent, ObserverHandle};
pub use pii::{
    CustomPattern, PiiAnalysis, PiiConfig, PiiPattern, PiiPatternConfig, PiiRedactor,
    RedactPii, RedactionStyle,
};
pub use tracing_setup::{TracingConfig, init_tracing, shutdown_tracing};
pub use logging::{LoggingConfig, init_logging};
pub use request_tracker::{RequestTracker, RequestInfo, RequestOutcome};
