//! The request execution pipeline: wires together routing, resilience, and
//! tenancy primitives into the eleven ordered stages a gateway request
//! passes through from admission to response.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod candidate_source;
pub mod config;
pub mod context;
pub mod middleware;
pub mod pipeline;

pub use candidate_source::{ModelSignalTracker, RegistryCandidateSource};
pub use config::PipelineConfig;
pub use context::RequestContext;
pub use middleware::{Middleware, MiddlewareChain, PreOutcome};
pub use pipeline::Pipeline;
