//! # Gateway Core
//!
//! Core types, traits, and error handling for the LLM Inference Gateway.
//!
//! This crate provides the foundational types used throughout the gateway:
//! - Request and response types
//! - Provider traits and abstractions
//! - Error types and handling
//! - Validated domain types (newtypes)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod clock;
pub mod error;
pub mod principal;
pub mod provider;
pub mod request;
pub mod response;
pub mod streaming;
pub mod types;

// Re-export commonly used types
pub use clock::{Clock, IdGenerator, SystemClock, UuidGenerator};
pub use error::{ErrorBody, ErrorEnvelope, GatewayError, GatewayResult};
pub use principal::{has_permission, Principal};
pub use provider::{
    HealthStatus, LLMProvider, ModelDescriptor, ModelInfo, ProviderCapabilities, ProviderType,
};
pub use request::{
    ChatMessage, ContentPart, FunctionCall, GatewayRequest, MessageContent, MessageRole,
    RequestMetadata, ToolCall, ToolChoice,
};
pub use response::{Choice, FinishReason, GatewayResponse, ModelObject, ModelsResponse, Usage};
pub use streaming::{ChatChunk, ChunkChoice, ChunkDelta, StreamFrame};
pub use types::{
    mask_secret, ApiKey, MaxTokens, ModelId, ProviderId, RequestId, Temperature, TenantId, TopK,
    TopP,
};
