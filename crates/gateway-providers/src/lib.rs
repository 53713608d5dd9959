//! # Gateway Providers
//!
//! Backend adapters and the model catalog for the Inference Gateway.
//!
//! - Azure OpenAI, AWS Bedrock, Google AI (Gemini) -- remote HTTP/cloud-SDK
//!   adapters, each implementing `gateway_core::LLMProvider`.
//! - `local` -- in-process model runtime adapter (GGUF/ONNX-style), no HTTP
//!   client.
//! - `registry` -- the Model Registry: catalog, lifecycle, and `max_models`
//!   LRU eviction across every registered adapter.
//! - `template` -- the chat-template engine used to render a model family's
//!   prompt format from a `GatewayRequest`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod azure;
pub mod bedrock;
pub mod google;
pub mod local;
pub mod registry;
pub mod template;

pub use azure::{AzureOpenAIConfig, AzureOpenAIProvider};
pub use bedrock::{BedrockConfig, BedrockProvider};
pub use google::{GoogleConfig, GoogleProvider};
pub use local::{EchoRuntime, GeneratedText, LocalConfig, LocalProvider, LocalRuntime};
pub use registry::{
    Capability, FileRegistryStore, InMemoryRegistryStore, ManagedModel, ModelFilter,
    ModelLifecycle, ModelRegistration, ProviderEntry, ProviderRegistry, RegistryError,
    RegistryEvent, RegistryStore,
};
pub use template::{ChatTemplate, ChatTemplateFamily, TemplateError, TemplateRegistry};
