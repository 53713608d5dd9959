//! Provider adapter contract (§4.E).
//!
//! Every backend family -- local model runtime or remote HTTP/cloud-SDK
//! provider -- implements [`LLMProvider`]. The trait is the seam the rest of
//! the gateway depends on instead of any concrete provider crate (Design
//! Note: interface seams instead of cyclic imports).

use crate::error::GatewayError;
use crate::request::GatewayRequest;
use crate::response::GatewayResponse;
use crate::streaming::ChatChunk;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

/// Which family of backend an adapter talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    /// OpenAI and OpenAI-compatible HTTP APIs.
    OpenAI,
    /// Anthropic's Claude API.
    Anthropic,
    /// Google AI / Vertex AI (Gemini).
    Google,
    /// Azure OpenAI Service.
    Azure,
    /// AWS Bedrock.
    Bedrock,
    /// A model loaded and served in-process (GGUF/ONNX/etc. runners behind
    /// the adapter boundary).
    Local,
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::OpenAI => "openai",
            Self::Anthropic => "anthropic",
            Self::Google => "google",
            Self::Azure => "azure",
            Self::Bedrock => "bedrock",
            Self::Local => "local",
        };
        write!(f, "{s}")
    }
}

/// Health of a provider or model as last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Serving normally.
    Healthy,
    /// Serving, but degraded (elevated latency/errors, or explicitly
    /// demoted by the registry).
    Degraded,
    /// Not serving.
    Unhealthy,
}

impl HealthStatus {
    /// Whether this status still permits routing traffic to the model.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        !matches!(self, Self::Unhealthy)
    }
}

/// Capability flags and limits a provider declares.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCapabilities {
    /// Supports chat-style completion.
    pub chat: bool,
    /// Supports streaming responses.
    pub streaming: bool,
    /// Supports tool/function calling.
    pub function_calling: bool,
    /// Accepts image content parts.
    pub vision: bool,
    /// Supports embeddings generation.
    pub embeddings: bool,
    /// Supports a structured JSON response format.
    pub json_mode: bool,
    /// Supports a deterministic seed parameter.
    pub seed: bool,
    /// Returns token log-probabilities.
    pub logprobs: bool,
    /// Maximum input context length in tokens, if bounded.
    pub max_context_length: Option<u32>,
    /// Maximum output tokens per request, if bounded.
    pub max_output_tokens: Option<u32>,
    /// Supports multiple concurrent tool calls per turn.
    pub parallel_tool_calls: bool,
}

impl Default for ProviderCapabilities {
    fn default() -> Self {
        Self {
            chat: true,
            streaming: false,
            function_calling: false,
            vision: false,
            embeddings: false,
            json_mode: false,
            seed: false,
            logprobs: false,
            max_context_length: None,
            max_output_tokens: None,
            parallel_tool_calls: false,
        }
    }
}

/// Descriptor for a model, as declared by a provider or recorded by the
/// registry. Pricing is standardized on **per-1M-tokens** (§9 Open
/// Question): adapters declare their own native billing unit only at the
/// HTTP boundary and convert to per-million before this struct is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Canonical model id as the provider names it (e.g. `"gpt-4"`,
    /// a Bedrock model ARN id, an Azure deployment name).
    pub id: String,
    /// Human-readable display name.
    pub name: Option<String>,
    /// Alternate id this model is also addressable by.
    pub alias: Option<String>,
    /// Maximum input context length in tokens.
    pub context_length: Option<u32>,
    /// Maximum output tokens per request.
    pub max_output_tokens: Option<u32>,
    /// Cost per 1,000,000 input tokens, in USD.
    pub cost_per_million_in: f64,
    /// Cost per 1,000,000 output tokens, in USD.
    pub cost_per_million_out: f64,
}

impl ModelInfo {
    /// Start building a model descriptor.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            alias: None,
            context_length: None,
            max_output_tokens: None,
            cost_per_million_in: 0.0,
            cost_per_million_out: 0.0,
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set an alternate addressable id.
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Set the input context window, in tokens.
    #[must_use]
    pub fn with_context_length(mut self, tokens: u32) -> Self {
        self.context_length = Some(tokens);
        self
    }

    /// Set the max output tokens.
    #[must_use]
    pub fn with_max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = Some(tokens);
        self
    }

    /// Set per-1M-token pricing (USD).
    #[must_use]
    pub fn with_pricing(mut self, cost_per_million_in: f64, cost_per_million_out: f64) -> Self {
        self.cost_per_million_in = cost_per_million_in;
        self.cost_per_million_out = cost_per_million_out;
        self
    }

    /// Compute the USD cost of a usage record against this model's pricing.
    #[must_use]
    pub fn cost_of(&self, prompt_tokens: u32, completion_tokens: u32) -> f64 {
        let input = f64::from(prompt_tokens) / 1_000_000.0 * self.cost_per_million_in;
        let output = f64::from(completion_tokens) / 1_000_000.0 * self.cost_per_million_out;
        input + output
    }
}

/// Lightweight descriptor returned by `listModels`, distinct from the
/// registry's richer `ManagedModel` (which additionally tracks lifecycle and
/// health).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// The model descriptor itself.
    pub info: ModelInfo,
    /// Which provider instance serves this model.
    pub provider_id: String,
    /// Provider family.
    pub provider_type: ProviderType,
}

/// Uniform contract every backend adapter implements (§4.E).
///
/// `load`/`unload` bind and release a model's runtime resources; the other
/// methods are invocation, health, and accounting operations against a
/// model that is already (or implicitly) loaded.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// This adapter instance's id, unique within a `ProviderRegistry`.
    fn id(&self) -> &str;

    /// Which backend family this adapter talks to.
    fn provider_type(&self) -> ProviderType;

    /// Declared capabilities for this adapter instance.
    fn capabilities(&self) -> &ProviderCapabilities;

    /// Models this adapter currently serves.
    fn models(&self) -> &[ModelInfo];

    /// Base URL or endpoint this adapter talks to (for diagnostics/health).
    fn base_url(&self) -> &str;

    /// Bind a model's runtime resources.
    ///
    /// The default implementation is a no-op success for adapters whose
    /// "loading" is just registering a deployment/model mapping (the HTTP
    /// providers); adapters with real resource acquisition (local runtimes)
    /// override this.
    ///
    /// # Errors
    /// Returns `NotFound`, `Authentication`, or a provider error if the model
    /// cannot be bound.
    async fn load(&self, _model_id: &str) -> Result<(), GatewayError> {
        Ok(())
    }

    /// Release a model's runtime resources. Must be safe to call on a model
    /// that was never loaded.
    async fn unload(&self, _model_id: &str) -> Result<(), GatewayError> {
        Ok(())
    }

    /// Probe the adapter's reachability and latency.
    async fn health_check(&self) -> HealthStatus;

    /// Enumerate models this adapter can serve right now.
    ///
    /// # Errors
    /// Returns `Authentication` if listing requires credentials that are
    /// invalid or missing.
    async fn list_models(&self) -> Result<Vec<ModelDescriptor>, GatewayError> {
        Ok(self
            .models()
            .iter()
            .map(|info| ModelDescriptor {
                info: info.clone(),
                provider_id: self.id().to_string(),
                provider_type: self.provider_type(),
            })
            .collect())
    }

    /// Execute a non-streaming completion.
    ///
    /// # Errors
    /// Any variant of [`GatewayError`] per the failure mapping in §4.E.
    async fn chat_completion(&self, request: &GatewayRequest) -> Result<GatewayResponse, GatewayError>;

    /// Execute a streaming completion. The returned stream is finite and not
    /// restartable; dropping it must close the upstream connection.
    ///
    /// # Errors
    /// Any variant of [`GatewayError`], plus `Streaming` for transport
    /// failures mid-stream.
    async fn chat_completion_stream(
        &self,
        request: &GatewayRequest,
    ) -> Result<BoxStream<'static, Result<ChatChunk, GatewayError>>, GatewayError>;

    /// Compute the USD cost of a usage record for the given model.
    fn cost_of(&self, model_id: &str, prompt_tokens: u32, completion_tokens: u32) -> f64 {
        self.models()
            .iter()
            .find(|m| m.id == model_id || m.alias.as_deref() == Some(model_id))
            .map_or(0.0, |m| m.cost_of(prompt_tokens, completion_tokens))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_info_cost_of_per_million() {
        let model = ModelInfo::new("gpt-4").with_pricing(5.0, 15.0);
        // 1,000,000 prompt tokens costs exactly the declared per-million rate.
        let cost = model.cost_of(1_000_000, 0);
        assert!((cost - 5.0).abs() < 1e-9);
        let cost = model.cost_of(0, 500_000);
        assert!((cost - 7.5).abs() < 1e-9);
    }

    #[test]
    fn test_health_status_usability() {
        assert!(HealthStatus::Healthy.is_usable());
        assert!(HealthStatus::Degraded.is_usable());
        assert!(!HealthStatus::Unhealthy.is_usable());
    }
}
