//! Local in-process model runtime adapter (§4.E).
//!
//! Unlike the HTTP adapters in this crate, `LocalProvider` talks to no
//! remote endpoint: it binds model weights into process memory on [`load`]
//! and serves completions through a pluggable [`LocalRuntime`] -- the
//! actual GGUF/ONNX/etc. inference engine is injected by the embedder.
//! [`EchoRuntime`] is the default, dependency-free runtime used when no
//! real engine is wired in (local development, tests).

use crate::template::TemplateRegistry;
use async_stream::stream;
use async_trait::async_trait;
use dashmap::DashMap;
use futures::stream::BoxStream;
use gateway_core::{
    ChatChunk, ChunkChoice, ChunkDelta, FinishReason, GatewayError, GatewayRequest,
    GatewayResponse, HealthStatus, LLMProvider, MessageRole, ModelInfo, ProviderCapabilities,
    ProviderType,
};
use gateway_core::response::{Choice, ResponseMessage, Usage};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Text generated by a [`LocalRuntime`] for one completion request.
#[derive(Debug, Clone)]
pub struct GeneratedText {
    /// The generated text.
    pub text: String,
    /// Estimated prompt token count.
    pub prompt_tokens: u32,
    /// Estimated completion token count.
    pub completion_tokens: u32,
}

/// The pluggable inference backend a [`LocalProvider`] drives. Production
/// embedders implement this against a real GGUF/ONNX/etc. runtime; the
/// adapter itself only knows about loading, routing, and accounting.
#[async_trait]
pub trait LocalRuntime: Send + Sync {
    /// Acquire whatever resources `model_id` needs to serve requests
    /// (weight file mmap, context allocation, etc).
    async fn load(&self, model_id: &str, weights_path: &std::path::Path) -> Result<(), GatewayError>;

    /// Release `model_id`'s resources. Safe to call when not loaded.
    async fn unload(&self, model_id: &str) -> Result<(), GatewayError>;

    /// Run inference against `model_id` with the rendered `prompt`.
    async fn generate(
        &self,
        model_id: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<GeneratedText, GatewayError>;
}

/// A dependency-free runtime that produces a deterministic, length-bounded
/// echo of the prompt. Used when no real inference engine is configured;
/// never intended to produce useful completions.
#[derive(Debug, Default)]
pub struct EchoRuntime;

#[async_trait]
impl LocalRuntime for EchoRuntime {
    async fn load(&self, _model_id: &str, _weights_path: &std::path::Path) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn unload(&self, _model_id: &str) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn generate(
        &self,
        _model_id: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<GeneratedText, GatewayError> {
        let prompt_tokens = estimate_tokens(prompt);
        let words: Vec<&str> = prompt.split_whitespace().collect();
        let take = (max_tokens as usize).min(words.len()).max(1);
        let text = if words.is_empty() {
            String::new()
        } else {
            words[..take.min(words.len())].join(" ")
        };
        let completion_tokens = estimate_tokens(&text);
        Ok(GeneratedText {
            text,
            prompt_tokens,
            completion_tokens,
        })
    }
}

/// Whitespace-based token estimate, used only by the stand-in runtimes in
/// this module -- real backends report exact counts from their own
/// tokenizer.
fn estimate_tokens(text: &str) -> u32 {
    let words = text.split_whitespace().count();
    // A common rule of thumb (~1.3 tokens/word) without pulling in a real
    // tokenizer for a stand-in runtime.
    (words as f64 * 1.3).ceil() as u32
}

/// Configuration for a local-runtime provider instance.
#[derive(Debug, Clone)]
pub struct LocalConfig {
    /// Provider instance id.
    pub id: String,
    /// Models this instance can serve, keyed by model id.
    pub models: Vec<ModelInfo>,
    /// On-disk weights path for each model id.
    pub weights_paths: std::collections::HashMap<String, PathBuf>,
    /// Upper bound on completion tokens when the request doesn't specify one.
    pub default_max_tokens: u32,
}

impl LocalConfig {
    /// Start a configuration with no models registered.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            models: Vec::new(),
            weights_paths: std::collections::HashMap::new(),
            default_max_tokens: 256,
        }
    }

    /// Register a model and the weights path used to load it.
    #[must_use]
    pub fn with_model(mut self, model: ModelInfo, weights_path: impl Into<PathBuf>) -> Self {
        self.weights_paths.insert(model.id.clone(), weights_path.into());
        self.models.push(model);
        self
    }
}

/// In-process model runtime adapter.
pub struct LocalProvider {
    config: LocalConfig,
    capabilities: ProviderCapabilities,
    runtime: Arc<dyn LocalRuntime>,
    templates: TemplateRegistry,
    loaded: DashMap<String, bool>,
}

impl LocalProvider {
    /// Build a provider with the given runtime backend (use
    /// [`EchoRuntime::default`] when no real engine is available).
    #[must_use]
    pub fn new(config: LocalConfig, runtime: Arc<dyn LocalRuntime>) -> Self {
        let capabilities = ProviderCapabilities {
            chat: true,
            streaming: true,
            function_calling: false,
            vision: false,
            embeddings: false,
            json_mode: false,
            seed: false,
            logprobs: false,
            max_context_length: config.models.iter().filter_map(|m| m.context_length).max(),
            max_output_tokens: config.models.iter().filter_map(|m| m.max_output_tokens).max(),
            parallel_tool_calls: false,
        };
        Self {
            config,
            capabilities,
            runtime,
            templates: TemplateRegistry::with_builtin_defaults(),
            loaded: DashMap::new(),
        }
    }

    fn find_model(&self, model_id: &str) -> Option<&ModelInfo> {
        self.config
            .models
            .iter()
            .find(|m| m.id == model_id || m.alias.as_deref() == Some(model_id))
    }

    fn is_loaded(&self, model_id: &str) -> bool {
        self.loaded.get(model_id).map(|v| *v).unwrap_or(false)
    }
}

#[async_trait]
impl LLMProvider for LocalProvider {
    fn id(&self) -> &str {
        &self.config.id
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::Local
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    fn models(&self) -> &[ModelInfo] {
        &self.config.models
    }

    fn base_url(&self) -> &str {
        "local://in-process"
    }

    async fn load(&self, model_id: &str) -> Result<(), GatewayError> {
        let model = self
            .find_model(model_id)
            .ok_or_else(|| GatewayError::model_not_found(format!("no local model '{model_id}'")))?;
        let weights_path = self.config.weights_paths.get(&model.id).ok_or_else(|| {
            GatewayError::configuration(format!("no weights path configured for '{model_id}'"))
        })?;
        self.runtime.load(&model.id, weights_path).await?;
        self.loaded.insert(model.id.clone(), true);
        debug!(model_id = %model.id, provider = %self.config.id, "local model loaded");
        Ok(())
    }

    async fn unload(&self, model_id: &str) -> Result<(), GatewayError> {
        self.runtime.unload(model_id).await?;
        self.loaded.insert(model_id.to_string(), false);
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        if self.config.models.is_empty() {
            return HealthStatus::Unhealthy;
        }
        if self.loaded.iter().any(|entry| *entry.value()) {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        }
    }

    async fn chat_completion(&self, request: &GatewayRequest) -> Result<GatewayResponse, GatewayError> {
        let model = self.find_model(&request.model).ok_or_else(|| {
            GatewayError::model_not_found(format!("no local model '{}'", request.model))
        })?;
        if !self.is_loaded(&model.id) {
            return Err(GatewayError::not_found(format!(
                "local model '{}' is not loaded",
                model.id
            )));
        }

        let rendered = self
            .templates
            .render_for_model(&model.id, &request.messages)
            .map_err(|e| GatewayError::internal(format!("template render failed: {e}")))?;
        let max_tokens = request.max_tokens.unwrap_or(self.config.default_max_tokens);

        let generated = self.runtime.generate(&model.id, &rendered.prompt, max_tokens).await?;
        let usage = Usage::new(generated.prompt_tokens, generated.completion_tokens);

        Ok(GatewayResponse {
            id: format!("local-{}", uuid::Uuid::new_v4()),
            object: "chat.completion".to_string(),
            created: chrono::Utc::now().timestamp(),
            model: model.id.clone(),
            choices: vec![Choice {
                index: 0,
                message: ResponseMessage {
                    role: MessageRole::Assistant,
                    content: Some(generated.text),
                    tool_calls: None,
                    function_call: None,
                },
                finish_reason: Some(FinishReason::Stop),
                logprobs: None,
            }],
            usage,
            system_fingerprint: None,
            provider: Some(self.config.id.clone()),
            cost: Some(model.cost_of(usage.prompt_tokens, usage.completion_tokens)),
            latency_ms: None,
            cached: false,
            fallback_depth: 0,
        })
    }

    async fn chat_completion_stream(
        &self,
        request: &GatewayRequest,
    ) -> Result<BoxStream<'static, Result<ChatChunk, GatewayError>>, GatewayError> {
        let response = self.chat_completion(request).await?;
        let text = response.choices[0].message.content.clone().unwrap_or_default();
        let model = response.model.clone();
        let response_id = response.id.clone();
        let usage = response.usage;

        let output = stream! {
            let words: Vec<String> = text.split_whitespace().map(str::to_string).collect();
            for (i, word) in words.iter().enumerate() {
                let is_last = i + 1 == words.len();
                yield Ok(ChatChunk {
                    id: response_id.clone(),
                    object: "chat.completion.chunk".to_string(),
                    created: chrono::Utc::now().timestamp(),
                    model: model.clone(),
                    choices: vec![ChunkChoice {
                        index: 0,
                        delta: ChunkDelta {
                            role: (i == 0).then_some(MessageRole::Assistant),
                            content: Some(if i == 0 {
                                word.clone()
                            } else {
                                format!(" {word}")
                            }),
                            tool_calls: None,
                            function_call: None,
                        },
                        finish_reason: is_last.then_some(FinishReason::Stop),
                        logprobs: None,
                    }],
                    system_fingerprint: None,
                    usage: is_last.then_some(usage),
                });
            }
        };

        Ok(Box::pin(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_core::request::ChatMessage;

    fn provider() -> LocalProvider {
        let config = LocalConfig::new("local-1").with_model(
            ModelInfo::new("tiny-llama").with_context_length(2048),
            "/models/tiny-llama.gguf",
        );
        LocalProvider::new(config, Arc::new(EchoRuntime))
    }

    #[tokio::test]
    async fn test_unloaded_model_rejected() {
        let provider = provider();
        let request = GatewayRequest::builder()
            .model("tiny-llama")
            .message(ChatMessage::user("hello"))
            .build()
            .expect("valid request");
        let err = provider.chat_completion(&request).await.expect_err("not loaded");
        assert!(matches!(err, GatewayError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_load_then_complete() {
        let provider = provider();
        provider.load("tiny-llama").await.expect("loads");
        assert_eq!(provider.health_check().await, HealthStatus::Healthy);

        let request = GatewayRequest::builder()
            .model("tiny-llama")
            .message(ChatMessage::user("hello there friend"))
            .build()
            .expect("valid request");
        let response = provider.chat_completion(&request).await.expect("completes");
        assert!(!response.choices[0].message.content.as_deref().unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn test_unload_marks_unhealthy_when_sole_model() {
        let provider = provider();
        provider.load("tiny-llama").await.expect("loads");
        provider.unload("tiny-llama").await.expect("unloads");
        assert_eq!(provider.health_check().await, HealthStatus::Degraded);
    }

    #[tokio::test]
    async fn test_streaming_yields_same_text_as_non_streaming() {
        use futures_util::StreamExt;

        let provider = provider();
        provider.load("tiny-llama").await.expect("loads");
        let request = GatewayRequest::builder()
            .model("tiny-llama")
            .message(ChatMessage::user("one two three"))
            .build()
            .expect("valid request");

        let mut stream = provider.chat_completion_stream(&request).await.expect("streams");
        let mut collected = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.expect("chunk ok");
            if let Some(content) = &chunk.choices[0].delta.content {
                collected.push_str(content);
            }
        }
        assert!(!collected.is_empty());
    }
}
