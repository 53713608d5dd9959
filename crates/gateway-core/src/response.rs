//! Response types for the gateway.
//!
//! Mirrors `request.rs`'s shape so the wire format round-trips cleanly
//! through `serde_json`, extended with the fields the core's `Response`
//! entity adds beyond a raw provider reply (`cached`, `fallback_depth`).

use crate::request::{FunctionCall, MessageRole, ToolCall};
use serde::{Deserialize, Serialize};

/// A completed (non-streaming) gateway response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayResponse {
    /// Provider-assigned or generated response id.
    pub id: String,
    /// Object type, OpenAI-compatible (`"chat.completion"`).
    pub object: String,
    /// Unix timestamp of creation.
    pub created: i64,
    /// Model that actually served the request (may differ from the
    /// requested model after fallback).
    pub model: String,
    /// Completion choices.
    pub choices: Vec<Choice>,
    /// Token usage.
    pub usage: Usage,
    /// Provider-specific fingerprint, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_fingerprint: Option<String>,
    /// Which provider instance served this response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// USD cost of this response, per the serving model's declared pricing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    /// Wall-clock latency of this request, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    /// Whether this response was served from cache.
    #[serde(default)]
    pub cached: bool,
    /// How many fallback candidates were tried before this one succeeded.
    #[serde(default)]
    pub fallback_depth: u32,
}

impl GatewayResponse {
    /// Aggregate finish reason across choices: `Stop` only if every choice
    /// stopped cleanly, otherwise the first non-`Stop` reason encountered.
    #[must_use]
    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.choices
            .iter()
            .find_map(|c| match c.finish_reason {
                Some(FinishReason::Stop) | None => None,
                Some(other) => Some(other),
            })
            .or_else(|| self.choices.first().and_then(|c| c.finish_reason))
    }
}

/// A single completion choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    /// Index among the response's choices.
    pub index: u32,
    /// The generated message.
    pub message: ResponseMessage,
    /// Why generation stopped for this choice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    /// Log-probabilities, if requested and supported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logprobs: Option<serde_json::Value>,
}

/// A generated assistant (or tool) message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMessage {
    /// Role of the message (almost always `Assistant`).
    pub role: MessageRole,
    /// Text content, if any (absent when the model only emitted tool calls).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Tool calls requested by the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Legacy single function-call form, for providers that predate the
    /// `tools` array.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
}

/// Why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural stop (end-of-turn or a stop sequence).
    Stop,
    /// Hit `max_tokens`.
    Length,
    /// The model emitted tool/function calls.
    ToolCalls,
    /// Upstream content filter triggered.
    ContentFilter,
    /// Caller cancelled the request.
    Cancelled,
    /// The request errored before completion.
    Error,
}

/// Token usage for a request.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens in the prompt.
    pub prompt_tokens: u32,
    /// Tokens generated.
    pub completion_tokens: u32,
    /// Sum of the two.
    pub total_tokens: u32,
}

impl Usage {
    /// Construct from prompt/completion counts, computing the total.
    #[must_use]
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// A single entry in `GET /models`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelObject {
    /// Model id.
    pub id: String,
    /// Object type (`"model"`).
    pub object: String,
    /// Unix timestamp the model was registered.
    pub created: i64,
    /// Owning provider id.
    pub owned_by: String,
}

/// Body of `GET /models`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsResponse {
    /// Object type (`"list"`).
    pub object: String,
    /// The models.
    pub data: Vec<ModelObject>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_total_computed() {
        let usage = Usage::new(10, 5);
        assert_eq!(usage.total_tokens, 15);
    }

    #[test]
    fn test_response_round_trip() {
        let response = GatewayResponse {
            id: "resp-1".to_string(),
            object: "chat.completion".to_string(),
            created: 0,
            model: "gpt-4".to_string(),
            choices: vec![Choice {
                index: 0,
                message: ResponseMessage {
                    role: MessageRole::Assistant,
                    content: Some("hi".to_string()),
                    tool_calls: None,
                    function_call: None,
                },
                finish_reason: Some(FinishReason::Stop),
                logprobs: None,
            }],
            usage: Usage::new(1, 1),
            system_fingerprint: None,
            provider: Some("p1".to_string()),
            cost: Some(0.01),
            latency_ms: Some(120),
            cached: false,
            fallback_depth: 0,
        };

        let json = serde_json::to_string(&response).expect("serialize");
        let round_tripped: GatewayResponse = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(round_tripped.id, response.id);
        assert_eq!(round_tripped.choices.len(), 1);
        assert_eq!(round_tripped.finish_reason(), Some(FinishReason::Stop));
    }

    #[test]
    fn test_finish_reason_prefers_non_stop() {
        let response = GatewayResponse {
            id: "r".to_string(),
            object: "chat.completion".to_string(),
            created: 0,
            model: "m".to_string(),
            choices: vec![Choice {
                index: 0,
                message: ResponseMessage {
                    role: MessageRole::Assistant,
                    content: None,
                    tool_calls: None,
                    function_call: None,
                },
                finish_reason: Some(FinishReason::Length),
                logprobs: None,
            }],
            usage: Usage::default(),
            system_fingerprint: None,
            provider: None,
            cost: None,
            latency_ms: None,
            cached: false,
            fallback_depth: 0,
        };
        assert_eq!(response.finish_reason(), Some(FinishReason::Length));
    }
}
