//! Streaming chunk types.
//!
//! A stream is a finite, not-restartable sequence of [`ChatChunk`]s produced
//! by an adapter and consumed by the pipeline; cancellation closes the
//! producer side (Design Note: bounded channel, not a coroutine/generator).

use crate::request::{FunctionCall, MessageRole, ToolCall};
use crate::response::{FinishReason, Usage};
use serde::{Deserialize, Serialize};

/// A single server-sent-event frame of a streaming completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChunk {
    /// Response id, stable across all chunks of one stream.
    pub id: String,
    /// Object type (`"chat.completion.chunk"`).
    pub object: String,
    /// Unix timestamp of creation.
    pub created: i64,
    /// Serving model.
    pub model: String,
    /// Per-choice deltas.
    pub choices: Vec<ChunkChoice>,
    /// Provider-specific fingerprint, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_fingerprint: Option<String>,
    /// Usage, populated only on the terminal chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// A single choice's delta within a chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkChoice {
    /// Index among the stream's choices.
    pub index: u32,
    /// The incremental content for this choice.
    pub delta: ChunkDelta,
    /// Present only on the final chunk for this choice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    /// Log-probabilities for this delta, if requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logprobs: Option<serde_json::Value>,
}

/// The incremental content of one chunk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkDelta {
    /// Present only on the first chunk of a choice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<MessageRole>,
    /// Incremental text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Incremental tool calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Legacy single function-call delta.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
}

/// Newline-delimited JSON frame the `/infer:stream` transport writes
/// (§6). Distinct from `ChatChunk`, which is the adapter-facing shape;
/// this is the wire-facing shape the external caller consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamFrame {
    /// Incremental text for this frame, empty on the terminal frame.
    #[serde(default)]
    pub delta: String,
    /// Whether this is the terminal frame.
    pub done: bool,
    /// Present only on the terminal frame.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    /// Present only on the terminal frame, when the stream ended abnormally.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

impl StreamFrame {
    /// Build a non-terminal delta frame.
    #[must_use]
    pub fn delta(text: impl Into<String>) -> Self {
        Self {
            delta: text.into(),
            done: false,
            usage: None,
            finish_reason: None,
        }
    }

    /// Build the terminal frame.
    #[must_use]
    pub fn terminal(usage: Usage, finish_reason: FinishReason) -> Self {
        Self {
            delta: String::new(),
            done: true,
            usage: Some(usage),
            finish_reason: Some(finish_reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_frame_serialization() {
        let frame = StreamFrame::delta("hello");
        let json = serde_json::to_string(&frame).expect("serialize");
        assert!(json.contains("\"delta\":\"hello\""));
        assert!(json.contains("\"done\":false"));

        let terminal = StreamFrame::terminal(Usage::new(3, 4), FinishReason::Stop);
        assert!(terminal.done);
        assert_eq!(terminal.usage.expect("usage").total_tokens, 7);
    }
}
