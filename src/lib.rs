//! Completion Assembler
//!
//! This crate rebuilds a complete `chat.completion` response from the
//! `chat.completion.chunk` fragments an OpenAI-compatible API streams back.
//! The result has the same shape as a non-streaming response, including
//! tool calls that were streamed in interleaved pieces.
//!
//! ## Usage
//!
//! ```rust
//! use completion_assembler::streaming::{aggregate_or_fallback, ChatCompletionChunk};
//!
//! let lines = [
//!     r#"{"id":"c1","created":1,"model":"m","choices":[{"index":0,"delta":{"role":"assistant","content":"Hel"}}]}"#,
//!     r#"{"id":"c1","created":1,"model":"m","choices":[{"index":0,"delta":{"content":"lo"},"finish_reason":"stop"}]}"#,
//! ];
//! let fragments = lines
//!     .iter()
//!     .map(|line| serde_json::from_str::<ChatCompletionChunk>(line));
//!
//! let completion = aggregate_or_fallback("m", fragments);
//! assert_eq!(completion.message().and_then(|m| m.content.as_deref()), Some("Hello"));
//! ```
//!
//! ## Core Principles
//!
//! 1. **Shape-declared merging**: every accumulated field is known to be text
//!    or a nested record before any fragment arrives
//! 2. **Position-keyed tool calls**: deltas join their tool call by `index`
//! 3. **Never half-built**: a failed aggregation yields a fixed fallback
//!    response, never a partially merged one

use serde::{Deserialize, Serialize};

pub mod error;
pub use error::{AggregateError, Result};

// ============================================================================
// Streaming Support
// ============================================================================

pub mod streaming;
pub use streaming::{AccumulatorConfig, ChatCompletionChunk, StreamingAccumulator};

// ============================================================================
// Markdown JSON Extraction
// ============================================================================

pub mod extract;
pub use extract::{extract_json_block, parse_json_block};

// ============================================================================
// Core Response Types
// ============================================================================

/// `object` value of a complete (non-streaming) response
pub const CHAT_COMPLETION_OBJECT: &str = "chat.completion";

/// A complete chat completion response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletion {
    /// Response identifier
    pub id: String,
    /// Response choices (exactly one when assembled from a stream)
    pub choices: Vec<Choice>,
    /// Creation time (Unix seconds)
    pub created: i64,
    /// Model that produced the response
    pub model: String,
    /// Always `chat.completion`
    pub object: String,
    /// Provider service tier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_tier: Option<String>,
    /// Backend configuration fingerprint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_fingerprint: Option<String>,
    /// Token usage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl ChatCompletion {
    /// Create the fallback response used when a stream cannot be assembled
    pub fn fallback(model: impl Into<String>) -> Self {
        Self {
            id: streaming::FALLBACK_ID.to_string(),
            choices: vec![Choice {
                index: 0,
                finish_reason: Some("stop".to_string()),
                logprobs: None,
                message: ChatCompletionMessage::assistant(streaming::FALLBACK_CONTENT),
            }],
            created: chrono::Utc::now().timestamp(),
            model: model.into(),
            object: CHAT_COMPLETION_OBJECT.to_string(),
            service_tier: Some("default".to_string()),
            system_fingerprint: None,
            usage: None,
        }
    }

    /// Whether this is a fallback response
    pub fn is_fallback(&self) -> bool {
        self.id == streaming::FALLBACK_ID
            && self.usage.is_none()
            && self
                .message()
                .and_then(|m| m.content.as_deref())
                .is_some_and(|content| content == streaming::FALLBACK_CONTENT)
    }

    /// Get the first choice
    pub fn first_choice(&self) -> Option<&Choice> {
        self.choices.first()
    }

    /// Get the message of the first choice
    pub fn message(&self) -> Option<&ChatCompletionMessage> {
        self.first_choice().map(|choice| &choice.message)
    }
}

/// A single response choice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub index: u32,
    /// Why generation stopped (e.g. "stop", "length", "tool_calls")
    pub finish_reason: Option<String>,
    /// Log-probability information, passed through untouched
    #[serde(default)]
    pub logprobs: Option<serde_json::Value>,
    pub message: ChatCompletionMessage,
}

/// Message role of a response message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Assistant response
    #[default]
    Assistant,
}

impl MessageRole {
    /// Convert to string representation
    pub fn as_str(&self) -> &str {
        match self {
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The assistant message of a response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionMessage {
    pub role: MessageRole,
    pub content: Option<String>,
    /// Reasoning text from models that stream their thinking separately
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refusal: Option<String>,
    /// Legacy single function call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl ChatCompletionMessage {
    /// Create an assistant message with text content only
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            ..Self::default()
        }
    }
}

// ============================================================================
// OpenAI-Compatible Tool Types
// ============================================================================

/// Function call structure for tool invocations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// Raw JSON argument text as streamed
    pub arguments: String,
}

/// Tool call structure for function calling
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub r#type: String,
    pub function: FunctionCall,
}

impl ToolCall {
    /// Parse the accumulated argument text as JSON
    pub fn parse_arguments(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_str(&self.function.arguments)
    }
}

/// Token usage statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens_details: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_tokens_details: Option<serde_json::Value>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_shape() {
        let completion = ChatCompletion::fallback("qwen-max");

        assert_eq!(completion.id, "chatcmpl-1234567890");
        assert_eq!(completion.model, "qwen-max");
        assert_eq!(completion.object, "chat.completion");
        assert_eq!(completion.service_tier.as_deref(), Some("default"));
        assert!(completion.usage.is_none());
        assert!(completion.created > 0);
        assert_eq!(completion.choices.len(), 1);

        let choice = completion.first_choice().unwrap();
        assert_eq!(choice.index, 0);
        assert_eq!(choice.finish_reason.as_deref(), Some("stop"));
        assert_eq!(choice.message.content.as_deref(), Some("Error in calling LLM"));
        assert!(choice.message.tool_calls.is_none());
        assert!(completion.is_fallback());
    }

    #[test]
    fn test_completion_serializes_openai_shape() {
        let completion = ChatCompletion {
            id: "chatcmpl-abc".to_string(),
            choices: vec![Choice {
                index: 0,
                finish_reason: Some("tool_calls".to_string()),
                logprobs: None,
                message: ChatCompletionMessage {
                    tool_calls: Some(vec![ToolCall {
                        id: "call_1".to_string(),
                        r#type: "function".to_string(),
                        function: FunctionCall {
                            name: "search".to_string(),
                            arguments: "{\"q\":\"rust\"}".to_string(),
                        },
                    }]),
                    ..ChatCompletionMessage::assistant("")
                },
            }],
            created: 1_700_000_000,
            model: "gpt-4o".to_string(),
            object: CHAT_COMPLETION_OBJECT.to_string(),
            service_tier: None,
            system_fingerprint: None,
            usage: None,
        };

        let json = serde_json::to_value(&completion).unwrap();
        assert_eq!(json["object"], "chat.completion");
        assert_eq!(json["choices"][0]["message"]["role"], "assistant");
        assert_eq!(json["choices"][0]["message"]["tool_calls"][0]["type"], "function");
        assert_eq!(
            json["choices"][0]["message"]["tool_calls"][0]["function"]["name"],
            "search"
        );
        assert!(json.get("usage").is_none());
        assert!(json["choices"][0]["message"].get("function_call").is_none());
        assert!(!completion.is_fallback());
    }

    #[test]
    fn test_parse_arguments() {
        let call = ToolCall {
            id: "call_1".to_string(),
            r#type: "function".to_string(),
            function: FunctionCall {
                name: "get_weather".to_string(),
                arguments: "{\"location\": \"SF\"}".to_string(),
            },
        };
        assert_eq!(call.parse_arguments().unwrap()["location"], "SF");

        let partial = ToolCall {
            function: FunctionCall {
                arguments: "{\"location\"".to_string(),
                ..call.function.clone()
            },
            ..call
        };
        assert!(partial.parse_arguments().is_err());
    }

    #[test]
    fn test_role_string_conversion() {
        assert_eq!(MessageRole::Assistant.as_str(), "assistant");
        assert_eq!(MessageRole::Assistant.to_string(), "assistant");
    }
}
