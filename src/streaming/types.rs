//! Type definitions for streamed chat-completion chunks.

use crate::Usage;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One `chat.completion.chunk` fragment as delivered by the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_tier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_fingerprint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// A choice within a chunk.
///
/// `delta` stays an untyped JSON object: it is merged field by field into
/// the accumulator, so providers' extra text fields flow through.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub index: u32,
    #[serde(default, deserialize_with = "delta_or_empty")]
    pub delta: Map<String, Value>,
    #[serde(default)]
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub logprobs: Option<Value>,
}

// Some providers send `"delta": null` on the terminal chunk.
fn delta_or_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Transport metadata kept from the most recent fragment.
#[derive(Debug, Clone, Default)]
pub(crate) struct ChunkMetadata {
    pub id: String,
    pub created: i64,
    pub model: String,
    pub service_tier: Option<String>,
    pub system_fingerprint: Option<String>,
    pub usage: Option<Usage>,
}
