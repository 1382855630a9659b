//! Streaming response accumulator.

use super::config::AccumulatorConfig;
use super::merge::{merge_fields, Record};
use super::tool_calls::ToolCallTracker;
use super::types::{ChatCompletionChunk, ChunkMetadata};
use crate::error::{AggregateError, Result};
use crate::{ChatCompletion, ChatCompletionMessage, Choice, FunctionCall, MessageRole};
use serde_json::Value;
use std::fmt::Display;

/// Terminal sentinel some providers send as the last SSE payload.
const DONE_SENTINEL: &str = "[DONE]";

/// SSE field prefix carried by raw event lines.
const DATA_PREFIX: &str = "data:";

/// Fresh message record: text fields seeded empty, nested records declared.
fn message_record() -> Record {
    Record::new()
        .with_text("content")
        .with_text("reasoning_content")
        .with_text("refusal")
        .with_record(
            "function_call",
            Record::new().with_text("name").with_text("arguments"),
        )
}

/// Accumulates streaming chunks into a complete `chat.completion`.
///
/// Text fields append, tool calls merge by their stream position, and the
/// envelope metadata comes from the last chunk seen. One accumulator serves
/// exactly one stream.
///
/// The first error is sticky: once a chunk is rejected, every later call and
/// [`finish`](Self::finish) return that error, so a partly merged chunk never
/// reaches a response.
#[derive(Debug)]
pub struct StreamingAccumulator {
    config: AccumulatorConfig,
    message: Record,
    tool_calls: ToolCallTracker,
    finish_reason: Option<String>,
    logprobs: Option<Value>,
    last_chunk: Option<ChunkMetadata>,
    skipped: usize,
    failed: Option<AggregateError>,
}

impl Default for StreamingAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamingAccumulator {
    /// Create a new accumulator
    pub fn new() -> Self {
        Self::with_config(AccumulatorConfig::default())
    }

    /// Create an accumulator with explicit configuration
    pub fn with_config(config: AccumulatorConfig) -> Self {
        Self {
            tool_calls: ToolCallTracker::new(config.max_tool_call_index),
            config,
            message: message_record(),
            finish_reason: None,
            logprobs: None,
            last_chunk: None,
            skipped: 0,
            failed: None,
        }
    }

    /// Number of fragments skipped because they could not be decoded
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Merge a single decoded chunk
    pub fn process_chunk(&mut self, chunk: ChatCompletionChunk) -> Result<()> {
        if let Some(err) = &self.failed {
            return Err(err.clone());
        }
        self.merge_chunk(chunk).map_err(|err| self.fail(err))
    }

    fn fail(&mut self, err: AggregateError) -> AggregateError {
        self.failed = Some(err.clone());
        err
    }

    fn merge_chunk(&mut self, chunk: ChatCompletionChunk) -> Result<()> {
        let ChatCompletionChunk {
            id,
            choices,
            created,
            model,
            service_tier,
            system_fingerprint,
            usage,
            ..
        } = chunk;

        tracing::trace!("Processing chunk {} with {} choice(s)", id, choices.len());

        let mut choices = choices.into_iter();
        if let Some(choice) = choices.next() {
            let mut delta = choice.delta;
            delta.remove("role");

            match delta.remove("tool_calls") {
                Some(Value::Array(entries)) => self.tool_calls.apply(entries)?,
                Some(Value::Null) | None => {}
                Some(_) => {
                    return Err(AggregateError::FieldConflict {
                        path: "tool_calls".to_string(),
                        expected: "list",
                        found: "non-list value",
                    });
                }
            }

            merge_fields(&mut self.message, &delta, "")?;

            self.finish_reason = choice.finish_reason;
            self.logprobs = choice.logprobs;
        }

        let extra = choices.count();
        if extra > 0 {
            tracing::debug!("Ignoring {} additional choice(s) in chunk {}", extra, id);
        }

        self.last_chunk = Some(ChunkMetadata {
            id,
            created,
            model,
            service_tier,
            system_fingerprint,
            usage,
        });

        Ok(())
    }

    /// Decode one SSE `data:` line, with or without its prefix, and merge it.
    ///
    /// The `[DONE]` sentinel and blank payloads are ignored.
    pub fn process_json(&mut self, data: &str) -> Result<()> {
        let data = data.trim();
        let data = data.strip_prefix(DATA_PREFIX).unwrap_or(data).trim_start();
        if data.is_empty() || data == DONE_SENTINEL {
            return Ok(());
        }

        match serde_json::from_str::<ChatCompletionChunk>(data) {
            Ok(chunk) => self.process_chunk(chunk),
            Err(e) => self.skip_fragment(e),
        }
    }

    /// Record a fragment that failed to decode.
    ///
    /// Skips it when the configuration allows, otherwise fails with
    /// [`AggregateError::Decode`].
    pub fn skip_fragment(&mut self, error: impl Display) -> Result<()> {
        if let Some(err) = &self.failed {
            return Err(err.clone());
        }
        if !self.config.skip_undecodable {
            return Err(self.fail(AggregateError::Decode(error.to_string())));
        }
        tracing::warn!("Skipping undecodable fragment: {}", error);
        self.skipped += 1;
        Ok(())
    }

    /// Build the final response.
    pub fn finish(self) -> Result<ChatCompletion> {
        if let Some(err) = self.failed {
            return Err(err);
        }
        let last = self.last_chunk.ok_or(AggregateError::EmptyStream)?;

        let function_call = self
            .message
            .record("function_call")
            .filter(|record| record.is_present())
            .map(|record| FunctionCall {
                name: record.text("name").to_string(),
                arguments: record.text("arguments").to_string(),
            });

        let message = ChatCompletionMessage {
            role: MessageRole::Assistant,
            content: Some(self.message.text("content").to_string()),
            reasoning_content: Some(self.message.text("reasoning_content").to_string()),
            refusal: Some(self.message.text("refusal").to_string()),
            function_call,
            tool_calls: self.tool_calls.finish(),
        };

        Ok(ChatCompletion {
            id: last.id,
            choices: vec![Choice {
                index: 0,
                finish_reason: self.finish_reason,
                logprobs: self.logprobs,
                message,
            }],
            created: last.created,
            model: last.model,
            object: crate::CHAT_COMPLETION_OBJECT.to_string(),
            service_tier: last.service_tier,
            system_fingerprint: last.system_fingerprint,
            usage: last.usage,
        })
    }

    /// Aggregate an entire fragment sequence into a response.
    ///
    /// `Err` items are treated as fragments that failed to decode.
    pub fn aggregate<I, E>(self, fragments: I) -> Result<ChatCompletion>
    where
        I: IntoIterator<Item = std::result::Result<ChatCompletionChunk, E>>,
        E: Display,
    {
        let mut accumulator = self;

        for fragment in fragments {
            match fragment {
                Ok(chunk) => accumulator.process_chunk(chunk)?,
                Err(e) => accumulator.skip_fragment(e)?,
            }
        }

        accumulator.finish()
    }

    /// Aggregate an entire stream into a response
    ///
    /// The stream is consumed until it ends; if the transport drops early,
    /// whatever arrived is treated as the complete sequence.
    #[cfg(feature = "streaming")]
    pub async fn accumulate_stream<S, E>(self, mut stream: S) -> Result<ChatCompletion>
    where
        S: futures_util::Stream<Item = std::result::Result<ChatCompletionChunk, E>> + Unpin,
        E: Display,
    {
        use futures_util::StreamExt;

        let mut accumulator = self;

        while let Some(fragment) = stream.next().await {
            match fragment {
                Ok(chunk) => accumulator.process_chunk(chunk)?,
                Err(e) => accumulator.skip_fragment(e)?,
            }
        }

        accumulator.finish()
    }
}

/// Aggregate fragments with the default configuration.
pub fn aggregate<I, E>(fragments: I) -> Result<ChatCompletion>
where
    I: IntoIterator<Item = std::result::Result<ChatCompletionChunk, E>>,
    E: Display,
{
    StreamingAccumulator::new().aggregate(fragments)
}
