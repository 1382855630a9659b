//! Synthetic response returned when aggregation fails.

use super::accumulator::StreamingAccumulator;
use super::types::ChatCompletionChunk;
use crate::ChatCompletion;
use std::fmt::Display;

/// Placeholder id carried by every fallback response
pub const FALLBACK_ID: &str = "chatcmpl-1234567890";

/// Message content of every fallback response
pub const FALLBACK_CONTENT: &str = "Error in calling LLM";

/// Build the fallback response for `model`.
///
/// Always well-formed: one choice finishing with `stop`, the fixed error
/// text as content, no tool calls and no usage.
pub fn build_fallback(model: &str) -> ChatCompletion {
    ChatCompletion::fallback(model)
}

/// Aggregate `fragments`, substituting the fallback response on any error.
pub fn aggregate_or_fallback<I, E>(model: &str, fragments: I) -> ChatCompletion
where
    I: IntoIterator<Item = Result<ChatCompletionChunk, E>>,
    E: Display,
{
    aggregate_or_fallback_with(StreamingAccumulator::new(), model, fragments)
}

/// Same as [`aggregate_or_fallback`] with a caller-configured accumulator.
pub fn aggregate_or_fallback_with<I, E>(
    accumulator: StreamingAccumulator,
    model: &str,
    fragments: I,
) -> ChatCompletion
where
    I: IntoIterator<Item = Result<ChatCompletionChunk, E>>,
    E: Display,
{
    accumulator.aggregate(fragments).unwrap_or_else(|e| {
        tracing::warn!("Stream aggregation failed for model {}: {}", model, e);
        build_fallback(model)
    })
}

/// Async twin of [`aggregate_or_fallback`].
#[cfg(feature = "streaming")]
pub async fn accumulate_stream_or_fallback<S, E>(model: &str, stream: S) -> ChatCompletion
where
    S: futures_util::Stream<Item = Result<ChatCompletionChunk, E>> + Unpin,
    E: Display,
{
    accumulate_stream_or_fallback_with(StreamingAccumulator::new(), model, stream).await
}

/// Async twin of [`aggregate_or_fallback_with`].
#[cfg(feature = "streaming")]
pub async fn accumulate_stream_or_fallback_with<S, E>(
    accumulator: StreamingAccumulator,
    model: &str,
    stream: S,
) -> ChatCompletion
where
    S: futures_util::Stream<Item = Result<ChatCompletionChunk, E>> + Unpin,
    E: Display,
{
    match accumulator.accumulate_stream(stream).await {
        Ok(completion) => completion,
        Err(e) => {
            tracing::warn!("Stream aggregation failed for model {}: {}", model, e);
            build_fallback(model)
        }
    }
}
