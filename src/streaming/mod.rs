//! Streaming response accumulation for OpenAI-compatible chat completions.
//!
//! This module folds a sequence of `chat.completion.chunk` fragments into a
//! single `chat.completion`, handling text deltas and position-indexed tool
//! call deltas, with a fallback envelope for streams that cannot be merged.

mod accumulator;
mod config;
mod fallback;
mod merge;
mod tool_calls;
mod types;

pub use accumulator::{aggregate, StreamingAccumulator};
pub use config::{AccumulatorConfig, DEFAULT_MAX_TOOL_CALL_INDEX};
#[cfg(feature = "streaming")]
pub use fallback::{accumulate_stream_or_fallback, accumulate_stream_or_fallback_with};
pub use fallback::{
    aggregate_or_fallback, aggregate_or_fallback_with, build_fallback, FALLBACK_CONTENT,
    FALLBACK_ID,
};
pub use merge::{merge_fields, Field, Record};
pub use tool_calls::ToolCallTracker;
pub use types::{ChatCompletionChunk, ChunkChoice};
