//! Error types for stream aggregation.

use thiserror::Error;

/// Errors that can abort the aggregation of a fragment sequence.
///
/// Callers that must always receive a response shape should go through
/// [`crate::streaming::aggregate_or_fallback`], which turns every variant
/// into the fallback envelope.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AggregateError {
    /// A fragment could not be decoded
    #[error("Fragment decode error: {0}")]
    Decode(String),

    /// A field changed shape between fragments (text vs. nested record)
    #[error("Field `{path}` holds a {expected} but the fragment carries a {found}")]
    FieldConflict {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A fragment carried a nested record for a key the accumulator does not declare
    #[error("Field `{path}` is not a known nested record")]
    UnknownRecordField { path: String },

    /// A tool call delta without an `index`
    #[error("Tool call delta at `{path}` has no index")]
    MissingToolCallIndex { path: String },

    /// A tool call delta whose `index` is negative or not an integer
    #[error("Tool call index {index} is not a valid position")]
    InvalidToolCallIndex { index: String },

    /// A tool call position above the configured maximum
    #[error("Tool call index {index} exceeds the maximum of {max}")]
    ToolCallIndexOutOfRange { index: u32, max: u32 },

    /// A `tool_calls` entry that is not an object
    #[error("Tool call delta at `{path}` is not an object")]
    MalformedToolCall { path: String },

    /// The sequence ended before any fragment was processed
    #[error("Fragment sequence is empty; no metadata to build a response from")]
    EmptyStream,
}

impl From<serde_json::Error> for AggregateError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Result type for aggregation operations
pub type Result<T> = std::result::Result<T, AggregateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: AggregateError = json_err.into();
        assert!(matches!(err, AggregateError::Decode(_)));
    }

    #[test]
    fn test_field_conflict_names_path() {
        let err = AggregateError::FieldConflict {
            path: "tool_calls[0].function".to_string(),
            expected: "record",
            found: "string",
        };
        let msg = err.to_string();
        assert!(msg.contains("tool_calls[0].function"));
        assert!(msg.contains("record"));
    }
}
