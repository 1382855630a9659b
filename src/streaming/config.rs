//! Accumulator configuration.

use serde::{Deserialize, Serialize};

/// Highest tool call position accepted by default.
pub const DEFAULT_MAX_TOOL_CALL_INDEX: u32 = 1024;

/// Knobs for [`super::StreamingAccumulator`].
///
/// Deserializable so it can sit in a caller's own config file; missing keys
/// take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccumulatorConfig {
    /// Tool call positions above this are rejected. `None` disables the check.
    pub max_tool_call_index: Option<u32>,
    /// Skip fragments that fail to decode instead of aborting
    pub skip_undecodable: bool,
}

impl Default for AccumulatorConfig {
    fn default() -> Self {
        Self {
            max_tool_call_index: Some(DEFAULT_MAX_TOOL_CALL_INDEX),
            skip_undecodable: true,
        }
    }
}

impl AccumulatorConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the highest accepted tool call position
    pub fn with_max_tool_call_index(mut self, max: Option<u32>) -> Self {
        self.max_tool_call_index = max;
        self
    }

    /// Choose whether undecodable fragments are skipped
    pub fn with_skip_undecodable(mut self, skip: bool) -> Self {
        self.skip_undecodable = skip;
        self
    }
}
