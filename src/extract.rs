//! Fenced JSON extraction from model output.
//!
//! Models asked for structured output often wrap it in a markdown code
//! fence. These helpers pull the last ```` ```json ```` block out of the
//! assembled text.

use regex::Regex;
use std::sync::OnceLock;

fn json_fence() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| {
            // Non-greedy so consecutive blocks don't swallow each other.
            Regex::new(r"(?s)```json(.*?)```").ok()
        })
        .as_ref()
}

/// Return the trimmed content of the last ```` ```json ```` block in `text`,
/// or an empty string when there is none.
pub fn extract_json_block(text: &str) -> String {
    json_fence()
        .and_then(|fence| fence.captures_iter(text).last())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

/// Extract the last ```` ```json ```` block and parse it.
pub fn parse_json_block(text: &str) -> serde_json::Result<serde_json::Value> {
    serde_json::from_str(&extract_json_block(text))
}
