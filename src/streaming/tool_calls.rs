//! Position-keyed tracking of partial tool calls.

use super::merge::{merge_fields, Record};
use crate::error::{AggregateError, Result};
use crate::{FunctionCall, ToolCall};
use serde_json::Value;
use std::collections::BTreeMap;

/// Fresh tool call record with every field the merge may touch declared.
fn tool_call_record() -> Record {
    Record::new()
        .with_text("id")
        .with_text("type")
        .with_record(
            "function",
            Record::new().with_text("name").with_text("arguments"),
        )
}

/// Tracks partial tool calls by their stream position.
///
/// Providers interleave several tool calls across fragments and only the
/// `index` ties a fragment to its call, so ids and names may be missing
/// from any given delta. Positions are only ever added or merged into.
#[derive(Debug, Default)]
pub struct ToolCallTracker {
    calls: BTreeMap<u32, Record>,
    max_index: Option<u32>,
}

impl ToolCallTracker {
    /// Create a tracker rejecting positions above `max_index`
    pub fn new(max_index: Option<u32>) -> Self {
        Self {
            calls: BTreeMap::new(),
            max_index,
        }
    }

    /// Number of distinct positions seen so far
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// Whether no tool call has been seen
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Merge one fragment's `tool_calls` list.
    pub fn apply(&mut self, entries: Vec<Value>) -> Result<()> {
        for (slot, entry) in entries.into_iter().enumerate() {
            let mut delta = match entry {
                Value::Object(map) => map,
                _ => {
                    return Err(AggregateError::MalformedToolCall {
                        path: format!("tool_calls[{slot}]"),
                    });
                }
            };

            let index = match delta.remove("index") {
                Some(raw) => self.position(raw)?,
                None => {
                    return Err(AggregateError::MissingToolCallIndex {
                        path: format!("tool_calls[{slot}]"),
                    });
                }
            };

            let id = delta.get("id").and_then(|id| id.as_str());
            tracing::debug!("Tool call delta - index: {}, id: {:?}", index, id);

            let record = self.calls.entry(index).or_insert_with(tool_call_record);

            // `type` is an enum label, not streamed text.
            if matches!(delta.get("type"), Some(Value::String(_))) {
                record.reset_text("type");
            }

            merge_fields(record, &delta, &format!("tool_calls[{index}]"))?;
        }

        Ok(())
    }

    fn position(&self, raw: Value) -> Result<u32> {
        let index = match &raw {
            Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            Value::String(s) => s.trim().parse::<u32>().ok(),
            _ => None,
        }
        .ok_or_else(|| AggregateError::InvalidToolCallIndex {
            index: raw.to_string(),
        })?;

        match self.max_index {
            Some(max) if index > max => Err(AggregateError::ToolCallIndexOutOfRange { index, max }),
            _ => Ok(index),
        }
    }

    /// Convert the tracked calls into a dense list in ascending position order.
    ///
    /// Returns `None` when no tool call was seen.
    pub fn finish(self) -> Option<Vec<ToolCall>> {
        if self.calls.is_empty() {
            return None;
        }

        Some(
            self.calls
                .into_values()
                .map(|record| {
                    let (name, arguments) = record
                        .record("function")
                        .map(|f| (f.text("name").to_string(), f.text("arguments").to_string()))
                        .unwrap_or_default();
                    ToolCall {
                        id: record.text("id").to_string(),
                        r#type: record.text("type").to_string(),
                        function: FunctionCall { name, arguments },
                    }
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entries(value: Value) -> Vec<Value> {
        match value {
            Value::Array(items) => items,
            other => panic!("expected array, got {other}"),
        }
    }

    #[test]
    fn test_fragments_merge_by_position() {
        let mut tracker = ToolCallTracker::new(None);
        tracker
            .apply(entries(json!([{"index": 0, "id": "call_1", "type": "function",
                "function": {"name": "search", "arguments": "{\"q\":"}}])))
            .unwrap();
        tracker
            .apply(entries(json!([{"index": 0, "function": {"arguments": "\"rust\"}"}}])))
            .unwrap();

        let calls = tracker.finish().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_1");
        assert_eq!(calls[0].r#type, "function");
        assert_eq!(calls[0].function.name, "search");
        assert_eq!(calls[0].function.arguments, "{\"q\":\"rust\"}");
    }

    #[test]
    fn test_type_overrides_instead_of_appending() {
        let mut tracker = ToolCallTracker::new(None);
        tracker
            .apply(entries(json!([{"index": 0, "type": "function"}])))
            .unwrap();
        tracker
            .apply(entries(json!([{"index": 0, "type": "function"}])))
            .unwrap();

        let calls = tracker.finish().unwrap();
        assert_eq!(calls[0].r#type, "function");
    }

    #[test]
    fn test_sparse_positions_are_ordered() {
        let mut tracker = ToolCallTracker::new(None);
        tracker.apply(entries(json!([{"index": 3, "id": "c"}]))).unwrap();
        tracker.apply(entries(json!([{"index": 1, "id": "a"}]))).unwrap();

        let ids: Vec<_> = tracker.finish().unwrap().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn test_every_entry_in_a_list_is_applied() {
        let mut tracker = ToolCallTracker::new(None);
        tracker
            .apply(entries(json!([{"index": 0, "id": "a"}, {"index": 1, "id": "b"}])))
            .unwrap();
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn test_string_index_is_accepted() {
        let mut tracker = ToolCallTracker::new(None);
        tracker.apply(entries(json!([{"index": "2", "id": "x"}]))).unwrap();
        assert_eq!(tracker.finish().unwrap()[0].id, "x");
    }

    #[test]
    fn test_missing_index_is_rejected() {
        let mut tracker = ToolCallTracker::new(None);
        let err = tracker.apply(entries(json!([{"id": "x"}]))).unwrap_err();
        assert!(matches!(err, AggregateError::MissingToolCallIndex { .. }));
    }

    #[test]
    fn test_negative_index_is_rejected() {
        let mut tracker = ToolCallTracker::new(None);
        let err = tracker.apply(entries(json!([{"index": -1}]))).unwrap_err();
        assert_eq!(
            err,
            AggregateError::InvalidToolCallIndex {
                index: "-1".to_string()
            }
        );
    }

    #[test]
    fn test_index_above_limit_is_rejected() {
        let mut tracker = ToolCallTracker::new(Some(8));
        let err = tracker.apply(entries(json!([{"index": 9}]))).unwrap_err();
        assert_eq!(err, AggregateError::ToolCallIndexOutOfRange { index: 9, max: 8 });
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_non_object_entry_is_rejected() {
        let mut tracker = ToolCallTracker::new(None);
        let err = tracker.apply(entries(json!(["call"]))).unwrap_err();
        assert!(matches!(err, AggregateError::MalformedToolCall { .. }));
    }

    #[test]
    fn test_failed_entry_keeps_known_positions() {
        let mut tracker = ToolCallTracker::new(Some(4));
        tracker
            .apply(entries(json!([{"index": 0, "id": "a"}, {"index": 2, "id": "b"}])))
            .unwrap();

        assert!(tracker.apply(entries(json!([{"index": 9}]))).is_err());
        assert!(tracker.apply(entries(json!([{"index": 2, "function": "x"}]))).is_err());

        let ids: Vec<_> = tracker.finish().unwrap().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_empty_tracker_finishes_to_none() {
        assert!(ToolCallTracker::new(None).finish().is_none());
    }
}
