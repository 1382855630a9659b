//! Shape-aware deep merge of partial JSON records.
//!
//! The accumulator declares the shape of every field up front: either an
//! append-only [`Field::Text`] or a nested [`Field::Record`]. Incoming delta
//! values are dispatched on that declared shape, never guessed from the
//! value alone.

use crate::error::{AggregateError, Result};
use serde_json::{Map, Value};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// A single accumulated field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    /// Append-only text
    Text(String),
    /// Nested record merged key by key
    Record(Record),
}

impl Field {
    fn shape(&self) -> &'static str {
        match self {
            Self::Text(_) => "string",
            Self::Record(_) => "record",
        }
    }
}

/// A record being accumulated across fragments.
///
/// `present` stays false until some fragment merges into the record, which
/// lets a pre-seeded record such as `function_call` still report null.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: BTreeMap<String, Field>,
    present: bool,
}

impl Record {
    /// Create an empty, not-yet-present record
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an empty text field
    pub fn with_text(mut self, key: impl Into<String>) -> Self {
        self.fields.insert(key.into(), Field::Text(String::new()));
        self
    }

    /// Declare a nested record field
    pub fn with_record(mut self, key: impl Into<String>, record: Record) -> Self {
        self.fields.insert(key.into(), Field::Record(record));
        self
    }

    /// Text accumulated under `key`, or `""` when absent or not text
    pub fn text(&self, key: &str) -> &str {
        match self.fields.get(key) {
            Some(Field::Text(text)) => text,
            _ => "",
        }
    }

    /// Nested record under `key`
    pub fn record(&self, key: &str) -> Option<&Record> {
        match self.fields.get(key) {
            Some(Field::Record(record)) => Some(record),
            _ => None,
        }
    }

    /// Whether any fragment has merged into this record
    pub fn is_present(&self) -> bool {
        self.present
    }

    /// Reset a text field to empty so the next merge replaces it
    pub fn reset_text(&mut self, key: &str) {
        if let Some(Field::Text(text)) = self.fields.get_mut(key) {
            text.clear();
        }
    }
}

/// Merge `source` into `target` in place.
///
/// Strings append, objects recurse into declared records, everything else
/// (null, numbers, booleans, arrays) is skipped. `path` prefixes field
/// names in error messages and may be empty for the top level.
pub fn merge_fields(target: &mut Record, source: &Map<String, Value>, path: &str) -> Result<()> {
    target.present = true;

    for (key, value) in source {
        match value {
            Value::String(increment) => match target.fields.entry(key.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(Field::Text(increment.clone()));
                }
                Entry::Occupied(slot) => match slot.into_mut() {
                    Field::Text(text) => text.push_str(increment),
                    field => {
                        return Err(AggregateError::FieldConflict {
                            path: field_path(path, key),
                            expected: field.shape(),
                            found: "string",
                        });
                    }
                },
            },
            Value::Object(nested) => match target.fields.get_mut(key) {
                Some(Field::Record(record)) => {
                    merge_fields(record, nested, &field_path(path, key))?;
                }
                Some(field) => {
                    return Err(AggregateError::FieldConflict {
                        path: field_path(path, key),
                        expected: field.shape(),
                        found: "record",
                    });
                }
                None => {
                    return Err(AggregateError::UnknownRecordField {
                        path: field_path(path, key),
                    });
                }
            },
            _ => {}
        }
    }

    Ok(())
}

fn field_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}
