//! Helpers for pulling record arrays out of upstream JSON envelopes.

use crate::error::AdapterError;
use serde_json::Value;

/// Walks `path` and returns the array found there.
///
/// A missing key or `null` along the way reads as an empty result, since
/// upstreams omit empty collections. Anything else that is not an object
/// (on the way) or an array (at the end) is a decode error.
pub fn array_at(endpoint: &str, root: &Value, path: &[&str]) -> Result<Vec<Value>, AdapterError> {
    let mut current = root;
    for (depth, key) in path.iter().enumerate() {
        match current {
            Value::Null => return Ok(Vec::new()),
            Value::Object(map) => match map.get(*key) {
                Some(next) => current = next,
                None => return Ok(Vec::new()),
            },
            other => {
                return Err(AdapterError::decode(
                    endpoint,
                    format!(
                        "expected object at '{}', found {}",
                        path[..depth].join("."),
                        kind(other)
                    ),
                ));
            }
        }
    }

    match current {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items.clone()),
        other => Err(AdapterError::decode(
            endpoint,
            format!("expected array at '{}', found {}", path.join("."), kind(other)),
        )),
    }
}

pub fn string_at<'a>(root: &'a Value, path: &[&str]) -> Option<&'a str> {
    path.iter()
        .try_fold(root, |node, key| node.get(*key))
        .and_then(Value::as_str)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
