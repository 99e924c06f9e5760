//! Record-id normalization
//!
//! SurrealDB hands record ids back in one of two shapes depending on how a
//! row is decoded: the serialized `Thing` object
//! (`{"tb": "users", "id": {"String": "k1"}}`) or the display string with
//! escaped keys (`users:⟨k1⟩`). Everything above the store works with the
//! plain `table:key` string.

use crate::{Result, StoreError};
use serde_json::{Map, Value};

/// Rewrite every record id in `document` into its `table:key` string form
///
/// Children are normalized before their parent is inspected, so a record id
/// nested inside another one is collapsed in a single pass and repeated
/// calls are no-ops.
pub fn normalize(document: Value) -> Value {
    match document {
        Value::Object(map) => {
            let map: Map<String, Value> = map
                .into_iter()
                .map(|(key, value)| {
                    let value = normalize(value);
                    let value = if key == "id" { unescape_id(value) } else { value };
                    (key, value)
                })
                .collect();

            match thing_string(&map) {
                Some(id) => Value::String(id),
                None => Value::Object(map),
            }
        }
        Value::Array(items) => Value::Array(items.into_iter().map(normalize).collect()),
        other => other,
    }
}

/// Split a normalized record id into `(table, key)`
pub fn split_record_id(id: &str) -> Result<(&str, &str)> {
    match id.split_once(':') {
        Some((table, key)) if !table.is_empty() && !key.is_empty() => Ok((table, key)),
        _ => Err(StoreError::InvalidRecordId(id.to_string())),
    }
}

/// `Some("table:key")` if `map` is a serialized `Thing`
fn thing_string(map: &Map<String, Value>) -> Option<String> {
    if map.len() != 2 {
        return None;
    }
    let table = map.get("tb")?.as_str()?;
    let key = id_key(map.get("id")?)?;
    Some(format!("{table}:{key}"))
}

/// Raw key of a serialized `Id`
fn id_key(id: &Value) -> Option<String> {
    match id {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        // Externally tagged enum: {"String": "k"}, {"Number": 7}, {"Uuid": "..."}
        Value::Object(variant) if variant.len() == 1 => {
            let (_, inner) = variant.iter().next()?;
            match inner {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                other => Some(other.to_string()),
            }
        }
        _ => None,
    }
}

/// Strip key escaping from a `table:⟨key⟩` or ``table:`key` `` id string
fn unescape_id(value: Value) -> Value {
    let Value::String(id) = value else {
        return value;
    };
    let Some((table, key)) = id.split_once(':') else {
        return Value::String(id);
    };

    let mut key = key;
    loop {
        let stripped = key
            .strip_prefix('⟨')
            .and_then(|k| k.strip_suffix('⟩'))
            .or_else(|| key.strip_prefix('`').and_then(|k| k.strip_suffix('`')));
        match stripped {
            Some(inner) => key = inner,
            None => break,
        }
    }

    Value::String(format!("{table}:{key}"))
}
