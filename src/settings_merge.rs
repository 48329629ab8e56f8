//! Deep merge of a settings document with an incoming fragment.
//!
//! Objects merge key by key, scalars from the fragment win, and arrays merge
//! by hook-command identity so that re-running the installer never registers
//! the same hook twice.

use serde_json::{Map, Value};

/// Merge `incoming` into `existing`, returning the combined document.
///
/// Keys only present in `existing` keep their value and position; keys new to
/// the document are appended in fragment order. The operation is total and
/// idempotent: `merge(&merge(d, f), f) == merge(d, f)`.
pub fn merge(existing: &Value, incoming: &Value) -> Value {
    match incoming {
        Value::Object(incoming_map) => {
            let mut out = match existing {
                Value::Object(existing_map) => existing_map.clone(),
                Value::Null
                | Value::Bool(_)
                | Value::Number(_)
                | Value::String(_)
                | Value::Array(_) => Map::new(),
            };
            for (key, incoming_value) in incoming_map {
                let merged = match out.get(key) {
                    Some(current) => merge(current, incoming_value),
                    None => merge(&Value::Null, incoming_value),
                };
                out.insert(key.clone(), merged);
            }
            Value::Object(out)
        }
        Value::Array(incoming_items) => {
            let base = match existing {
                Value::Array(items) => items.as_slice(),
                _ => &[],
            };
            Value::Array(merge_arrays(base, incoming_items))
        }
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => incoming.clone(),
    }
}

/// Append every incoming item that is not already represented in `existing`.
///
/// Each incoming item is checked against the growing result, so duplicates
/// inside the fragment itself collapse as well.
pub fn merge_arrays(existing: &[Value], incoming: &[Value]) -> Vec<Value> {
    let mut out = existing.to_vec();
    for item in incoming {
        if !is_duplicate(&out, item) {
            out.push(item.clone());
        }
    }
    out
}

fn is_duplicate(present: &[Value], item: &Value) -> bool {
    match hook_commands(item) {
        // Matched against every present group, whatever its event or matcher.
        Some(commands) if !commands.is_empty() => present.iter().any(|candidate| {
            hook_commands(candidate)
                .map(|existing| commands.iter().any(|c| existing.contains(c)))
                .unwrap_or(false)
        }),
        _ => present.contains(item),
    }
}

/// Commands of a hook group, or `None` when the value carries no `hooks` list.
fn hook_commands(group: &Value) -> Option<Vec<&str>> {
    let hooks = group.get("hooks")?.as_array()?;
    Some(
        hooks
            .iter()
            .filter_map(|hook| hook.get("command").and_then(Value::as_str))
            .collect(),
    )
}

/// Number of hook groups present in `merged` that were not in `original`,
/// counted over every event under the top-level `hooks` object.
pub fn added_hook_groups(original: &Value, merged: &Value) -> usize {
    let Some(events) = merged.get("hooks").and_then(Value::as_object) else {
        return 0;
    };
    events
        .iter()
        .map(|(event, groups)| {
            let after = groups.as_array().map(Vec::len).unwrap_or(0);
            let before = original
                .get("hooks")
                .and_then(|h| h.get(event))
                .and_then(Value::as_array)
                .map(Vec::len)
                .unwrap_or(0);
            after.saturating_sub(before)
        })
        .sum()
}
