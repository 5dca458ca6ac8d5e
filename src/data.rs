//! Structured-payload primitives: deep merge and list coercion.

use serde_json::{Map, Value};

/// Coerce a JSON value into a list.
///
/// `null` becomes the empty list, arrays pass through, and any other value
/// becomes a singleton. Callers use this to tolerate payloads that supply a
/// scalar where a list is expected (a single alias, a single foreign id).
#[must_use]
pub fn ensure_list(value: &Value) -> Vec<Value> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    }
}

/// Deep-merge two structured payloads, with `incoming` taking precedence.
///
/// - keys present on only one side pass through unchanged;
/// - two objects merge recursively;
/// - two arrays concatenate (base elements first) with duplicates removed
///   in first-seen order;
/// - an explicit `null` on the incoming side falls back to the base value;
/// - any other collision resolves to the incoming value.
///
/// The same primitive backs both `save` in merge mode (incoming payload
/// over the stored record) and the merge engine's data folding step
/// (survivor data over loser data).
#[must_use]
pub fn merge_data(base: &Value, incoming: &Value) -> Value {
    match (base, incoming) {
        (base, Value::Null) => base.clone(),
        (Value::Object(a), Value::Object(b)) => Value::Object(merge_maps(a, b)),
        (Value::Array(a), Value::Array(b)) => Value::Array(union_lists(a, b)),
        (_, incoming) => incoming.clone(),
    }
}

/// Deep-merge two JSON objects field-wise; see [`merge_data`].
#[must_use]
pub fn merge_maps(base: &Map<String, Value>, incoming: &Map<String, Value>) -> Map<String, Value> {
    let mut out = base.clone();
    for (key, value) in incoming {
        let merged = match out.get(key) {
            Some(existing) => merge_data(existing, value),
            None => value.clone(),
        };
        out.insert(key.clone(), merged);
    }
    out
}

fn union_lists(base: &[Value], incoming: &[Value]) -> Vec<Value> {
    let mut out: Vec<Value> = Vec::with_capacity(base.len() + incoming.len());
    for item in base.iter().chain(incoming) {
        if !out.contains(item) {
            out.push(item.clone());
        }
    }
    out
}
