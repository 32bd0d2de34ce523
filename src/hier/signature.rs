//! Canonical-JSON signatures, shared by loop-prevention action dedup and the
//! HITL/job-store "already executed" bypass.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

/// Render a value with object keys sorted recursively, so semantically equal
/// maps always produce identical text regardless of insertion order.
pub fn canonical_json(value: &Value) -> String {
    serde_json::to_string(&canonicalize(value)).unwrap_or_default()
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> =
                map.iter().map(|(k, v)| (k.clone(), canonicalize(v))).collect();
            serde_json::to_value(sorted).unwrap_or(Value::Null)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Canonical signature for an action's arguments: `"{tool}:{canonical-json(args)}"`.
pub fn action_signature(tool_name: &str, args: &HashMap<String, Value>) -> String {
    let as_object: Value = serde_json::to_value(args).unwrap_or(Value::Null);
    format!("{tool_name}:{}", canonical_json(&as_object))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_json_is_stable_under_key_reordering() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(canonical_json(&a), canonical_json(&b));
    }

    #[test]
    fn canonical_json_recurses_into_nested_objects() {
        let a = json!({"outer": {"z": 1, "y": 2}});
        let b = json!({"outer": {"y": 2, "z": 1}});
        assert_eq!(canonical_json(&a), canonical_json(&b));
    }

    #[test]
    fn action_signature_matches_for_equal_args_regardless_of_order() {
        let mut a1 = HashMap::new();
        a1.insert("table".to_string(), json!("orders"));
        a1.insert("column".to_string(), json!("id"));
        let mut a2 = HashMap::new();
        a2.insert("column".to_string(), json!("id"));
        a2.insert("table".to_string(), json!("orders"));
        assert_eq!(action_signature("add_column", &a1), action_signature("add_column", &a2));
    }

    #[test]
    fn action_signature_differs_for_different_tools() {
        let args = HashMap::new();
        assert_ne!(action_signature("tool_a", &args), action_signature("tool_b", &args));
    }
}
