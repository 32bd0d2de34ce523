//! Validates a tool's `tool_args` against its registered JSON Schema before
//! execution (§4.5). Grounded on the `jsonschema` crate usage pattern from
//! the `siumai-extras` schema validator: compile once per call with
//! `jsonschema::validator_for`, collect the first few error messages via
//! `iter_errors`.

use serde_json::Value;

/// Validates `instance` against `schema`. A non-object schema (e.g. `{}`,
/// meaning "anything goes") always passes. Returns `Err` with up to three
/// joined validation error messages on failure.
pub fn validate_tool_args(schema: &Value, instance: &Value) -> Result<(), String> {
    if !schema.is_object() || schema.as_object().map(|m| m.is_empty()).unwrap_or(false) {
        return Ok(());
    }

    let compiled = jsonschema::validator_for(schema).map_err(|e| format!("invalid tool schema: {e}"))?;

    if compiled.validate(instance).is_err() {
        let messages: Vec<String> = compiled
            .iter_errors(instance)
            .take(3)
            .map(|err| format!("{err} at {}", err.instance_path))
            .collect();
        return Err(messages.join("; "));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_schema_accepts_anything() {
        assert!(validate_tool_args(&json!({}), &json!({"whatever": 1})).is_ok());
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let schema = json!({
            "type": "object",
            "properties": { "table": { "type": "string" } },
            "required": ["table"],
        });
        assert!(validate_tool_args(&schema, &json!({})).is_err());
        assert!(validate_tool_args(&schema, &json!({"table": "orders"})).is_ok());
    }

    #[test]
    fn wrong_type_is_rejected() {
        let schema = json!({
            "type": "object",
            "properties": { "limit": { "type": "integer" } },
        });
        assert!(validate_tool_args(&schema, &json!({"limit": "ten"})).is_err());
        assert!(validate_tool_args(&schema, &json!({"limit": 10})).is_ok());
    }
}
