//! The central, process-scoped pre-execution deny filter (§4.4a), distinct
//! from the per-agent `Policies` of §4.4.
//!
//! Grounded on `services/policy.py`'s `PolicyEngine.evaluate`. Rule
//! *sourcing* (YAML files, a data-model service lookup) is out of scope per
//! SPEC_FULL §1; only the in-memory rule evaluation shape is kept.

use std::collections::HashMap;

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyVerdict {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl PolicyVerdict {
    pub fn allow() -> Self {
        Self { allowed: true, reason: None }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self { allowed: false, reason: Some(reason.into()) }
    }
}

/// A single deny rule: if `tool_name` matches and `predicate` returns true
/// for the given args, the action is denied with `message`.
pub struct DenyRule {
    pub tool_name: String,
    pub message: String,
    pub predicate: Box<dyn Fn(&HashMap<String, Value>) -> bool + Send + Sync>,
}

/// Lightweight, process-scoped policy engine for tool pre-execution checks.
#[derive(Default)]
pub struct PolicyEngine {
    rules: Vec<DenyRule>,
}

impl PolicyEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, rule: DenyRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn evaluate(&self, tool_name: &str, tool_args: &HashMap<String, Value>) -> PolicyVerdict {
        for rule in &self.rules {
            if rule.tool_name != tool_name {
                continue;
            }
            if (rule.predicate)(tool_args) {
                return PolicyVerdict::deny(rule.message.clone());
            }
        }
        PolicyVerdict::allow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_engine_allows_everything() {
        let engine = PolicyEngine::new();
        let verdict = engine.evaluate("add_relationship", &HashMap::new());
        assert!(verdict.allowed);
    }

    #[test]
    fn matching_rule_denies_with_message() {
        let engine = PolicyEngine::new().with_rule(DenyRule {
            tool_name: "add_relationship".to_string(),
            message: "missing column".to_string(),
            predicate: Box::new(|args| !args.contains_key("to_column")),
        });
        let mut args = HashMap::new();
        args.insert("from_column".to_string(), json!("id"));
        let verdict = engine.evaluate("add_relationship", &args);
        assert!(!verdict.allowed);
        assert_eq!(verdict.reason.as_deref(), Some("missing column"));
    }

    #[test]
    fn rule_for_a_different_tool_does_not_apply() {
        let engine = PolicyEngine::new().with_rule(DenyRule {
            tool_name: "add_relationship".to_string(),
            message: "denied".to_string(),
            predicate: Box::new(|_| true),
        });
        let verdict = engine.evaluate("list_columns", &HashMap::new());
        assert!(verdict.allowed);
    }
}
