//! Environment-default injection for tool arguments (§4.5, §2): when a
//! tool's schema expects a key the planner omitted or left as a placeholder,
//! and the process environment carries a value, that value is filled in
//! before the tool runs. Parameterized per tool by a small registration
//! (`env_var -> arg_key`), not hardcoded to any one domain key.

use std::collections::HashMap;

use serde_json::Value;

/// One `env_var -> arg_key` mapping for a single tool.
#[derive(Debug, Clone)]
struct Registration {
    arg_key: String,
    env_var: String,
}

/// A registry of per-tool environment-default registrations, consulted
/// during action execution.
#[derive(Default)]
pub struct EnvDefaultInjector {
    by_tool: HashMap<String, Vec<Registration>>,
}

impl EnvDefaultInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `env_var` as the environment-default source for `arg_key`
    /// on `tool_name`. A tool may have several registrations.
    pub fn register(&mut self, tool_name: impl Into<String>, arg_key: impl Into<String>, env_var: impl Into<String>) -> &mut Self {
        self.by_tool
            .entry(tool_name.into())
            .or_default()
            .push(Registration { arg_key: arg_key.into(), env_var: env_var.into() });
        self
    }

    /// Fills in `args` in place for every registration on `tool_name` whose
    /// key is missing or a placeholder (null or empty string) and whose
    /// environment variable carries a non-empty value.
    pub fn apply(&self, tool_name: &str, args: &mut HashMap<String, Value>) {
        let Some(registrations) = self.by_tool.get(tool_name) else { return };
        for registration in registrations {
            if !is_missing_or_placeholder(args.get(&registration.arg_key)) {
                continue;
            }
            if let Ok(value) = std::env::var(&registration.env_var) {
                if !value.is_empty() {
                    args.insert(registration.arg_key.clone(), Value::String(value));
                }
            }
        }
    }
}

fn is_missing_or_placeholder(value: Option<&Value>) -> bool {
    match value {
        None => true,
        Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        _ => false,
    }
}
