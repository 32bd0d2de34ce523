//! `EngineConfig`: the environment-variable toggle surface (§6.6), parsed
//! once at startup rather than read ad hoc from `std::env` scattered through
//! the engine. Mirrors the teacher's [`crate::types::AgentConfig`]: a plain,
//! `serde`-deserializable struct a host can also populate from a config file.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::policies::HitlScope;

/// Tool-choice directive an orchestrator-tier planner should honor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoicePolicy {
    /// The planner may return a final answer or call a tool.
    Auto,
    /// The planner must call a tool; a bare final answer is a planning error.
    Required,
}

impl ToolChoicePolicy {
    fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "required" => Some(Self::Required),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Hard cap on planner-loop iterations before a worker gives up.
    pub max_iterations: usize,
    /// Which tools require human approval before execution.
    pub hitl_scope: HitlScope,
    /// Whether a worker's prompt includes its own action/observation/error
    /// trace for the current turn.
    pub include_execution_traces_in_prompt: bool,
    /// Whether a worker's prompt includes global observations posted by
    /// sibling workers.
    pub include_global_observations_in_prompt: bool,
    /// Whether prior-turn history is included in prompts at all, or each
    /// turn starts from a blank slate.
    pub include_history_in_prompt: bool,
    /// Maximum action/observation history entries retained for stagnation
    /// detection and prompt assembly.
    pub max_history_entries: usize,
    /// Observation payloads longer than this are truncated before being
    /// stored and shown to the planner.
    pub observation_truncation_len: usize,
    /// Whether the orchestrator's strategic planner is shown conversation
    /// history when a director context string is already present.
    pub strategic_planner_history_with_director_context: bool,
    /// Tool-choice directive the orchestrator's planner should honor.
    pub orchestrator_tool_choice: ToolChoicePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_iterations: 15,
            hitl_scope: HitlScope::Writes(HashSet::new()),
            include_execution_traces_in_prompt: true,
            include_global_observations_in_prompt: true,
            include_history_in_prompt: true,
            max_history_entries: 50,
            observation_truncation_len: 4000,
            strategic_planner_history_with_director_context: true,
            orchestrator_tool_choice: ToolChoicePolicy::Auto,
        }
    }
}

fn parse_bool_env(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(raw) => matches!(raw.to_lowercase().as_str(), "1" | "true" | "yes"),
        Err(_) => default,
    }
}

fn parse_usize_env(name: &str, default: usize) -> usize {
    std::env::var(name).ok().and_then(|raw| raw.parse().ok()).unwrap_or(default)
}

impl EngineConfig {
    /// Parses the full toggle surface from the process environment, falling
    /// back to [`EngineConfig::default`] for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let hitl_scope = match std::env::var("AGENTSM_HITL_SCOPE").map(|v| v.to_lowercase()) {
            Ok(scope) if scope == "all" => HitlScope::All,
            _ => {
                let tools: HashSet<String> = std::env::var("AGENTSM_HITL_WRITE_TOOLS")
                    .ok()
                    .map(|raw| raw.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
                    .unwrap_or_default();
                HitlScope::Writes(tools)
            }
        };

        let orchestrator_tool_choice = std::env::var("AGENTSM_ORCHESTRATOR_TOOL_CHOICE")
            .ok()
            .and_then(|raw| ToolChoicePolicy::from_str(&raw))
            .unwrap_or(defaults.orchestrator_tool_choice);

        Self {
            max_iterations: parse_usize_env("AGENTSM_MAX_ITERATIONS", defaults.max_iterations),
            hitl_scope,
            include_execution_traces_in_prompt: parse_bool_env(
                "AGENTSM_INCLUDE_EXECUTION_TRACES",
                defaults.include_execution_traces_in_prompt,
            ),
            include_global_observations_in_prompt: parse_bool_env(
                "AGENTSM_INCLUDE_GLOBAL_OBSERVATIONS",
                defaults.include_global_observations_in_prompt,
            ),
            include_history_in_prompt: parse_bool_env("AGENTSM_INCLUDE_HISTORY", defaults.include_history_in_prompt),
            max_history_entries: parse_usize_env("AGENTSM_MAX_HISTORY_ENTRIES", defaults.max_history_entries),
            observation_truncation_len: parse_usize_env(
                "AGENTSM_OBSERVATION_TRUNCATION_LEN",
                defaults.observation_truncation_len,
            ),
            strategic_planner_history_with_director_context: parse_bool_env(
                "AGENTSM_STRATEGIC_PLANNER_HISTORY_WITH_DIRECTOR_CONTEXT",
                defaults.strategic_planner_history_with_director_context,
            ),
            orchestrator_tool_choice,
        }
    }

    /// Truncates an observation's displayable text to this config's limit,
    /// matching the pattern already used by `ContextBuilder`'s fixed limits.
    pub fn truncate_observation(&self, text: &str) -> String {
        if text.len() <= self.observation_truncation_len {
            return text.to_string();
        }
        let mut truncated = text.chars().take(self.observation_truncation_len).collect::<String>();
        truncated.push_str("... (truncated)");
        truncated
    }
}
