//! `Planner`: turns the current turn's history into the next `PlanOutcome`
//! (§4.7). Two implementations ship: a deterministic `ScriptedPlanner` that
//! walks a pre-authored [`ScriptPlan`], and an `LlmPlanner` adapter wrapping
//! the teacher's existing [`crate::llm::AsyncLlmCaller`].

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::llm::AsyncLlmCaller;
use crate::memory::AgentMemory;
use crate::tools::ToolRegistry;
use crate::types::{LlmResponse, ToolCall};

use super::model::{Action, ExecutionMode, FinalResponse, Message, PlanOutcome, ScriptPlan, ScriptStep};

#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, task: &str, history: &[Message], tools: &ToolRegistry) -> Result<PlanOutcome, String>;
}

fn tool_call_to_action(call: ToolCall) -> Action {
    Action::new(call.name, call.args)
}

/// Wraps any [`AsyncLlmCaller`] so it can serve as a `Planner`. Builds a
/// disposable [`AgentMemory`] from `task`/`history` per call; the memory's
/// `history` field is left empty since conversation context is already
/// carried by the caller-supplied `history` of hierarchy `Message`s, which
/// `build_messages` does not know how to render — instead the rendered
/// history is appended to the system prompt.
pub struct LlmPlanner<C: AsyncLlmCaller> {
    caller: C,
    model: String,
    system_prompt: String,
}

impl<C: AsyncLlmCaller> LlmPlanner<C> {
    pub fn new(caller: C, model: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self { caller, model: model.into(), system_prompt: system_prompt.into() }
    }

    fn render_history(history: &[Message]) -> String {
        history
            .iter()
            .map(|m| format!("[{:?}] {}", m.type_, m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl<C: AsyncLlmCaller> Planner for LlmPlanner<C> {
    async fn plan(&self, task: &str, history: &[Message], tools: &ToolRegistry) -> Result<PlanOutcome, String> {
        let rendered = Self::render_history(history);
        let system_prompt = if rendered.is_empty() {
            self.system_prompt.clone()
        } else {
            format!("{}\n\n== Turn History ==\n{rendered}", self.system_prompt)
        };
        let memory = AgentMemory::new(task).with_system_prompt(system_prompt);
        let response = self.caller.call_async(&memory, tools, &self.model).await?;
        Ok(match response {
            LlmResponse::ToolCall { tool, .. } => PlanOutcome::Single(tool_call_to_action(tool)),
            LlmResponse::ParallelToolCalls { tools, .. } => {
                PlanOutcome::Many(tools.into_iter().map(tool_call_to_action).collect())
            }
            LlmResponse::FinalAnswer { content, .. } => PlanOutcome::Final(FinalResponse::display_message(content)),
        })
    }
}

/// Walks a fixed [`ScriptPlan`] one step per call, with no LLM involved.
/// Grounded on the script-execution path of `core/manager_v2.py` /
/// `core/agent.py`'s direct-mode steps.
pub struct ScriptedPlanner {
    plan: ScriptPlan,
    cursor: std::sync::atomic::AtomicUsize,
}

impl ScriptedPlanner {
    pub fn new(plan: ScriptPlan) -> Self {
        Self { plan, cursor: std::sync::atomic::AtomicUsize::new(0) }
    }

    fn step_to_action(step: &ScriptStep) -> Result<Action, String> {
        match step.execution_mode {
            ExecutionMode::Direct => {
                let tool_name = step.tool_name.clone().ok_or_else(|| format!("script step '{}' is Direct but has no tool_name", step.name))?;
                Ok(Action::new(tool_name, step.args.clone().unwrap_or_default()))
            }
            ExecutionMode::Guided => Err(format!("script step '{}' is Guided and requires an LLM planner, not ScriptedPlanner", step.name)),
        }
    }
}

#[async_trait]
impl Planner for ScriptedPlanner {
    async fn plan(&self, _task: &str, _history: &[Message], _tools: &ToolRegistry) -> Result<PlanOutcome, String> {
        let index = self.cursor.load(std::sync::atomic::Ordering::SeqCst);
        let Some(step) = self.plan.script.get(index) else {
            return Ok(PlanOutcome::Final(FinalResponse::new(
                "script_complete",
                Value::Null,
                "All script steps executed.",
            )));
        };
        self.cursor.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let action = Self::step_to_action(step)?;
        Ok(PlanOutcome::Single(action))
    }
}

#[allow(dead_code)]
fn _assert_actions_map(_: &HashMap<String, Value>) {}
