//! Core data model for the hierarchical engine: actions, final responses, the
//! append-only message union, plans, and persisted jobs.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A request to invoke a tool. Immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Action {
    pub tool_name: String,
    pub tool_args: HashMap<String, Value>,
}

impl Action {
    pub fn new(tool_name: impl Into<String>, tool_args: HashMap<String, Value>) -> Self {
        Self { tool_name: tool_name.into(), tool_args }
    }
}

/// A structured result returned up the tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinalResponse {
    pub operation: String,
    pub payload: Value,
    pub human_readable_summary: String,
}

impl FinalResponse {
    pub fn new(operation: impl Into<String>, payload: Value, summary: impl Into<String>) -> Self {
        Self { operation: operation.into(), payload, human_readable_summary: summary.into() }
    }

    pub fn display_message(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new("display_message", serde_json::json!({ "message": message.clone() }), message)
    }

    pub fn error_message(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(
            "display_message",
            serde_json::json!({ "message": message.clone(), "error": true }),
            message,
        )
    }

    pub fn stagnation(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::new(
            "display_message",
            serde_json::json!({ "message": reason.clone(), "error": true, "stagnation": true }),
            reason,
        )
    }

    pub fn await_approval(tool: &str, args: &HashMap<String, Value>, message: impl Into<String>, reason: impl Into<String>) -> Self {
        let message = message.into();
        let reason = reason.into();
        Self::new(
            "await_approval",
            serde_json::json!({ "tool": tool, "args": args, "message": message, "reason": reason }),
            format!("Waiting for approval: {tool}"),
        )
    }

    pub fn display_table(title: impl Into<String>, headers: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let title = title.into();
        Self::new(
            "display_table",
            serde_json::json!({ "title": title, "headers": headers, "rows": rows }),
            "table result",
        )
    }

    pub fn is_error(&self) -> bool {
        self.payload.get("error").and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn is_approval_request(&self) -> bool {
        self.operation == "await_approval"
    }
}

/// The enumerated message type tags (§3.1).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    UserMessage,
    AssistantMessage,
    Task,
    Action,
    Observation,
    Error,
    Final,
    Synthesis,
    StrategicPlan,
    SuggestedPlan,
    ScriptPlan,
    ScriptInstruction,
    DirectorContext,
    InjectedContext,
    Delegation,
    GlobalObservation,
}

impl MessageType {
    pub fn is_conversation(&self) -> bool {
        matches!(self, MessageType::UserMessage | MessageType::AssistantMessage)
    }

    pub fn is_execution_trace(&self) -> bool {
        matches!(self, MessageType::Action | MessageType::Observation | MessageType::Error)
    }
}

/// An append-only memory entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub type_: MessageType,
    pub content: Value,
    pub timestamp: DateTime<Utc>,
    pub turn_id: Option<String>,
    pub phase_id: Option<usize>,
    pub tool: Option<String>,
    pub args: Option<HashMap<String, Value>>,
    pub from_manager: Option<String>,
    pub from_worker: Option<String>,
    pub summary: Option<String>,
}

impl Message {
    pub fn new(type_: MessageType, content: Value) -> Self {
        Self {
            type_,
            content,
            timestamp: Utc::now(),
            turn_id: None,
            phase_id: None,
            tool: None,
            args: None,
            from_manager: None,
            from_worker: None,
            summary: None,
        }
    }

    pub fn with_phase_id(mut self, phase_id: usize) -> Self {
        self.phase_id = Some(phase_id);
        self
    }

    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = Some(tool.into());
        self
    }

    pub fn task(content: impl Into<String>) -> Self {
        Self::new(MessageType::Task, Value::String(content.into()))
    }

    pub fn action(action: &Action) -> Self {
        let mut m = Self::new(MessageType::Action, serde_json::to_value(action).unwrap_or(Value::Null));
        m.tool = Some(action.tool_name.clone());
        m.args = Some(action.tool_args.clone());
        m
    }

    pub fn observation(content: Value) -> Self {
        Self::new(MessageType::Observation, content)
    }

    pub fn global_observation(from_worker: impl Into<String>, summary: impl Into<String>, content: Value) -> Self {
        let mut m = Self::new(MessageType::GlobalObservation, content);
        m.from_worker = Some(from_worker.into());
        m.summary = Some(summary.into());
        m
    }
}

/// One phase of a strategic plan.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Phase {
    pub name: String,
    pub worker: String,
    pub goals: String,
    pub notes: Option<String>,
}

/// A strategic plan: an ordered list of phases, each owned by exactly one worker.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StrategicPlan {
    pub primary_worker: Option<String>,
    pub task_type: Option<String>,
    pub phases: Vec<Phase>,
    pub rationale: Option<String>,
}

impl StrategicPlan {
    pub fn single_step(&self, index: usize) -> Option<StrategicPlan> {
        self.phases.get(index).map(|phase| StrategicPlan {
            primary_worker: Some(phase.worker.clone()),
            task_type: self.task_type.clone(),
            phases: vec![phase.clone()],
            rationale: None,
        })
    }
}

/// Execution mode for a script step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Direct,
    Guided,
}

/// One entry in a manager-generated script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptStep {
    pub name: String,
    pub worker: String,
    pub tool_name: Option<String>,
    pub args: Option<HashMap<String, Value>>,
    pub execution_mode: ExecutionMode,
    pub notes: Option<String>,
}

/// A script plan: a deterministic, ordered list of steps.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ScriptPlan {
    pub thought: Option<String>,
    pub script: Vec<ScriptStep>,
}

/// What a planner returns for a given turn (§4.7, §6.3).
#[derive(Debug, Clone)]
pub enum PlanOutcome {
    Final(FinalResponse),
    Single(Action),
    Many(Vec<Action>),
}

impl PlanOutcome {
    /// Normalize into a list of actions. `None` when the outcome is a `FinalResponse`.
    pub fn into_actions(self) -> Option<Vec<Action>> {
        match self {
            PlanOutcome::Final(_) => None,
            PlanOutcome::Single(a) => Some(vec![a]),
            PlanOutcome::Many(actions) => Some(actions),
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, PlanOutcome::Final(_))
    }

    pub fn is_batch(&self) -> bool {
        matches!(self, PlanOutcome::Many(_))
    }
}

/// A pending tool invocation awaiting human approval, persisted by the job store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingAction {
    pub worker: String,
    pub tool: String,
    pub args: HashMap<String, Value>,
    pub manager: Option<String>,
    pub resume_token: Option<String>,
}

/// Job status (§3.1).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    AwaitingApproval,
    Paused,
    Completed,
}

/// A persistent record keyed by job id (§3.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub status: JobStatus,
    pub orchestrator_plan: Option<StrategicPlan>,
    pub manager_plans: HashMap<String, StrategicPlan>,
    pub phase_index_by_manager: HashMap<String, usize>,
    pub pending_action: Option<PendingAction>,
    pub approvals: HashMap<String, bool>,
    pub executed_actions: Vec<String>,
    pub last_result_summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(job_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            job_id: job_id.into(),
            status: JobStatus::Running,
            orchestrator_plan: None,
            manager_plans: HashMap::new(),
            phase_index_by_manager: HashMap::new(),
            pending_action: None,
            approvals: HashMap::new(),
            executed_actions: Vec::new(),
            last_result_summary: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategic_plan_single_step_isolates_one_phase() {
        let plan = StrategicPlan {
            primary_worker: Some("orig".into()),
            task_type: None,
            phases: vec![
                Phase { name: "a".into(), worker: "w1".into(), goals: "g1".into(), notes: None },
                Phase { name: "b".into(), worker: "w2".into(), goals: "g2".into(), notes: None },
            ],
            rationale: None,
        };
        let step = plan.single_step(1).unwrap();
        assert_eq!(step.phases.len(), 1);
        assert_eq!(step.phases[0].worker, "w2");
        assert_eq!(step.primary_worker.as_deref(), Some("w2"));
    }

    #[test]
    fn plan_outcome_final_has_no_actions() {
        let outcome = PlanOutcome::Final(FinalResponse::display_message("done"));
        assert!(outcome.into_actions().is_none());
    }

    #[test]
    fn final_response_is_error_flag() {
        let r = FinalResponse::stagnation("looping");
        assert!(r.is_error());
        assert_eq!(r.payload["stagnation"], Value::Bool(true));
    }
}
