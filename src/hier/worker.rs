//! `WorkerAgent`: runs the policy-driven plan/act/observe loop for a single
//! leaf agent (§4.5). Grounded step-for-step on `core/agent.py`'s `run` and
//! `_execute_actions`; OpenTelemetry spans and Pydantic arg validation from
//! the original are out of scope (SPEC_FULL §1) and replaced by this crate's
//! `tracing` usage and JSON Schema validation via the `jsonschema` crate.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use serde_json::Value;

use crate::tools::ToolRegistry;

use super::bus::{Actor, EventBus};
use super::config::EngineConfig;
use super::env_defaults::EnvDefaultInjector;
use super::job_store::JobStore;
use super::model::{Action, FinalResponse, Message, MessageType, PlanOutcome, ScriptPlan};
use super::planner::Planner;
use super::policies::{PolicyContext, PolicyEngine, PolicySet};
use super::request_context;
use super::schema_validation::validate_tool_args;
use super::signature::action_signature;
use super::store::SharedStateStore;

pub struct WorkerAgent {
    pub name: String,
    pub version: String,
    planner: Box<dyn Planner>,
    tools: ToolRegistry,
    policies: PolicySet,
    policy_engine: Arc<PolicyEngine>,
    store: Arc<SharedStateStore>,
    event_bus: Arc<EventBus>,
    job_store: Option<Arc<dyn JobStore>>,
    env_defaults: EnvDefaultInjector,
    config: EngineConfig,
}

impl WorkerAgent {
    pub fn new(
        name: impl Into<String>,
        planner: Box<dyn Planner>,
        tools: ToolRegistry,
        policies: PolicySet,
        policy_engine: Arc<PolicyEngine>,
        store: Arc<SharedStateStore>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            name: name.into(),
            version: "1".to_string(),
            planner,
            tools,
            policies,
            policy_engine,
            store,
            event_bus,
            job_store: None,
            env_defaults: EnvDefaultInjector::new(),
            config: EngineConfig::default(),
        }
    }

    pub fn with_job_store(mut self, job_store: Arc<dyn JobStore>) -> Self {
        self.job_store = Some(job_store);
        self
    }

    pub fn with_env_defaults(mut self, env_defaults: EnvDefaultInjector) -> Self {
        self.env_defaults = env_defaults;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    fn actor(&self) -> Actor {
        Actor::new("worker", self.name.clone())
    }

    /// Builds a `PolicyContext` from the current request context, refreshed
    /// at the top of every loop iteration so a pending approval granted
    /// mid-run is visible on the very next pass (§4.5 step 10, §4.4a).
    fn context_from_request(&self) -> PolicyContext {
        let job_id = request_context::get_from_context(|c| c.job_id.clone()).flatten();
        let approvals = request_context::get_from_context(|c| c.approvals.clone()).unwrap_or_default();
        PolicyContext { job_id, approvals, last_result: None, last_tool: None }
    }

    fn publish_error(&self, message: impl Into<String>, detail: Value) {
        self.event_bus.publish("error", serde_json::json!({ "agent_name": self.name, "message": message.into(), "detail": detail }));
    }

    /// Executes `task` to completion, either via the iterative planner loop
    /// or, if `script` is given, by walking it deterministically.
    pub async fn run(&self, namespace: &str, task: &str, script: Option<ScriptPlan>, suggested_plan: Option<Value>) -> FinalResponse {
        self.event_bus.publish(
            "agent_start",
            serde_json::json!({ "task": task, "agent_name": self.name, "agent_version": self.version }),
        );

        self.store.append_agent(namespace, &self.name, Message::task(task));

        if let Some(script) = script {
            return self.run_script_mode(namespace, task, script).await;
        }

        let planner_task = match suggested_plan {
            Some(plan) => {
                self.store.append_agent(namespace, &self.name, Message::new(MessageType::SuggestedPlan, plan.clone()));
                augment_task_with_plan(task, &plan)
            }
            None => task.to_string(),
        };

        self.run_planner_loop(namespace, &planner_task).await
    }

    async fn run_planner_loop(&self, namespace: &str, task: &str) -> FinalResponse {
        let mut iteration: usize = 0;
        let history_cap = self.config.max_history_entries;
        let mut action_history: VecDeque<Action> = VecDeque::new();
        let mut observation_history: VecDeque<Value> = VecDeque::new();
        let mut last_final: Option<FinalResponse> = None;

        loop {
            iteration += 1;
            let mut ctx = self.context_from_request();
            ctx.last_result = last_final.clone();

            let history = self.store.list_agent(namespace, &self.name);
            let plan_outcome = match self.planner.plan(task, &history, &self.tools).await {
                Ok(outcome) => outcome,
                Err(err) => return self.error_response(namespace, format!("Planner failed: {err}"), false),
            };

            if self.policies.termination.should_terminate(iteration, &plan_outcome, &history, &ctx) {
                return match plan_outcome {
                    PlanOutcome::Final(result) => self.finalize(namespace, result),
                    _ => self.completion_response(namespace, "Task completed (detected by termination policy).", None),
                };
            }

            let actions = match plan_outcome.into_actions() {
                Some(actions) => actions,
                None => unreachable!("termination policy already handled the Final case"),
            };

            if actions.iter().any(|a| a.tool_name == "complete_task") && self.has_executed(namespace, "complete_task") {
                return self.completion_response(namespace, "Task already completed. Stopping execution.", None);
            }

            if let Some(reason) = self
                .policies
                .loop_prevention
                .detect_stagnation(action_history.make_contiguous(), observation_history.make_contiguous(), &ctx)
            {
                return self.error_response(namespace, format!("Loop detected: {reason}"), true);
            }

            for action in &actions {
                if action_history.len() == history_cap {
                    action_history.pop_front();
                }
                action_history.push_back(action.clone());
            }

            for action in &actions {
                self.event_bus.publish(
                    "action_planned",
                    serde_json::json!({ "actor": self.actor().name, "tool": action.tool_name, "args": action.tool_args }),
                );
            }

            for action in &actions {
                let signature = action_signature(&action.tool_name, &action.tool_args);
                let already_executed = self.has_executed_signature(namespace, &signature, &ctx).await;
                if self.policies.hitl.requires_approval(&action.tool_name, &action.tool_args, &ctx, already_executed) {
                    let request = self.policies.hitl.create_approval_request(&action.tool_name, &action.tool_args, &ctx);
                    return request;
                }
            }

            let results = self.execute_actions(namespace, &actions, &ctx).await;

            for (action, result) in actions.iter().zip(results.iter()) {
                self.store.append_agent(namespace, &self.name, Message::action(action));
                self.store.append_agent(namespace, &self.name, Message::observation(result.clone()));
                if observation_history.len() == history_cap {
                    observation_history.pop_front();
                }
                observation_history.push_back(result.clone());

                if action.tool_name == "complete_task" {
                    if let Some(final_response) = final_response_from_complete_task(result) {
                        return self.finalize(namespace, final_response);
                    }
                }
            }

            let last_result = results.last();
            let last_action = actions.last();
            if let (Some(last_result), Some(last_action)) = (last_result, last_action) {
                ctx.last_tool = Some(last_action.tool_name.clone());
                let synthetic = result_as_final(last_action, last_result);
                ctx.last_result = Some(synthetic.clone());
                last_final = Some(synthetic.clone());

                let history = self.store.list_agent(namespace, &self.name);
                if self.policies.completion.is_complete(&synthetic, &history, &ctx) {
                    return self.completion_response(namespace, "Task completed successfully.", Some(last_result.clone()));
                }
            }

            if let Some(reason) = self
                .policies
                .loop_prevention
                .detect_stagnation(action_history.make_contiguous(), observation_history.make_contiguous(), &ctx)
            {
                return self.error_response(namespace, format!("Loop detected: {reason}"), true);
            }

            if let Some(last_result) = last_result {
                let synthetic = result_as_final(last_action.unwrap(), last_result);
                if self.policies.checkpoint.should_checkpoint(&synthetic, iteration, &ctx) {
                    return self.policies.checkpoint.create_checkpoint_response(&synthetic, &ctx);
                }
            }

            if let Some(awaiting) = results.iter().find(|r| r.get("await_approval").is_some()) {
                return FinalResponse::new("await_approval", awaiting.clone(), "Awaiting approval");
            }
        }
    }

    async fn run_script_mode(&self, namespace: &str, task: &str, script: ScriptPlan) -> FinalResponse {
        if script.script.is_empty() {
            return self.error_response(namespace, "Script execution requested but no steps were provided".to_string(), false);
        }
        let goal_text = script.thought.clone().unwrap_or_else(|| task.to_string());
        let mut overall_success = true;
        let mut step_records = Vec::new();
        let ctx = self.context_from_request();

        for (idx, step) in script.script.iter().enumerate() {
            let Some(tool_name) = step.tool_name.clone() else {
                overall_success = false;
                step_records.push(serde_json::json!({
                    "index": idx + 1,
                    "name": step.name,
                    "status": "failed",
                    "error": "Missing tool_name in script step",
                }));
                break;
            };
            let action = Action::new(tool_name.clone(), step.args.clone().unwrap_or_default());
            self.event_bus.publish("action_planned", serde_json::json!({ "tool": tool_name, "script_step": step.name }));
            self.store.append_agent(namespace, &self.name, Message::action(&action));

            let results = self.execute_actions(namespace, std::slice::from_ref(&action), &ctx).await;
            let result = results.into_iter().next().unwrap_or(Value::Null);
            let failed = is_script_step_failure(&result);
            self.store.append_agent(namespace, &self.name, Message::observation(result.clone()));

            step_records.push(serde_json::json!({
                "index": idx + 1,
                "name": step.name,
                "tool": tool_name,
                "status": if failed { "failed" } else { "success" },
                "result": result,
            }));

            if failed {
                overall_success = false;
                break;
            }
        }

        let status = if overall_success { "SUCCESS" } else { "FAILED" };
        let summary = format!("Executed {} scripted step(s) ({status})", step_records.len());
        let payload = serde_json::json!({
            "message": summary,
            "overall_status": status,
            "error": !overall_success,
            "script_goal": goal_text,
            "script_steps": step_records,
        });
        self.completion_response(namespace, &summary, Some(payload))
    }

    async fn execute_actions(&self, namespace: &str, actions: &[Action], ctx: &PolicyContext) -> Vec<Value> {
        let mut results = Vec::with_capacity(actions.len());
        for action in actions {
            results.push(self.execute_one(namespace, action, ctx).await);
        }
        results
    }

    /// Resolves the tool, validates its args against its schema, consults
    /// the central policy engine, then runs it — in that order (§4.5 step
    /// 10). Publishes `worker_tool_call` before the policy check and
    /// `worker_tool_result` after every outcome, matching `core/agent.py`'s
    /// per-tool execution path.
    async fn execute_one(&self, _namespace: &str, action: &Action, ctx: &PolicyContext) -> Value {
        if !self.tools.has(&action.tool_name) {
            let message = format!("Tool not found: {}", action.tool_name);
            self.publish_error(&message, serde_json::json!({ "tool": action.tool_name }));
            return serde_json::json!({ "error": true, "error_message": message, "tool": action.tool_name });
        }

        let mut args = action.tool_args.clone();
        self.env_defaults.apply(&action.tool_name, &mut args);

        if let Some(schema) = self.tools.schema_for(&action.tool_name) {
            let instance = Value::Object(args.iter().map(|(k, v)| (k.clone(), v.clone())).collect());
            if let Err(reason) = validate_tool_args(schema, &instance) {
                let message = format!("Invalid arguments for '{}': {reason}", action.tool_name);
                self.publish_error(&message, serde_json::json!({ "tool": action.tool_name, "args": args }));
                return serde_json::json!({ "error": true, "error_message": message, "tool": action.tool_name });
            }
        }

        self.event_bus.publish("worker_tool_call", serde_json::json!({ "actor": self.actor().name, "tool": action.tool_name, "args": args }));

        let verdict = self.policy_engine.evaluate(&action.tool_name, &args);
        if !verdict.allowed {
            let reason = verdict.reason.unwrap_or_else(|| "policy denied".to_string());
            self.event_bus.publish("policy_denied", serde_json::json!({ "tool": action.tool_name, "reason": reason }));
            let result = serde_json::json!({ "error": true, "error_message": reason, "policy_denied": true, "tool": action.tool_name });
            self.event_bus.publish("worker_tool_result", serde_json::json!({ "tool": action.tool_name, "result": result }));
            return result;
        }

        let start = std::time::Instant::now();
        let outcome = self.tools.execute(&action.tool_name, &args);
        let latency_ms = start.elapsed().as_millis() as u64;

        let result = match outcome {
            Ok(output) => serde_json::json!({ "success": true, "message": self.config.truncate_observation(&output) }),
            Err(error) => serde_json::json!({ "success": false, "error": true, "error_message": error, "tool": action.tool_name }),
        };

        self.event_bus.publish(
            "action_executed",
            serde_json::json!({ "tool": action.tool_name, "args": args, "latency_ms": latency_ms, "result": result }),
        );
        self.event_bus.publish("worker_tool_result", serde_json::json!({ "tool": action.tool_name, "result": result }));

        if result.get("success").and_then(Value::as_bool) == Some(true) {
            if let (Some(job_store), Some(job_id)) = (&self.job_store, &ctx.job_id) {
                let signature = action_signature(&action.tool_name, &args);
                if let Err(err) = job_store.add_executed_action(job_id, &signature).await {
                    tracing::warn!(worker = %self.name, error = %err, "failed to record executed action");
                }
            }
        } else {
            self.publish_error(format!("Tool '{}' execution failed", action.tool_name), result.clone());
        }

        result
    }

    fn has_executed(&self, namespace: &str, tool_name: &str) -> bool {
        self.store
            .list_agent(namespace, &self.name)
            .iter()
            .any(|m| m.type_ == MessageType::Action && m.tool.as_deref() == Some(tool_name))
    }

    /// Prefers the job store's durable executed-action set when a job id is
    /// known, matching `JobStore::add_executed_action`'s write side (§6.4).
    /// Falls back to scanning this run's own feed when no job store or job
    /// id is configured, so job-store-less hosts keep the prior behavior.
    async fn has_executed_signature(&self, namespace: &str, signature: &str, ctx: &PolicyContext) -> bool {
        if let (Some(job_store), Some(job_id)) = (&self.job_store, &ctx.job_id) {
            match job_store.has_executed_action(job_id, signature).await {
                Ok(found) => return found,
                Err(err) => tracing::warn!(worker = %self.name, error = %err, "failed to query executed-action set"),
            }
        }
        self.store.list_agent(namespace, &self.name).iter().any(|m| {
            m.type_ == MessageType::Action
                && m.tool.as_ref().map(|tool| action_signature(tool, m.args.as_ref().unwrap_or(&HashMap::new()))).as_deref() == Some(signature)
        })
    }

    fn finalize(&self, namespace: &str, result: FinalResponse) -> FinalResponse {
        self.store.append_agent(namespace, &self.name, Message::new(MessageType::Final, Value::String(result.human_readable_summary.clone())));
        self.event_bus.publish("agent_end", serde_json::json!({ "agent_name": self.name, "result": result }));
        result
    }

    fn completion_response(&self, namespace: &str, message: &str, payload: Option<Value>) -> FinalResponse {
        let response = match payload {
            Some(value) => FinalResponse::new("display_message", value, message),
            None => FinalResponse::display_message(message),
        };
        self.finalize(namespace, response)
    }

    fn error_response(&self, namespace: &str, message: String, stagnation: bool) -> FinalResponse {
        self.store.append_agent(namespace, &self.name, Message::new(MessageType::Error, Value::String(message.clone())));
        self.publish_error(message.clone(), serde_json::json!({ "stagnation": stagnation }));
        let response = if stagnation { FinalResponse::stagnation(message) } else { FinalResponse::error_message(message) };
        self.event_bus.publish("agent_end", serde_json::json!({ "agent_name": self.name, "status": "error" }));
        response
    }
}

fn result_as_final(action: &Action, result: &Value) -> FinalResponse {
    FinalResponse::new(
        result.get("operation").and_then(Value::as_str).unwrap_or(action.tool_name.as_str()).to_string(),
        result.clone(),
        result.get("message").and_then(Value::as_str).unwrap_or("").to_string(),
    )
}

fn final_response_from_complete_task(result: &Value) -> Option<FinalResponse> {
    if result.get("completed").and_then(Value::as_bool) != Some(true) {
        return None;
    }
    let operation = result.get("operation").and_then(Value::as_str).unwrap_or("display_message").to_string();
    let payload = result.get("payload").cloned().unwrap_or_else(|| serde_json::json!({}));
    let summary = result
        .get("human_readable_summary")
        .or_else(|| result.get("summary"))
        .and_then(Value::as_str)
        .unwrap_or("Task completed.")
        .to_string();
    Some(FinalResponse::new(operation, payload, summary))
}

fn is_script_step_failure(result: &Value) -> bool {
    if result.get("error").and_then(Value::as_bool) == Some(true) {
        return true;
    }
    if result.get("success").and_then(Value::as_bool) == Some(false) {
        return true;
    }
    false
}

fn augment_task_with_plan(task: &str, plan: &Value) -> String {
    let plan_text = serde_json::to_string_pretty(plan).unwrap_or_else(|_| plan.to_string());
    let base = if task.trim().is_empty() { "(no task provided)" } else { task.trim() };
    format!("{base}\n\n== Manager Suggested Plan ==\n{plan_text}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hier::job_store::MockJobStore;
    use async_trait::async_trait;
    use std::collections::HashMap as StdHashMap;
    use std::sync::Mutex;

    struct ScriptedPlannerStub {
        outcomes: Mutex<VecDeque<PlanOutcome>>,
    }

    #[async_trait]
    impl Planner for ScriptedPlannerStub {
        async fn plan(&self, _task: &str, _history: &[Message], _tools: &ToolRegistry) -> Result<PlanOutcome, String> {
            Ok(self.outcomes.lock().unwrap().pop_front().unwrap_or(PlanOutcome::Final(FinalResponse::display_message("fallback"))))
        }
    }

    fn registry_with_echo() -> ToolRegistry {
        let mut tools = ToolRegistry::new();
        tools.register("echo", "echoes its input", serde_json::json!({}), Box::new(|args: &StdHashMap<String, Value>| Ok(format!("{:?}", args))));
        tools.register("complete_task", "completes the task", serde_json::json!({}), Box::new(|_args: &StdHashMap<String, Value>| Ok("done".to_string())));
        tools
    }

    fn worker_with(planner: Box<dyn Planner>) -> WorkerAgent {
        WorkerAgent::new(
            "w1",
            planner,
            registry_with_echo(),
            PolicySet::default(),
            Arc::new(PolicyEngine::new()),
            Arc::new(SharedStateStore::new()),
            Arc::new(EventBus::new()),
        )
    }

    #[tokio::test]
    async fn planner_loop_finalizes_on_final_response() {
        let planner = ScriptedPlannerStub { outcomes: Mutex::new(VecDeque::from(vec![PlanOutcome::Final(FinalResponse::display_message("all done"))])) };
        let worker = worker_with(Box::new(planner));
        let result = worker.run("job1", "do the thing", None, None).await;
        assert_eq!(result.human_readable_summary, "all done");
    }

    #[tokio::test]
    async fn planner_loop_executes_an_action_then_completes() {
        let planner = ScriptedPlannerStub {
            outcomes: Mutex::new(VecDeque::from(vec![
                PlanOutcome::Single(Action::new("echo", StdHashMap::new())),
                PlanOutcome::Final(FinalResponse::display_message("wrapped up")),
            ])),
        };
        let worker = worker_with(Box::new(planner));
        let result = worker.run("job1", "do the thing", None, None).await;
        assert_eq!(result.human_readable_summary, "wrapped up");
    }

    #[tokio::test]
    async fn script_mode_runs_direct_steps_sequentially() {
        let planner = ScriptedPlannerStub { outcomes: Mutex::new(VecDeque::new()) };
        let worker = worker_with(Box::new(planner));
        let script = ScriptPlan {
            thought: Some("do both steps".to_string()),
            script: vec![
                super::super::model::ScriptStep {
                    name: "step1".into(),
                    worker: "w1".into(),
                    tool_name: Some("echo".into()),
                    args: None,
                    execution_mode: super::super::model::ExecutionMode::Direct,
                    notes: None,
                },
                super::super::model::ScriptStep {
                    name: "step2".into(),
                    worker: "w1".into(),
                    tool_name: Some("complete_task".into()),
                    args: None,
                    execution_mode: super::super::model::ExecutionMode::Direct,
                    notes: None,
                },
            ],
        };
        let result = worker.run("job1", "do the thing", Some(script), None).await;
        assert!(result.payload["overall_status"] == "SUCCESS");
    }

    #[tokio::test]
    async fn script_mode_with_missing_tool_name_fails_fast() {
        let planner = ScriptedPlannerStub { outcomes: Mutex::new(VecDeque::new()) };
        let worker = worker_with(Box::new(planner));
        let script = ScriptPlan {
            thought: None,
            script: vec![super::super::model::ScriptStep {
                name: "broken".into(),
                worker: "w1".into(),
                tool_name: None,
                args: None,
                execution_mode: super::super::model::ExecutionMode::Direct,
                notes: None,
            }],
        };
        let result = worker.run("job1", "t", Some(script), None).await;
        assert!(result.is_error());
    }

    #[tokio::test]
    async fn invalid_tool_args_are_rejected_before_execution() {
        let mut tools = ToolRegistry::new();
        tools.register(
            "add_column",
            "adds a column",
            serde_json::json!({ "type": "object", "properties": { "table": { "type": "string" } }, "required": ["table"] }),
            Box::new(|_args: &StdHashMap<String, Value>| Ok("added".to_string())),
        );
        let planner = ScriptedPlannerStub { outcomes: Mutex::new(VecDeque::new()) };
        let worker = WorkerAgent::new(
            "w1",
            Box::new(planner),
            tools,
            PolicySet::default(),
            Arc::new(PolicyEngine::new()),
            Arc::new(SharedStateStore::new()),
            Arc::new(EventBus::new()),
        );
        let action = Action::new("add_column", StdHashMap::new());
        let result = worker.execute_one("job1", &action, &PolicyContext::default()).await;
        assert_eq!(result.get("error").and_then(Value::as_bool), Some(true));
        assert!(result.get("error_message").and_then(Value::as_str).unwrap_or("").contains("Invalid arguments"));
    }

    #[tokio::test]
    async fn unknown_tool_is_rejected_before_schema_or_policy_checks() {
        let worker = worker_with(Box::new(ScriptedPlannerStub { outcomes: Mutex::new(VecDeque::new()) }));
        let action = Action::new("does_not_exist", StdHashMap::new());
        let result = worker.execute_one("job1", &action, &PolicyContext::default()).await;
        assert_eq!(result.get("error").and_then(Value::as_bool), Some(true));
        assert!(result.get("error_message").and_then(Value::as_str).unwrap_or("").contains("not found"));
    }

    #[tokio::test]
    async fn executed_action_is_recorded_through_the_job_store_when_configured() {
        let mut tools = ToolRegistry::new();
        tools.register("echo", "echoes its input", serde_json::json!({}), Box::new(|_args: &StdHashMap<String, Value>| Ok("ok".to_string())));

        let mut mock_store = MockJobStore::new();
        mock_store.expect_add_executed_action().times(1).returning(|_, _| Ok(()));
        mock_store.expect_has_executed_action().returning(|_, _| Ok(false));

        let planner = ScriptedPlannerStub {
            outcomes: Mutex::new(VecDeque::from(vec![
                PlanOutcome::Single(Action::new("echo", StdHashMap::new())),
                PlanOutcome::Final(FinalResponse::display_message("wrapped up")),
            ])),
        };
        let worker = WorkerAgent::new(
            "w1",
            Box::new(planner),
            tools,
            PolicySet::default(),
            Arc::new(PolicyEngine::new()),
            Arc::new(SharedStateStore::new()),
            Arc::new(EventBus::new()),
        )
        .with_job_store(Arc::new(mock_store));

        let result = request_context::scope_with(super::super::request_context::RequestContext::with_job_id("job-9"), worker.run("job1", "do the thing", None, None)).await;
        assert_eq!(result.human_readable_summary, "wrapped up");
    }
}
