//! `ManagerAgent`: policy-driven delegation across a pool of workers (§4.6).
//! Grounded step-for-step on `core/manager_v2.py`'s `run`,
//! `_delegate_with_follow_ups`, `_execute_phases_sequentially`,
//! `_execute_script_plan`, `_handle_parallel_delegation`, and
//! `_synthesize_result`.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use serde_json::Value;

use crate::tools::ToolRegistry;

use super::bus::{Actor, EventBus};
use super::context_builder::{CatalogEntry, ContextBuilder};
use super::job_store::JobStore;
use super::model::{Action, FinalResponse, Message, MessageType, Phase, PlanOutcome, ScriptStep, StrategicPlan};
use super::planner::Planner;
use super::policies::{ManagerPolicySet, PolicyContext};
use super::request_context;
use super::store::SharedStateStore;
use super::worker::WorkerAgent;

/// Reshapes an aggregated result into a user-facing `final_response`. Runs
/// only when no synthesizer agent is configured, or the synthesizer agent
/// produced no `full_result` (§4.6).
pub type SynthesisGateway = dyn Fn(&Value) -> Option<Value> + Send + Sync;

pub struct ManagerAgent {
    pub name: String,
    pub version: String,
    description: String,
    planner: Box<dyn Planner>,
    workers: HashMap<String, Arc<WorkerAgent>>,
    tools: ToolRegistry,
    policies: ManagerPolicySet,
    store: Arc<SharedStateStore>,
    event_bus: Arc<EventBus>,
    job_store: Option<Arc<dyn JobStore>>,
    synthesis_gateway: Option<Box<SynthesisGateway>>,
    synthesizer_agent: Option<Arc<WorkerAgent>>,
}

impl ManagerAgent {
    pub fn new(
        name: impl Into<String>,
        planner: Box<dyn Planner>,
        workers: HashMap<String, Arc<WorkerAgent>>,
        tools: ToolRegistry,
        policies: ManagerPolicySet,
        store: Arc<SharedStateStore>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let name = name.into();
        let description = format!("{name} manager");
        Self {
            name,
            version: "2".to_string(),
            description,
            planner,
            workers,
            tools,
            policies,
            store,
            event_bus,
            job_store: None,
            synthesis_gateway: None,
            synthesizer_agent: None,
        }
    }

    pub fn with_job_store(mut self, job_store: Arc<dyn JobStore>) -> Self {
        self.job_store = Some(job_store);
        self
    }

    pub fn with_synthesis_gateway(mut self, gateway: Box<SynthesisGateway>) -> Self {
        self.synthesis_gateway = Some(gateway);
        self
    }

    pub fn with_synthesizer_agent(mut self, agent: Arc<WorkerAgent>) -> Self {
        self.synthesizer_agent = Some(agent);
        self
    }

    fn actor(&self) -> Actor {
        Actor::new("manager", self.name.clone())
    }

    /// Orchestrators are distinguished by name, matching `manager_v2.py`'s
    /// `"orchestrator" not in self.name.lower()` check.
    fn is_orchestrator(&self) -> bool {
        self.name.to_lowercase().contains("orchestrator")
    }

    fn worker_catalog(&self) -> Vec<CatalogEntry> {
        self.workers.keys().map(|name| CatalogEntry { name: name.clone(), description: String::new() }).collect()
    }

    pub async fn run(&self, namespace: &str, task: &str, strategic_plan: Option<StrategicPlan>, context: Option<String>) -> FinalResponse {
        self.store.append_agent(namespace, &self.name, Message::task(task));

        if let Some(ref plan) = strategic_plan {
            self.store.append_agent(namespace, &self.name, Message::new(MessageType::StrategicPlan, serde_json::to_value(plan).unwrap_or(Value::Null)));
            request_context::update(|ctx| ctx.strategic_plan = Some(plan.clone()));
            if let Some(job_store) = &self.job_store {
                if let Some(job_id) = request_context::get_from_context(|ctx| ctx.job_id.clone()).flatten() {
                    let result = if self.is_orchestrator() {
                        job_store.update_orchestrator_plan(&job_id, plan.clone()).await
                    } else {
                        job_store.update_manager_plan(&job_id, &self.name, plan.clone()).await
                    };
                    if let Err(err) = result {
                        tracing::warn!(manager = %self.name, error = %err, "failed to persist strategic plan");
                    }
                }
            }
        }

        let builder = ContextBuilder::new(self.store.clone(), namespace);
        let context_text = if self.is_orchestrator() {
            builder.build_orchestrator_context(task, &self.worker_catalog())
        } else {
            let (text, _manifest) = builder.build_manager_context(context.as_deref().unwrap_or(task), &self.worker_catalog(), None);
            text
        };
        self.store.append_agent(namespace, &self.name, Message::new(MessageType::DirectorContext, Value::String(context_text)));

        self.event_bus.publish(
            "manager_start",
            serde_json::json!({ "actor": self.actor().name, "task": task, "workers": self.workers.keys().collect::<Vec<_>>(), "has_plan": strategic_plan.is_some() }),
        );

        if self.workers.is_empty() {
            return self.finalize(namespace, FinalResponse::error_message("No workers available for delegation"));
        }

        let ctx = PolicyContext {
            job_id: request_context::get_from_context(|c| c.job_id.clone()).flatten(),
            approvals: request_context::get_from_context(|c| c.approvals.clone()).unwrap_or_default(),
            ..PolicyContext::default()
        };
        let history = self.store.list_agent(namespace, &self.name);
        let decision = match self.planner.plan(task, &history, &self.tools).await {
            Ok(outcome) => outcome,
            Err(err) => return self.finalize(namespace, FinalResponse::error_message(format!("Planner failed: {err}"))),
        };

        match decision {
            PlanOutcome::Final(result) => self.finalize(namespace, result),
            PlanOutcome::Many(actions) => self.handle_parallel_delegation(namespace, actions, task, context.as_deref()).await,
            PlanOutcome::Single(action) => self.handle_single_decision(namespace, action, task, strategic_plan, context.as_deref(), &ctx).await,
        }
    }

    async fn handle_single_decision(
        &self,
        namespace: &str,
        action: Action,
        task: &str,
        strategic_plan: Option<StrategicPlan>,
        context: Option<&str>,
        ctx: &PolicyContext,
    ) -> FinalResponse {
        let action_key = action.tool_name.clone();

        if self.workers.contains_key(&action_key) {
            return self.delegate_with_follow_ups(namespace, &action_key, task, action.tool_args, strategic_plan, context, ctx).await;
        }

        if self.tools.has(&action_key) {
            return self.finalize(namespace, self.execute_manager_tool(&action));
        }

        self.finalize(namespace, FinalResponse::error_message(format!("Invalid action: '{action_key}' is not a known worker or manager tool.")))
    }

    fn execute_manager_tool(&self, action: &Action) -> FinalResponse {
        match self.tools.execute(&action.tool_name, &action.tool_args) {
            Ok(output) => FinalResponse::display_message(output),
            Err(error) => FinalResponse::error_message(error),
        }
    }

    async fn delegate_with_follow_ups(
        &self,
        namespace: &str,
        worker_key: &str,
        task: &str,
        tool_args: HashMap<String, Value>,
        strategic_plan: Option<StrategicPlan>,
        context: Option<&str>,
        ctx: &PolicyContext,
    ) -> FinalResponse {
        if let Some(Value::Array(raw_steps)) = tool_args.get("script") {
            match parse_script_steps(raw_steps) {
                Ok(steps) => return self.execute_script_plan(namespace, steps, context).await,
                Err(err) => return self.finalize(namespace, FinalResponse::error_message(err)),
            }
        }

        let plan_for_phases = strategic_plan.clone().or_else(|| {
            tool_args.get("strategic_plan").and_then(|v| serde_json::from_value::<StrategicPlan>(v.clone()).ok())
        });
        let phases: Vec<Phase> = plan_for_phases.as_ref().map(|p| p.phases.clone()).unwrap_or_default();

        if !phases.is_empty() {
            return self.execute_phases_sequentially(namespace, &phases, task, context).await;
        }

        let primary_result = self.delegate_to_worker(namespace, worker_key, task, None, context, Some(&tool_args)).await;
        if primary_result.is_approval_request() {
            self.persist_pending_action(worker_key, &primary_result).await;
            return primary_result;
        }

        let history = self.store.list_agent(namespace, &self.name);
        if self.policies.completion.is_complete(&primary_result, &history, ctx) {
            return self.finalize(namespace, primary_result);
        }

        let completed_phases = 1;
        if !self.policies.follow_up.should_follow_up(&primary_result, &phases, completed_phases, &history, ctx) {
            return self.finalize(namespace, primary_result);
        }

        // `phases` is guaranteed empty here (the non-empty case already
        // returned above), so this loop never iterates — matching the
        // source behavior verbatim rather than "fixing" an apparent dead path.
        let mut workers_run = vec![worker_key.to_string()];
        let mut results_run = vec![primary_result];
        for phase in phases.iter().skip(1) {
            if !self.workers.contains_key(&phase.worker) {
                continue;
            }
            let phase_result = self.delegate_to_worker(namespace, &phase.worker, task, None, context, None).await;
            workers_run.push(phase.worker.clone());
            let is_approval = phase_result.is_approval_request();
            results_run.push(phase_result);
            if is_approval {
                let last = results_run.last().unwrap();
                self.persist_pending_action(&phase.worker, last).await;
                return results_run.pop().unwrap();
            }
        }

        let aggregated = aggregate_results(&workers_run, &results_run);
        let final_result = self.maybe_synthesize(namespace, task, &aggregated).await;
        self.finalize(namespace, final_result)
    }

    async fn execute_phases_sequentially(&self, namespace: &str, phases: &[Phase], task: &str, context: Option<&str>) -> FinalResponse {
        let mut workers_run = Vec::new();
        let mut results_run: Vec<FinalResponse> = Vec::new();

        for (index, phase) in phases.iter().enumerate() {
            if !self.workers.contains_key(&phase.worker) {
                continue;
            }

            let phase_task = if index == 0 {
                if phase.goals.trim().is_empty() { task.to_string() } else { phase.goals.clone() }
            } else {
                let previous = results_run.last().map(|r| r.human_readable_summary.clone()).unwrap_or_default();
                format!("{}\n\n== Previous Phase Outcome ==\n{previous}", phase.goals)
            };

            let previous_index = request_context::get_from_context(|c| c.phase_index(&self.name)).unwrap_or(0);
            request_context::update(|c| {
                c.phase_index_by_manager.insert(self.name.clone(), index);
            });

            let single_step_plan = StrategicPlan {
                primary_worker: Some(phase.worker.clone()),
                task_type: None,
                phases: vec![phase.clone()],
                rationale: None,
            };

            let start_event_name = if self.is_orchestrator() { "orchestrator_phase_start" } else { "manager_step_start" };
            self.event_bus.publish(start_event_name, serde_json::json!({ "index": index, "worker": phase.worker }));

            let result = self.delegate_to_worker(namespace, &phase.worker, &phase_task, Some(&single_step_plan), context, None).await;

            request_context::update(|c| {
                c.phase_index_by_manager.insert(self.name.clone(), previous_index);
            });

            let event_name = if self.is_orchestrator() { "orchestrator_phase_end" } else { "manager_step_end" };
            self.event_bus.publish(
                event_name,
                serde_json::json!({ "index": index, "worker": phase.worker, "status": if result.is_error() { "error" } else { "success" } }),
            );

            workers_run.push(phase.worker.clone());
            let is_approval = result.is_approval_request();
            results_run.push(result);
            if is_approval {
                let last = results_run.last().unwrap();
                self.persist_pending_action(&phase.worker, last).await;
                return results_run.pop().unwrap();
            }
        }

        let aggregated = aggregate_results(&workers_run, &results_run);
        let final_result = self.maybe_synthesize(namespace, task, &aggregated).await;
        self.finalize(namespace, final_result)
    }

    async fn execute_script_plan(&self, namespace: &str, steps: Vec<ScriptStep>, context: Option<&str>) -> FinalResponse {
        for step in &steps {
            if !self.workers.contains_key(&step.worker) {
                return self.finalize(namespace, FinalResponse::error_message(format!("Script references unknown worker '{}'", step.worker)));
            }
        }

        self.event_bus.publish("manager_script_planned", serde_json::json!({ "step_count": steps.len() }));

        let segments = group_into_segments(steps);
        let mut workers_run = Vec::new();
        let mut results_run = Vec::new();

        for segment in segments {
            let worker_key = segment[0].worker.clone();
            let mode = segment[0].execution_mode;
            let script_plan = if mode == super::model::ExecutionMode::Direct {
                Some(super::model::ScriptPlan { thought: None, script: segment.clone() })
            } else {
                None
            };
            let suggested_plan = if mode != super::model::ExecutionMode::Direct { Some(serde_json::to_value(&segment).unwrap_or(Value::Null)) } else { None };

            let worker = match self.workers.get(&worker_key) {
                Some(w) => w.clone(),
                None => continue,
            };
            let goal = segment.iter().map(|s| s.name.clone()).collect::<Vec<_>>().join(", ");
            let result = worker.run(namespace, &goal, script_plan, suggested_plan).await;

            workers_run.push(worker_key.clone());
            let failed = result.is_error();
            results_run.push(result);
            if failed {
                break;
            }
        }

        let aggregated = aggregate_results(&workers_run, &results_run);
        self.finalize(namespace, aggregated)
    }

    async fn handle_parallel_delegation(&self, namespace: &str, actions: Vec<Action>, task: &str, context: Option<&str>) -> FinalResponse {
        let dispatched: Vec<&Action> = actions.iter().filter(|a| self.workers.contains_key(&a.tool_name)).collect();
        if dispatched.is_empty() {
            return self.finalize(namespace, FinalResponse::error_message("No known workers among planned delegation targets"));
        }

        self.event_bus.publish("delegation_planned", serde_json::json!({ "workers": dispatched.iter().map(|a| &a.tool_name).collect::<Vec<_>>() }));

        let futures = dispatched.iter().map(|action| self.delegate_to_worker(namespace, &action.tool_name, task, None, context, Some(&action.tool_args)));
        let results = join_all(futures).await;

        self.event_bus.publish(
            "delegation_executed",
            serde_json::json!({
                "workers": dispatched.iter().map(|a| &a.tool_name).collect::<Vec<_>>(),
                "statuses": results.iter().map(|r| if r.is_error() { "error" } else { "success" }).collect::<Vec<_>>(),
            }),
        );

        if let Some(approval) = results.iter().find(|r| r.is_approval_request()) {
            // The recorded pending-action worker is always the first
            // dispatched action's target, regardless of which concurrent
            // result actually requested approval — a deliberate quirk
            // preserved from the source behavior, not a general guarantee.
            let recorded_worker = &dispatched[0].tool_name;
            self.persist_pending_action(recorded_worker, approval).await;
            return approval.clone();
        }

        let workers_run: Vec<String> = dispatched.iter().map(|a| a.tool_name.clone()).collect();
        let aggregated = aggregate_results(&workers_run, &results);
        let final_result = self.maybe_synthesize(namespace, task, &aggregated).await;
        self.finalize(namespace, final_result)
    }

    async fn delegate_to_worker(
        &self,
        namespace: &str,
        worker_key: &str,
        task: &str,
        single_step_plan: Option<&StrategicPlan>,
        _context: Option<&str>,
        tool_args: Option<&HashMap<String, Value>>,
    ) -> FinalResponse {
        let Some(worker) = self.workers.get(worker_key) else {
            return FinalResponse::error_message(format!("Unknown worker '{worker_key}'"));
        };
        self.event_bus.publish("delegation_chosen", serde_json::json!({ "worker": worker_key }));

        let suggested_plan = single_step_plan.map(|p| serde_json::to_value(p).unwrap_or(Value::Null)).or_else(|| tool_args.map(|args| serde_json::to_value(args).unwrap_or(Value::Null)));

        worker.run(namespace, task, None, suggested_plan).await
    }

    async fn persist_pending_action(&self, worker_key: &str, result: &FinalResponse) {
        let Some(job_store) = &self.job_store else { return };
        let Some(job_id) = request_context::get_from_context(|c| c.job_id.clone()).flatten() else { return };
        let tool = result.payload.get("tool").and_then(Value::as_str).unwrap_or("unknown").to_string();
        let args = result
            .payload
            .get("args")
            .and_then(Value::as_object)
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        let pending = super::model::PendingAction { worker: worker_key.to_string(), tool, args, manager: Some(self.name.clone()), resume_token: None };
        if let Err(err) = job_store.save_pending_action(&job_id, pending).await {
            tracing::warn!(error = %err, "failed to persist pending action");
        }
    }

    async fn maybe_synthesize(&self, namespace: &str, task: &str, aggregated: &FinalResponse) -> FinalResponse {
        if let Some(agent) = &self.synthesizer_agent {
            let context_builder = ContextBuilder::new(self.store.clone(), namespace);
            let request = context_builder.latest_user_message().unwrap_or_else(|| task.to_string());
            let context_text = context_builder.build_synthesizer_context(&request, &aggregated.payload);
            let synthesized = agent.run(namespace, &context_text, None, None).await;
            if let Some(full_result) = synthesized.payload.get("full_result") {
                if !full_result.is_null() {
                    return final_response_from_value(full_result).unwrap_or_else(|| aggregated.clone());
                }
            }
            self.store.append_global(
                namespace,
                serde_json::json!({ "type": "synthesis", "content": synthesized.payload }),
            );
        }

        if let Some(gateway) = &self.synthesis_gateway {
            if let Some(reshaped) = gateway(&aggregated.payload) {
                return final_response_from_value(&reshaped).unwrap_or_else(|| FinalResponse::new("display_message", reshaped, aggregated.human_readable_summary.clone()));
            }
        }

        aggregated.clone()
    }

    fn finalize(&self, namespace: &str, result: FinalResponse) -> FinalResponse {
        self.store.append_agent(namespace, &self.name, Message::new(MessageType::Final, Value::String(result.human_readable_summary.clone())));
        self.event_bus.publish("manager_end", serde_json::json!({ "manager_name": self.name, "result": result }));
        result
    }
}

fn final_response_from_value(value: &Value) -> Option<FinalResponse> {
    let operation = value.get("operation").and_then(Value::as_str)?.to_string();
    let payload = value.get("payload").cloned().unwrap_or(Value::Null);
    let summary = value.get("human_readable_summary").and_then(Value::as_str).unwrap_or("").to_string();
    Some(FinalResponse::new(operation, payload, summary))
}

fn parse_script_steps(raw: &[Value]) -> Result<Vec<ScriptStep>, String> {
    raw.iter().map(|v| serde_json::from_value::<ScriptStep>(v.clone()).map_err(|e| format!("invalid script step: {e}"))).collect()
}

/// Groups consecutive same-worker, same-execution-mode steps into segments.
fn group_into_segments(steps: Vec<ScriptStep>) -> Vec<Vec<ScriptStep>> {
    let mut segments: Vec<Vec<ScriptStep>> = Vec::new();
    for step in steps {
        match segments.last_mut() {
            Some(segment) if segment[0].worker == step.worker && segment[0].execution_mode == step.execution_mode => {
                segment.push(step);
            }
            _ => segments.push(vec![step]),
        }
    }
    segments
}

fn aggregate_results(workers_run: &[String], results_run: &[FinalResponse]) -> FinalResponse {
    if workers_run.len() == 1 {
        return results_run[0].clone();
    }
    let mut sections = Vec::new();
    let mut worker_results = serde_json::Map::new();
    for (worker, result) in workers_run.iter().zip(results_run.iter()) {
        sections.push(format!("== {worker} ==\n{}", result.human_readable_summary));
        worker_results.insert(
            worker.clone(),
            serde_json::json!({ "operation": result.operation, "payload": result.payload, "human_readable_summary": result.human_readable_summary }),
        );
    }
    let summary = sections.join("\n\n");
    FinalResponse::new("display_message", serde_json::json!({ "message": summary, "worker_results": Value::Object(worker_results) }), summary)
}
