//! End-to-end tests for the hierarchical engine: a manager delegating to
//! workers through the shared state store, policy set, and event bus.

use std::collections::HashMap;
use std::sync::Arc;

use agentsm::{
    Action, EventBus, FinalResponse, ManagerAgent, ManagerPolicySet, Message, PlanOutcome, Planner, PolicyEngine,
    PolicySet, SharedStateStore, WorkerAgent,
};
use agentsm::tools::ToolRegistry;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Mutex;

struct QueuedPlanner {
    outcomes: Mutex<std::collections::VecDeque<PlanOutcome>>,
}

#[async_trait]
impl Planner for QueuedPlanner {
    async fn plan(&self, _task: &str, _history: &[Message], _tools: &ToolRegistry) -> Result<PlanOutcome, String> {
        Ok(self.outcomes.lock().unwrap().pop_front().unwrap_or(PlanOutcome::Final(FinalResponse::display_message("fallback"))))
    }
}

fn worker_completing_immediately(name: &str) -> Arc<WorkerAgent> {
    Arc::new(WorkerAgent::new(
        name,
        Box::new(QueuedPlanner { outcomes: Mutex::new(std::collections::VecDeque::from(vec![PlanOutcome::Final(FinalResponse::display_message(format!("{name} done")))])) }),
        ToolRegistry::new(),
        PolicySet::default(),
        Arc::new(PolicyEngine::new()),
        Arc::new(SharedStateStore::new()),
        Arc::new(EventBus::new()),
    ))
}

#[tokio::test]
async fn manager_delegates_to_a_single_worker_and_finalizes() {
    let mut workers = HashMap::new();
    workers.insert("researcher".to_string(), worker_completing_immediately("researcher"));

    let planner = QueuedPlanner {
        outcomes: Mutex::new(std::collections::VecDeque::from(vec![PlanOutcome::Single(Action::new("researcher", HashMap::new()))])),
    };

    let manager = ManagerAgent::new(
        "research_manager",
        Box::new(planner),
        workers,
        ToolRegistry::new(),
        ManagerPolicySet::default(),
        Arc::new(SharedStateStore::new()),
        Arc::new(EventBus::new()),
    );

    let result = manager.run("job-1", "find sources", None, None).await;
    assert_eq!(result.human_readable_summary, "researcher done");
    assert!(!result.is_error());
}

#[tokio::test]
async fn manager_with_no_workers_returns_an_error_response() {
    let planner = QueuedPlanner { outcomes: Mutex::new(std::collections::VecDeque::new()) };
    let manager = ManagerAgent::new(
        "empty_manager",
        Box::new(planner),
        HashMap::new(),
        ToolRegistry::new(),
        ManagerPolicySet::default(),
        Arc::new(SharedStateStore::new()),
        Arc::new(EventBus::new()),
    );

    let result = manager.run("job-2", "anything", None, None).await;
    assert!(result.is_error());
}

#[tokio::test]
async fn worker_turn_isolation_keeps_new_runs_from_seeing_prior_observations() {
    let store = Arc::new(SharedStateStore::new());
    let worker = WorkerAgent::new(
        "w1",
        Box::new(QueuedPlanner {
            outcomes: Mutex::new(std::collections::VecDeque::from(vec![
                PlanOutcome::Single(Action::new("echo", HashMap::new())),
                PlanOutcome::Final(FinalResponse::display_message("first run complete")),
            ])),
        }),
        {
            let mut tools = ToolRegistry::new();
            tools.register("echo", "echoes", json!({}), Box::new(|_args: &HashMap<String, serde_json::Value>| Ok("ok".to_string())));
            tools
        },
        PolicySet::default(),
        Arc::new(PolicyEngine::new()),
        store.clone(),
        Arc::new(EventBus::new()),
    );

    let first = worker.run("job-3", "first task", None, None).await;
    assert_eq!(first.human_readable_summary, "first run complete");

    let history = store.list_agent("job-3", "w1");
    assert!(history.iter().any(|m| m.type_ == agentsm::MessageType::Action));
    assert!(history.iter().any(|m| m.type_ == agentsm::MessageType::Final));
}
