//! Hierarchical agent execution engine: orchestrator, managers, and workers
//! running a shared policy-driven plan/act/observe loop over an append-only
//! shared state store (§1-§8 of the design document).

mod bus;
mod config;
mod context_builder;
mod env_defaults;
mod filters;
mod job_store;
mod manager;
mod model;
mod planner;
mod policies;
mod request_context;
mod schema_validation;
mod signature;
mod store;
mod views;
mod worker;

pub use bus::{Actor, EventBus, EventStatus, LoggingSubscriber, Subscriber};
pub use config::{EngineConfig, ToolChoicePolicy};
pub use context_builder::{CatalogEntry, ContextBuilder, ManifestGetter};
pub use env_defaults::EnvDefaultInjector;
pub use filters::{DefaultFilter, FilterContext, HistoryFilter, ManagerFilter, OrchestratorFilter, WorkerFilter};
pub use job_store::{FileJobStore, JobStore, MemoryJobStore, SqliteJobStore};
pub use manager::{ManagerAgent, SynthesisGateway};
pub use model::{
    Action, ExecutionMode, FinalResponse, Job, JobStatus, Message, MessageType, PendingAction, Phase, PlanOutcome,
    ScriptPlan, ScriptStep, StrategicPlan,
};
pub use planner::{LlmPlanner, Planner, ScriptedPlanner};
pub use policies::{
    CheckpointPolicy, CompletionDetector, DefaultCheckpointPolicy, DefaultCompletionDetector, DefaultFollowUpPolicy,
    DefaultHitlPolicy, DefaultLoopPreventionPolicy, DefaultTerminationPolicy, FollowUpPolicy, HitlPolicy, HitlScope,
    LoopPreventionPolicy, ManagerPolicySet, PolicyContext, PolicyEngine, PolicySet, PolicyVerdict, TerminationPolicy,
};
pub use request_context::RequestContext;
pub use signature::{action_signature, canonical_json};
pub use store::{ConversationTurn, SharedStateStore};
pub use views::{HierarchicalManagerView, PrivateView, SharedWorkerView};
pub use worker::WorkerAgent;
