pub mod types;
pub mod memory;
pub mod events;
pub mod transitions;
pub mod tools;
pub mod engine;
pub mod trace;
pub mod error;
pub mod builder;
pub mod states;
pub mod llm;
pub mod budget;
pub mod checkpoint;
pub mod human;
pub mod mcp;
pub mod hier;

// Convenience re-exports at crate root
pub use builder::AgentBuilder;
pub use engine::AgentEngine;
pub use memory::AgentMemory;
pub use types::{State, LlmResponse, ToolCall, HistoryEntry, AgentConfig};
pub use events::Event;
pub use tools::{ToolRegistry, ToolFn, Tool};
pub use llm::{LlmCaller, LlmCallerExt, RetryingLlmCaller};
pub use trace::{TraceEntry, Trace};
pub use error::AgentError;
pub use budget::TokenUsage;
pub use checkpoint::{AgentCheckpoint, CheckpointStore};

// Hierarchical engine surface (orchestrator/manager/worker, policies, shared
// state store, job persistence) — the net-new surface this crate adds over
// the single-agent state machine above.
pub use hier::{
    Action, CheckpointPolicy, CompletionDetector, ContextBuilder, EngineConfig, EnvDefaultInjector, EventBus,
    FinalResponse, FollowUpPolicy, HitlPolicy, HitlScope, Job, JobStatus, JobStore, LoopPreventionPolicy,
    ManagerAgent, ManagerPolicySet, Message, PendingAction, Phase, PlanOutcome, Planner, PolicyContext, PolicyEngine,
    PolicySet, RequestContext, ScriptPlan, SharedStateStore, StrategicPlan, TerminationPolicy, ToolChoicePolicy,
    WorkerAgent,
};
