//! Pluggable policy objects: the sole location of "when-to-stop" and
//! "when-to-pause" decisions (§4.4), plus the central pre-execution deny
//! filter (§4.4a).
//!
//! Every default implementation and numeric default here is grounded on
//! `policies/default.py`.

mod checkpoint;
mod completion;
mod engine_policy;
mod follow_up;
mod hitl;
mod loop_prevention;
mod termination;

pub use checkpoint::{CheckpointPolicy, DefaultCheckpointPolicy};
pub use completion::{CompletionDetector, DefaultCompletionDetector};
pub use engine_policy::{PolicyEngine, PolicyVerdict};
pub use follow_up::{DefaultFollowUpPolicy, FollowUpPolicy};
pub use hitl::{DefaultHitlPolicy, HitlPolicy, HitlScope};
pub use loop_prevention::{DefaultLoopPreventionPolicy, LoopPreventionPolicy};
pub use termination::{DefaultTerminationPolicy, TerminationPolicy};

use super::model::{FinalResponse, Message, PlanOutcome};

/// Ambient information available to every policy decision.
#[derive(Debug, Clone, Default)]
pub struct PolicyContext {
    pub job_id: Option<String>,
    pub approvals: std::collections::HashMap<String, bool>,
    /// The most recent turn's result, when one is already known. Lets
    /// `LoopPreventionPolicy` flag "task already complete but execution
    /// continued" as its highest-priority stagnation trigger.
    pub last_result: Option<FinalResponse>,
    /// The most recently executed tool name, consulted by
    /// `CheckpointPolicy`'s "last tool in configured tool set" trigger.
    pub last_tool: Option<String>,
}

/// Locate the most recent `task` entry; return the slice after it (the
/// current turn). Shared by `CompletionDetector` and `WorkerFilter`.
pub(crate) fn current_turn(history: &[Message]) -> &[Message] {
    use super::model::MessageType;
    match history.iter().rposition(|m| m.type_ == MessageType::Task) {
        Some(idx) => &history[idx + 1..],
        None => &[],
    }
}

/// Bundle of every policy a worker or manager needs, as trait objects so a
/// host can mix and match implementations freely.
pub struct PolicySet {
    pub completion: Box<dyn CompletionDetector>,
    pub termination: Box<dyn TerminationPolicy>,
    pub loop_prevention: Box<dyn LoopPreventionPolicy>,
    pub hitl: Box<dyn HitlPolicy>,
    pub checkpoint: Box<dyn CheckpointPolicy>,
}

impl Default for PolicySet {
    fn default() -> Self {
        Self {
            completion: Box::new(DefaultCompletionDetector::default()),
            termination: Box::new(DefaultTerminationPolicy::default()),
            loop_prevention: Box::new(DefaultLoopPreventionPolicy::default()),
            hitl: Box::new(DefaultHitlPolicy::default()),
            checkpoint: Box::new(DefaultCheckpointPolicy::default()),
        }
    }
}

/// The follow-up policy is manager-only, kept separate from `PolicySet`
/// since workers have no notion of phases.
pub struct ManagerPolicySet {
    pub completion: Box<dyn CompletionDetector>,
    pub follow_up: Box<dyn FollowUpPolicy>,
    pub loop_prevention: Box<dyn LoopPreventionPolicy>,
}

impl Default for ManagerPolicySet {
    fn default() -> Self {
        Self {
            completion: Box::new(DefaultCompletionDetector::default()),
            follow_up: Box::new(DefaultFollowUpPolicy::default()),
            loop_prevention: Box::new(DefaultLoopPreventionPolicy::default()),
        }
    }
}

pub(crate) fn plan_outcome_kind(outcome: &PlanOutcome) -> &'static str {
    match outcome {
        PlanOutcome::Final(_) => "final",
        PlanOutcome::Single(_) => "action",
        PlanOutcome::Many(_) => "actions",
    }
}
